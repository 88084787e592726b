//! The asynchronous order pipeline.
//!
//! Admission ([`OrderPipeline::purchase`]) is the only caller-facing hot
//! path: rate-limit check, atomic reservation, one durable write, one
//! enqueue, respond. Fulfillment happens later on a pool of
//! [`worker`](Worker) tasks pulling from the shared queue, and a
//! time-bounded [`OrderPipeline::cancel`] races those workers for the
//! order's single terminal transition.

mod error;
mod fulfillment;
mod notify;
mod pipeline;
mod worker;

pub use error::{CancelError, PipelineError};
pub use fulfillment::{FulfillmentError, FulfillmentService, SimulatedFulfillment};
pub use notify::{Notifier, NoopNotifier, TracingNotifier};
pub use pipeline::{OrderPipeline, PipelineConfig};
pub use worker::{Worker, WorkerConfig, WorkerPool};
