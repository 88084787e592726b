//! Shared-state primitives for the flash-sale transaction core.
//!
//! Two abstractions live here, both specified as a trait with an in-memory
//! implementation standing in for the external service a deployment would
//! use (a Redis-style counter store, a broker-backed task queue):
//!
//! - [`CounterStore`] — keyed integer counters with atomic increments and
//!   optional TTL expiry. The inventory reservation service and the rate
//!   limiter are both built on it.
//! - [`WorkQueue`] — a FIFO queue of [`WorkItem`]s with lease-based
//!   redelivery: a consumer that never acknowledges its delivery loses the
//!   lease and the item becomes eligible for another consumer.

mod counter;
mod error;
mod queue;

pub use counter::{CounterStore, InMemoryCounterStore};
pub use error::StoreError;
pub use queue::{Delivery, InMemoryWorkQueue, Receipt, WorkItem, WorkQueue};

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
