//! Fulfillment service trait and simulated implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::Order;
use thiserror::Error;

/// A fulfillment step failure.
#[derive(Debug, Error)]
#[error("Fulfillment failed: {0}")]
pub struct FulfillmentError(pub String);

/// The downstream work a worker performs for one order: payment capture
/// and whatever else fulfillment entails. Seconds-scale latency is
/// expected here — it is fully decoupled from the caller-facing path.
#[async_trait]
pub trait FulfillmentService: Send + Sync {
    /// Performs the fulfillment work for an order.
    async fn fulfill(&self, order: &Order) -> Result<(), FulfillmentError>;
}

/// Simulated fulfillment: a fixed-duration sleep standing in for payment
/// capture, with a failure switch for exercising the compensation path.
#[derive(Debug, Clone)]
pub struct SimulatedFulfillment {
    delay: Duration,
    fail: Arc<AtomicBool>,
}

impl SimulatedFulfillment {
    /// Creates a simulated fulfillment step with the given duration.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Configures the service to fail every subsequent fulfill call.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FulfillmentService for SimulatedFulfillment {
    async fn fulfill(&self, order: &Order) -> Result<(), FulfillmentError> {
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(FulfillmentError("payment capture declined".to_string()));
        }
        tracing::debug!(order_id = %order.id, "fulfillment step complete");
        Ok(())
    }
}
