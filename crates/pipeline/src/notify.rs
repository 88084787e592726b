//! Fire-and-forget terminal-transition notifications.

use async_trait::async_trait;
use domain::Order;

/// Notification collaborator handed an event on each terminal transition.
///
/// Strictly fire-and-forget: implementations absorb their own failures,
/// and nothing about order state depends on delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called once by whichever path moved the order to a terminal status.
    async fn order_finalized(&self, order: &Order);
}

/// Notifier that logs terminal transitions.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn order_finalized(&self, order: &Order) {
        tracing::info!(
            order_id = %order.id,
            identity = %order.identity,
            status = %order.status,
            "order finalized"
        );
    }
}

/// Notifier that does nothing; for tests.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn order_finalized(&self, _order: &Order) {}
}
