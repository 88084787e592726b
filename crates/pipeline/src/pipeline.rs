//! Purchase admission and cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{Identity, ItemId, OrderId};
use domain::{Admission, Catalog, Inventory, Order, OrderStatus, OrderStore, RateLimiter};
use store::{CounterStore, WorkItem, WorkQueue};

use crate::error::{CancelError, PipelineError};
use crate::notify::Notifier;

/// Rate-limit action name for purchases.
const PURCHASE_ACTION: &str = "purchase";

/// Pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// How long after creation an order may still be cancelled.
    pub cancel_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cancel_window: Duration::from_secs(300),
        }
    }
}

/// The transaction core's front door.
///
/// A purchase succeeds only if the rate limiter admits it AND the
/// reservation is granted AND the order is durably enqueued; the caller
/// gets the order back still `pending`, before any fulfillment work runs.
/// Admission cost is one counter increment, one atomic reservation, one
/// insert, and one enqueue — independent of downstream fulfillment cost.
pub struct OrderPipeline<C, O, Q>
where
    C: CounterStore,
    O: OrderStore,
    Q: WorkQueue,
{
    limiter: RateLimiter<C>,
    inventory: Inventory<C>,
    catalog: Arc<dyn Catalog>,
    orders: O,
    queue: Q,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
}

impl<C, O, Q> OrderPipeline<C, O, Q>
where
    C: CounterStore,
    O: OrderStore,
    Q: WorkQueue,
{
    /// Creates a new pipeline.
    pub fn new(
        limiter: RateLimiter<C>,
        inventory: Inventory<C>,
        catalog: Arc<dyn Catalog>,
        orders: O,
        queue: Q,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            limiter,
            inventory,
            catalog,
            orders,
            queue,
            notifier,
            config,
        }
    }

    /// Returns the inventory service this pipeline reserves against.
    pub fn inventory(&self) -> &Inventory<C> {
        &self.inventory
    }

    /// Admits a purchase request.
    ///
    /// Returns the created order in `pending` without waiting for any
    /// fulfillment work. Admission-time rejections need no compensation:
    /// by the time an error propagates, any reservation taken along the
    /// way has been released.
    #[tracing::instrument(skip(self), fields(identity = %identity, item = %item_id))]
    pub async fn purchase(
        &self,
        identity: Identity,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<Order, PipelineError> {
        metrics::counter!("purchase_requests_total").increment(1);

        match self.limiter.admit(&identity, PURCHASE_ACTION).await? {
            Admission::Allowed { .. } => {}
            Admission::Denied { retry_after } => {
                metrics::counter!("purchase_rejections_total", "reason" => "rate_limited")
                    .increment(1);
                return Err(PipelineError::RateLimited { retry_after });
            }
        }

        let Some(priced) = self.catalog.price_of(&item_id).await else {
            metrics::counter!("purchase_rejections_total", "reason" => "unknown_item").increment(1);
            return Err(PipelineError::UnknownItem(item_id));
        };

        if let Err(err) = self.inventory.reserve(&item_id, quantity).await {
            if matches!(err, domain::InventoryError::OutOfStock(_)) {
                metrics::counter!("purchase_rejections_total", "reason" => "out_of_stock")
                    .increment(1);
            }
            return Err(err.into());
        }

        let order = Order::new(
            identity,
            item_id.clone(),
            priced.name,
            quantity,
            priced.unit_price,
        );
        let order_id = order.id;

        if let Err(err) = self.orders.insert(order.clone()).await {
            self.inventory.release(&item_id, quantity).await?;
            return Err(err.into());
        }

        if let Err(err) = self.queue.enqueue(WorkItem::for_order(order_id)).await {
            // The order was persisted but can never be worked; fail it and
            // hand the units back.
            if self
                .orders
                .transition(order_id, OrderStatus::Pending, OrderStatus::Failed)
                .await?
            {
                self.inventory.release(&item_id, quantity).await?;
            }
            return Err(err.into());
        }

        metrics::counter!("orders_admitted_total").increment(1);
        tracing::info!(order_id = %order_id, "order admitted");
        Ok(order)
    }

    /// Cancels a still-pending order inside the cancellation window.
    ///
    /// This is the other side of the worker's conditional-transition race:
    /// if the worker already finalized the order, the caller is told
    /// `AlreadyTerminal` — never "cancelled" for an order that confirmed.
    #[tracing::instrument(skip(self), fields(order_id = %order_id, identity = %requester))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        requester: &Identity,
    ) -> Result<Order, CancelError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(CancelError::NotFound(order_id))?;

        if &order.identity != requester {
            return Err(CancelError::NotOwner);
        }
        if order.status.is_terminal() {
            return Err(CancelError::AlreadyTerminal);
        }

        let age = order.age_at(Utc::now());
        if age.to_std().unwrap_or(Duration::ZERO) > self.config.cancel_window {
            metrics::counter!("cancellations_rejected_total", "reason" => "window_expired")
                .increment(1);
            return Err(CancelError::WindowExpired);
        }

        let won = self
            .orders
            .transition(order_id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await?;
        if !won {
            // A worker finalized the order between our read and the CAS.
            return Err(CancelError::AlreadyTerminal);
        }

        // We won the terminal transition, so compensation duty is ours.
        self.inventory
            .release(&order.item_id, order.quantity)
            .await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!("order cancelled");

        let cancelled = self.orders.get(order_id).await?.unwrap_or(order);
        self.notifier.order_finalized(&cancelled).await;
        Ok(cancelled)
    }

    /// Loads an order, requester-scoped.
    pub async fn order_for(
        &self,
        order_id: OrderId,
        requester: &Identity,
    ) -> Result<Option<Order>, PipelineError> {
        let order = self.orders.get(order_id).await?;
        Ok(order.filter(|o| &o.identity == requester))
    }

    /// Lists the requester's orders, newest first.
    pub async fn orders_for(&self, requester: &Identity) -> Result<Vec<Order>, PipelineError> {
        Ok(self.orders.list_for(requester).await?)
    }
}
