//! Fulfillment worker pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::{Inventory, Order, OrderStatus, OrderStore};
use store::{CounterStore, Delivery, WorkQueue};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::fulfillment::FulfillmentService;
use crate::notify::Notifier;

/// Worker configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// How long a worker may hold a delivery before the queue takes it back.
    pub lease: Duration,
    /// Deliveries allowed per item before it is written off as poison.
    pub max_deliveries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            max_deliveries: 3,
        }
    }
}

/// A single fulfillment worker.
///
/// Pulls one work item at a time, performs the fulfillment step, and
/// attempts the `pending → confirmed` transition. Losing that transition
/// (cancellation got there first) means discarding the result with no
/// further side effects; a fulfillment failure means `pending → failed`
/// plus a compensating inventory release. Duplicate deliveries are safe
/// because only one transition out of `pending` can ever win.
pub struct Worker<C, O, Q>
where
    C: CounterStore,
    O: OrderStore,
    Q: WorkQueue,
{
    id: usize,
    queue: Q,
    orders: O,
    inventory: Inventory<C>,
    fulfillment: Arc<dyn FulfillmentService>,
    notifier: Arc<dyn Notifier>,
    config: WorkerConfig,
}

impl<C, O, Q> Worker<C, O, Q>
where
    C: CounterStore,
    O: OrderStore,
    Q: WorkQueue,
{
    /// Creates a worker.
    pub fn new(
        id: usize,
        queue: Q,
        orders: O,
        inventory: Inventory<C>,
        fulfillment: Arc<dyn FulfillmentService>,
        notifier: Arc<dyn Notifier>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            queue,
            orders,
            inventory,
            fulfillment,
            notifier,
            config,
        }
    }

    /// Runs the worker loop until the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(worker = self.id, "fulfillment worker started");
        loop {
            let delivery = tokio::select! {
                _ = shutdown.changed() => break,
                delivery = self.queue.dequeue(self.config.lease) => match delivery {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::error!(worker = self.id, error = %e, "dequeue failed");
                        continue;
                    }
                },
            };

            if let Err(e) = self.process(delivery).await {
                tracing::error!(worker = self.id, error = %e, "work item processing failed");
            }
        }
        tracing::info!(worker = self.id, "fulfillment worker stopped");
    }

    /// Handles one delivery end to end, acknowledging it in every branch
    /// that reached a decision.
    async fn process(&self, delivery: Delivery) -> Result<(), PipelineError> {
        let order_id = delivery.item.order_id;

        let Some(order) = self.orders.get(order_id).await? else {
            tracing::warn!(%order_id, "work item references unknown order, dropping");
            self.queue.ack(delivery.receipt).await?;
            return Ok(());
        };

        if order.status.is_terminal() {
            // Cancelled (or already finalized by an earlier delivery) while
            // the item sat in the queue; nothing left to do.
            self.queue.ack(delivery.receipt).await?;
            return Ok(());
        }

        if delivery.attempt > self.config.max_deliveries {
            tracing::warn!(
                %order_id,
                attempt = delivery.attempt,
                "delivery budget exhausted, failing order"
            );
            self.fail_order(&order).await?;
            self.queue.ack(delivery.receipt).await?;
            return Ok(());
        }

        let started = Instant::now();
        match self.fulfillment.fulfill(&order).await {
            Ok(()) => {
                let won = self
                    .orders
                    .transition(order_id, OrderStatus::Pending, OrderStatus::Confirmed)
                    .await?;
                if won {
                    metrics::counter!("orders_confirmed_total").increment(1);
                    metrics::histogram!("fulfillment_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    tracing::info!(worker = self.id, %order_id, "order confirmed");
                    self.notify_finalized(order_id).await?;
                } else {
                    tracing::debug!(%order_id, "lost terminal transition, discarding result");
                }
            }
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "fulfillment failed");
                self.fail_order(&order).await?;
            }
        }

        self.queue.ack(delivery.receipt).await?;
        Ok(())
    }

    /// Moves the order to `failed` and, if this worker won the transition,
    /// hands the reserved units back.
    async fn fail_order(&self, order: &Order) -> Result<(), PipelineError> {
        let won = self
            .orders
            .transition(order.id, OrderStatus::Pending, OrderStatus::Failed)
            .await?;
        if won {
            self.inventory
                .release(&order.item_id, order.quantity)
                .await?;
            metrics::counter!("orders_failed_total").increment(1);
            self.notify_finalized(order.id).await?;
        }
        Ok(())
    }

    async fn notify_finalized(&self, order_id: common::OrderId) -> Result<(), PipelineError> {
        if let Some(finalized) = self.orders.get(order_id).await? {
            self.notifier.order_finalized(&finalized).await;
        }
        Ok(())
    }
}

/// A fixed-size pool of fulfillment workers with coordinated shutdown.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers sharing the given queue and stores.
    pub fn spawn<C, O, Q>(
        count: usize,
        queue: Q,
        orders: O,
        inventory: Inventory<C>,
        fulfillment: Arc<dyn FulfillmentService>,
        notifier: Arc<dyn Notifier>,
        config: WorkerConfig,
    ) -> Self
    where
        C: CounterStore + Clone + 'static,
        O: OrderStore + Clone + 'static,
        Q: WorkQueue + Clone + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let handles = (0..count)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    queue.clone(),
                    orders.clone(),
                    inventory.clone(),
                    fulfillment.clone(),
                    notifier.clone(),
                    config,
                );
                tokio::spawn(worker.run(rx.clone()))
            })
            .collect();
        Self { shutdown, handles }
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if the pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signals all workers to stop and waits for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::SimulatedFulfillment;
    use crate::notify::NoopNotifier;
    use common::{Identity, ItemId, Money};
    use store::{InMemoryCounterStore, InMemoryWorkQueue, WorkItem};

    struct Fixture {
        queue: InMemoryWorkQueue,
        orders: domain::InMemoryOrderStore,
        inventory: Inventory<InMemoryCounterStore>,
        fulfillment: Arc<SimulatedFulfillment>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                queue: InMemoryWorkQueue::new(),
                orders: domain::InMemoryOrderStore::new(),
                inventory: Inventory::new(InMemoryCounterStore::new()),
                fulfillment: Arc::new(SimulatedFulfillment::new(Duration::ZERO)),
            }
        }

        fn worker(&self, config: WorkerConfig) -> Worker<InMemoryCounterStore, domain::InMemoryOrderStore, InMemoryWorkQueue> {
            Worker::new(
                0,
                self.queue.clone(),
                self.orders.clone(),
                self.inventory.clone(),
                self.fulfillment.clone(),
                Arc::new(NoopNotifier),
                config,
            )
        }

        /// Seeds stock, reserves one unit, and persists a pending order —
        /// the state purchase admission leaves behind.
        async fn admitted_order(&self, stock: u32) -> Order {
            let item = ItemId::new("prod_1");
            self.inventory.seed(&item, stock).await.unwrap();
            self.inventory.reserve(&item, 1).await.unwrap();
            let order = Order::new(
                Identity::new("user-1"),
                item,
                "4K Action Camera",
                1,
                Money::from_cents(25999),
            );
            self.orders.insert(order.clone()).await.unwrap();
            self.queue
                .enqueue(WorkItem::for_order(order.id))
                .await
                .unwrap();
            order
        }
    }

    #[tokio::test]
    async fn successful_fulfillment_confirms_order() {
        let fx = Fixture::new();
        let order = fx.admitted_order(5).await;
        let worker = fx.worker(WorkerConfig::default());

        let delivery = fx.queue.dequeue(Duration::from_secs(30)).await.unwrap();
        worker.process(delivery).await.unwrap();

        let stored = fx.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        // Confirmed orders keep their reservation.
        assert_eq!(fx.inventory.stock(&order.item_id).await.unwrap(), 4);
        assert_eq!(fx.queue.in_flight().await, 0);
    }

    #[tokio::test]
    async fn failed_fulfillment_releases_stock() {
        let fx = Fixture::new();
        let order = fx.admitted_order(5).await;
        fx.fulfillment.set_fail(true);
        let worker = fx.worker(WorkerConfig::default());

        let delivery = fx.queue.dequeue(Duration::from_secs(30)).await.unwrap();
        worker.process(delivery).await.unwrap();

        let stored = fx.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(fx.inventory.stock(&order.item_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn lost_race_discards_result_without_release() {
        let fx = Fixture::new();
        let order = fx.admitted_order(5).await;
        let worker = fx.worker(WorkerConfig::default());

        let delivery = fx.queue.dequeue(Duration::from_secs(30)).await.unwrap();

        // Cancellation wins while the delivery is in flight.
        fx.orders
            .transition(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        fx.inventory.release(&order.item_id, 1).await.unwrap();

        worker.process(delivery).await.unwrap();

        let stored = fx.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        // Exactly one release happened (the cancellation's).
        assert_eq!(fx.inventory.stock(&order.item_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_a_noop() {
        let fx = Fixture::new();
        let order = fx.admitted_order(5).await;
        // A second delivery for the same order, as redelivery would produce.
        fx.queue
            .enqueue(WorkItem::for_order(order.id))
            .await
            .unwrap();
        let worker = fx.worker(WorkerConfig::default());

        let first = fx.queue.dequeue(Duration::from_secs(30)).await.unwrap();
        let second = fx.queue.dequeue(Duration::from_secs(30)).await.unwrap();
        worker.process(first).await.unwrap();
        worker.process(second).await.unwrap();

        let stored = fx.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        // One reservation still held; no spurious release or double confirm.
        assert_eq!(fx.inventory.stock(&order.item_id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn poison_item_fails_after_delivery_budget() {
        let fx = Fixture::new();
        let order = fx.admitted_order(5).await;
        let worker = fx.worker(WorkerConfig {
            lease: Duration::from_secs(30),
            max_deliveries: 2,
        });

        // Two crashed deliveries: dequeued but never acked.
        let lease = Duration::from_millis(30);
        let _crashed1 = fx.queue.dequeue(lease).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _crashed2 = fx.queue.dequeue(lease).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Third delivery exceeds the budget; the worker writes it off.
        let third = fx.queue.dequeue(Duration::from_secs(30)).await.unwrap();
        assert_eq!(third.attempt, 3);
        worker.process(third).await.unwrap();

        let stored = fx.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(fx.inventory.stock(&order.item_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn pool_workers_drain_the_queue_and_shut_down() {
        let fx = Fixture::new();
        let item = ItemId::new("prod_1");
        fx.inventory.seed(&item, 10).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..6 {
            fx.inventory.reserve(&item, 1).await.unwrap();
            let order = Order::new(
                Identity::new("user-1"),
                item.clone(),
                "4K Action Camera",
                1,
                Money::from_cents(25999),
            );
            ids.push(order.id);
            fx.orders.insert(order.clone()).await.unwrap();
            fx.queue
                .enqueue(WorkItem::for_order(order.id))
                .await
                .unwrap();
        }

        let pool = WorkerPool::spawn(
            3,
            fx.queue.clone(),
            fx.orders.clone(),
            fx.inventory.clone(),
            fx.fulfillment.clone(),
            Arc::new(NoopNotifier),
            WorkerConfig::default(),
        );
        assert_eq!(pool.len(), 3);

        // Wait until every order is confirmed.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let confirmed = fx
                .orders
                .count_by_status(OrderStatus::Confirmed)
                .await
                .unwrap();
            if confirmed == ids.len() {
                break;
            }
            assert!(Instant::now() < deadline, "workers did not drain the queue");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        pool.shutdown().await;
        assert_eq!(fx.inventory.stock(&item).await.unwrap(), 4);
    }
}
