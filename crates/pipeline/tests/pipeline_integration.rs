//! End-to-end pipeline tests: admission, fulfillment, and cancellation
//! racing under concurrency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Identity, ItemId, Money};
use domain::{
    Catalog, InMemoryCatalog, InMemoryOrderStore, Inventory, OrderStatus, OrderStore, Product,
    RateLimitConfig, RateLimiter,
};
use pipeline::{
    CancelError, NoopNotifier, OrderPipeline, PipelineConfig, PipelineError, SimulatedFulfillment,
    WorkerConfig, WorkerPool,
};
use store::{InMemoryCounterStore, InMemoryWorkQueue, WorkQueue};

type TestPipeline = OrderPipeline<InMemoryCounterStore, InMemoryOrderStore, InMemoryWorkQueue>;

struct Harness {
    pipeline: Arc<TestPipeline>,
    inventory: Inventory<InMemoryCounterStore>,
    orders: InMemoryOrderStore,
    queue: InMemoryWorkQueue,
    fulfillment: Arc<SimulatedFulfillment>,
}

impl Harness {
    fn build(rate: RateLimitConfig, config: PipelineConfig, fulfillment_delay: Duration) -> Self {
        let counters = InMemoryCounterStore::new();
        let inventory = Inventory::new(counters.clone());
        let limiter = RateLimiter::new(counters, rate);
        let orders = InMemoryOrderStore::new();
        let queue = InMemoryWorkQueue::new();
        let fulfillment = Arc::new(SimulatedFulfillment::new(fulfillment_delay));

        let catalog = InMemoryCatalog::new();
        catalog.add(Product {
            id: ItemId::new("prod_1"),
            name: "Premium Wireless Headphones".to_string(),
            description: "High-quality noise-cancelling headphones".to_string(),
            price: Money::from_cents(29999),
            flash_sale: true,
            discount_percent: 40,
        });

        let pipeline = Arc::new(OrderPipeline::new(
            limiter,
            inventory.clone(),
            Arc::new(catalog) as Arc<dyn Catalog>,
            orders.clone(),
            queue.clone(),
            Arc::new(NoopNotifier),
            config,
        ));

        Self {
            pipeline,
            inventory,
            orders,
            queue,
            fulfillment,
        }
    }

    fn with_defaults() -> Self {
        Self::build(
            RateLimitConfig::default(),
            PipelineConfig::default(),
            Duration::ZERO,
        )
    }

    async fn seed(&self, stock: u32) {
        self.inventory
            .seed(&ItemId::new("prod_1"), stock)
            .await
            .unwrap();
    }

    fn spawn_workers(&self, count: usize) -> WorkerPool {
        WorkerPool::spawn(
            count,
            self.queue.clone(),
            self.orders.clone(),
            self.inventory.clone(),
            self.fulfillment.clone(),
            Arc::new(NoopNotifier),
            WorkerConfig {
                lease: Duration::from_secs(5),
                max_deliveries: 3,
            },
        )
    }

    async fn wait_for_status(&self, id: common::OrderId, status: OrderStatus) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let order = self.orders.get(id).await.unwrap().unwrap();
            if order.status == status {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "order never reached {status}, stuck at {}",
                order.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[tokio::test]
async fn purchase_responds_pending_before_fulfillment() {
    let harness = Harness::build(
        RateLimitConfig::default(),
        PipelineConfig::default(),
        Duration::from_secs(60), // fulfillment far slower than admission
    );
    harness.seed(10).await;

    let order = harness
        .pipeline
        .purchase(Identity::new("user-1"), ItemId::new("prod_1"), 2)
        .await
        .unwrap();

    // Responded immediately: still pending, work queued, stock reserved,
    // discounted flash price applied.
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.unit_price, Money::from_cents(18000));
    assert_eq!(order.total, Money::from_cents(36000));
    assert_eq!(harness.queue.len().await, 1);
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        8
    );
}

#[tokio::test]
async fn purchase_unknown_item_is_rejected_untouched() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;

    let err = harness
        .pipeline
        .purchase(Identity::new("user-1"), ItemId::new("ghost"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownItem(_)));
    assert_eq!(harness.queue.len().await, 0);
}

#[tokio::test]
async fn purchase_zero_quantity_is_rejected() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;

    let err = harness
        .pipeline
        .purchase(Identity::new("user-1"), ItemId::new("prod_1"), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidQuantity));
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        10
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn five_buyers_one_unit_exactly_one_wins() {
    let harness = Harness::with_defaults();
    harness.seed(1).await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let pipeline = harness.pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .purchase(Identity::new(format!("user-{i}")), ItemId::new("prod_1"), 1)
                .await
        }));
    }

    let mut granted = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(PipelineError::OutOfStock(_)) => out_of_stock += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(out_of_stock, 4);
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn fifteen_requests_hit_the_rate_limit_at_eleven() {
    let harness = Harness::with_defaults();
    harness.seed(100).await;
    let identity = Identity::new("user-1");

    for i in 1..=15u32 {
        let result = harness
            .pipeline
            .purchase(identity.clone(), ItemId::new("prod_1"), 1)
            .await;
        if i <= 10 {
            assert!(result.is_ok(), "request {i} should be admitted");
        } else {
            assert!(
                matches!(result, Err(PipelineError::RateLimited { .. })),
                "request {i} should be rate limited"
            );
        }
    }

    // Denied requests reserved nothing.
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        90
    );
}

#[tokio::test]
async fn worker_confirms_admitted_order() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;

    let order = harness
        .pipeline
        .purchase(Identity::new("user-1"), ItemId::new("prod_1"), 1)
        .await
        .unwrap();

    let pool = harness.spawn_workers(2);
    harness
        .wait_for_status(order.id, OrderStatus::Confirmed)
        .await;
    pool.shutdown().await;

    // The confirmed sale keeps its unit.
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        9
    );
}

#[tokio::test]
async fn failed_fulfillment_compensates_stock() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;
    harness.fulfillment.set_fail(true);

    let order = harness
        .pipeline
        .purchase(Identity::new("user-1"), ItemId::new("prod_1"), 3)
        .await
        .unwrap();

    let pool = harness.spawn_workers(1);
    harness.wait_for_status(order.id, OrderStatus::Failed).await;
    pool.shutdown().await;

    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        10
    );
}

#[tokio::test]
async fn cancel_inside_window_releases_stock() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;
    let identity = Identity::new("user-1");

    let order = harness
        .pipeline
        .purchase(identity.clone(), ItemId::new("prod_1"), 2)
        .await
        .unwrap();
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        8
    );

    let cancelled = harness.pipeline.cancel(order.id, &identity).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.finalized_at.is_some());
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        10
    );
}

#[tokio::test]
async fn cancel_after_window_is_rejected_and_order_stays_pending() {
    let harness = Harness::build(
        RateLimitConfig::default(),
        PipelineConfig {
            cancel_window: Duration::from_millis(50),
        },
        Duration::ZERO,
    );
    harness.seed(10).await;
    let identity = Identity::new("user-1");

    let order = harness
        .pipeline
        .purchase(identity.clone(), ItemId::new("prod_1"), 1)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let err = harness
        .pipeline
        .cancel(order.id, &identity)
        .await
        .unwrap_err();
    assert!(matches!(err, CancelError::WindowExpired));

    let stored = harness.orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        9
    );
}

#[tokio::test]
async fn cancel_after_confirmation_reports_already_terminal() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;
    let identity = Identity::new("user-1");

    let order = harness
        .pipeline
        .purchase(identity.clone(), ItemId::new("prod_1"), 1)
        .await
        .unwrap();

    let pool = harness.spawn_workers(1);
    harness
        .wait_for_status(order.id, OrderStatus::Confirmed)
        .await;
    pool.shutdown().await;

    let err = harness
        .pipeline
        .cancel(order.id, &identity)
        .await
        .unwrap_err();
    assert!(matches!(err, CancelError::AlreadyTerminal));

    // No double release: the confirmed order keeps its unit.
    assert_eq!(
        harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap(),
        9
    );
}

#[tokio::test]
async fn cancel_enforces_ownership_and_existence() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;

    let order = harness
        .pipeline
        .purchase(Identity::new("user-1"), ItemId::new("prod_1"), 1)
        .await
        .unwrap();

    let err = harness
        .pipeline
        .cancel(order.id, &Identity::new("someone-else"))
        .await
        .unwrap_err();
    assert!(matches!(err, CancelError::NotOwner));

    let err = harness
        .pipeline
        .cancel(common::OrderId::new(), &Identity::new("user-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CancelError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_and_confirm_race_has_one_winner_and_one_release() {
    // Run the race repeatedly; whichever side wins, the invariants hold:
    // exactly one terminal status, and stock accounts for exactly one
    // release in total (cancel wins) or none (confirm wins).
    for _ in 0..20 {
        let harness = Harness::with_defaults();
        harness.seed(5).await;
        let identity = Identity::new("user-1");

        let order = harness
            .pipeline
            .purchase(identity.clone(), ItemId::new("prod_1"), 1)
            .await
            .unwrap();

        let pool = harness.spawn_workers(1);
        let cancel_result = harness.pipeline.cancel(order.id, &identity).await;

        // Let the worker finish whatever it is doing.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let stored = harness.orders.get(order.id).await.unwrap().unwrap();
            if stored.status.is_terminal() {
                break;
            }
            assert!(Instant::now() < deadline, "order never finalized");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pool.shutdown().await;

        let stored = harness.orders.get(order.id).await.unwrap().unwrap();
        let stock = harness
            .inventory
            .stock(&ItemId::new("prod_1"))
            .await
            .unwrap();

        match (&cancel_result, stored.status) {
            (Ok(_), OrderStatus::Cancelled) => assert_eq!(stock, 5),
            (Err(CancelError::AlreadyTerminal), OrderStatus::Confirmed) => assert_eq!(stock, 4),
            (result, status) => panic!("inconsistent outcome: {result:?} with status {status}"),
        }
    }
}

#[tokio::test]
async fn order_lookup_is_requester_scoped() {
    let harness = Harness::with_defaults();
    harness.seed(10).await;
    let alice = Identity::new("alice");
    let bob = Identity::new("bob");

    let order = harness
        .pipeline
        .purchase(alice.clone(), ItemId::new("prod_1"), 1)
        .await
        .unwrap();

    assert!(
        harness
            .pipeline
            .order_for(order.id, &alice)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        harness
            .pipeline
            .order_for(order.id, &bob)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(harness.pipeline.orders_for(&alice).await.unwrap().len(), 1);
    assert!(harness.pipeline.orders_for(&bob).await.unwrap().is_empty());
}
