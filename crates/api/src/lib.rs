//! HTTP API server for the flash-sale transaction core.
//!
//! Wires the pipeline over in-memory stores, exposes purchase/cancel/status
//! routes, and carries the observability surface: structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::ItemId;
use domain::{
    Catalog, InMemoryCatalog, InMemoryOrderStore, Inventory, Product, RateLimitConfig, RateLimiter,
};
use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::{
    OrderPipeline, PipelineConfig, SimulatedFulfillment, TracingNotifier, WorkerConfig, WorkerPool,
};
use store::{InMemoryCounterStore, InMemoryWorkQueue};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/purchase", post(routes::orders::purchase))
        .route("/orders", get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/products", get(routes::products::list))
        .route("/admin/restock", post(routes::admin::restock))
        .route("/admin/stats", get(routes::admin::stats))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds application state from configuration: shared counter store,
/// order store, work queue, catalog, and the pipeline over them.
pub fn create_state(config: &Config) -> Arc<AppState> {
    let counters = InMemoryCounterStore::new();
    let inventory = Inventory::new(counters.clone());
    let limiter = RateLimiter::new(
        counters,
        RateLimitConfig {
            limit: config.rate_limit,
            window: config.rate_window,
        },
    );
    let catalog = Arc::new(InMemoryCatalog::new());
    let orders = InMemoryOrderStore::new();
    let queue = InMemoryWorkQueue::new();
    let fulfillment = Arc::new(SimulatedFulfillment::new(config.fulfillment_delay));

    let pipeline = Arc::new(OrderPipeline::new(
        limiter,
        inventory.clone(),
        catalog.clone() as Arc<dyn Catalog>,
        orders.clone(),
        queue.clone(),
        Arc::new(TracingNotifier),
        PipelineConfig {
            cancel_window: config.cancel_window,
        },
    ));

    Arc::new(AppState {
        pipeline,
        catalog,
        inventory,
        orders,
        queue,
        fulfillment,
    })
}

/// Spawns the fulfillment worker pool against the state's queue and stores.
pub fn spawn_workers(state: &AppState, config: &Config) -> WorkerPool {
    WorkerPool::spawn(
        config.workers,
        state.queue.clone(),
        state.orders.clone(),
        state.inventory.clone(),
        state.fulfillment.clone(),
        Arc::new(TracingNotifier),
        WorkerConfig {
            lease: config.work_lease,
            max_deliveries: config.max_deliveries,
        },
    )
}

/// Seeds the demo catalog and its stock counters.
pub async fn seed_demo_catalog(state: &AppState) {
    let products = [
        ("prod_1", "Premium Wireless Headphones", "High-quality noise-cancelling headphones", 29999, 50, true, 40),
        ("prod_2", "Smart Fitness Watch", "Track your health and fitness goals", 19999, 30, true, 50),
        ("prod_3", "4K Action Camera", "Capture your adventures in stunning detail", 39999, 20, true, 35),
        ("prod_4", "Mechanical Gaming Keyboard", "RGB backlit with tactile switches", 14999, 100, false, 0),
        ("prod_5", "Portable Bluetooth Speaker", "Waterproof with 24-hour battery life", 7999, 75, false, 0),
        ("prod_6", "USB-C Charging Hub", "6-in-1 multiport adapter", 4999, 150, false, 0),
    ];

    for (id, name, description, price_cents, stock, flash_sale, discount_percent) in products {
        let item = ItemId::new(id);
        state.catalog.add(Product {
            id: item.clone(),
            name: name.to_string(),
            description: description.to_string(),
            price: common::Money::from_cents(price_cents),
            flash_sale,
            discount_percent,
        });
        if let Err(e) = state.inventory.seed(&item, stock).await {
            tracing::warn!(item = %item, error = %e, "failed to seed stock");
        }
    }

    tracing::info!(products = products.len(), "demo catalog seeded");
}
