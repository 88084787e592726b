//! Admin endpoints: restock and dashboard stats.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{Catalog, OrderStatus, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::AppState;

/// Items below this count show up in the low-stock list.
const LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Deserialize)]
pub struct RestockRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct RestockResponse {
    pub item_id: String,
    pub new_stock: i64,
}

#[derive(Serialize)]
pub struct LowStockItem {
    pub id: String,
    pub name: String,
    pub stock: i64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_orders: usize,
    pub pending_orders: usize,
    pub confirmed_orders: usize,
    pub failed_orders: usize,
    pub cancelled_orders: usize,
    pub confirmed_revenue_cents: i64,
    pub queue_depth: usize,
    pub in_flight: usize,
    pub low_stock: Vec<LowStockItem>,
}

/// POST /admin/restock — add units to an item's stock counter.
#[tracing::instrument(skip(state, req))]
pub async fn restock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<RestockResponse>, ApiError> {
    let item_id = common::ItemId::new(req.item_id);
    let new_stock = state.inventory.restock(&item_id, req.quantity).await?;

    tracing::info!(item = %item_id, new_stock, "restocked");
    Ok(Json(RestockResponse {
        item_id: item_id.to_string(),
        new_stock,
    }))
}

/// GET /admin/stats — dashboard statistics.
#[tracing::instrument(skip(state))]
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    use store::WorkQueue;

    let pending = state.orders.count_by_status(OrderStatus::Pending).await?;
    let confirmed = state.orders.count_by_status(OrderStatus::Confirmed).await?;
    let failed = state.orders.count_by_status(OrderStatus::Failed).await?;
    let cancelled = state.orders.count_by_status(OrderStatus::Cancelled).await?;
    let revenue = state.orders.confirmed_revenue().await?;

    let mut low_stock = Vec::new();
    for product in state.catalog.list().await {
        let stock = state.inventory.stock(&product.id).await.unwrap_or(0);
        if stock < LOW_STOCK_THRESHOLD {
            low_stock.push(LowStockItem {
                id: product.id.to_string(),
                name: product.name,
                stock,
            });
        }
    }

    Ok(Json(StatsResponse {
        total_orders: pending + confirmed + failed + cancelled,
        pending_orders: pending,
        confirmed_orders: confirmed,
        failed_orders: failed,
        cancelled_orders: cancelled,
        confirmed_revenue_cents: revenue.cents(),
        queue_depth: state.queue.len().await,
        in_flight: state.queue.in_flight().await,
        low_stock,
    }))
}
