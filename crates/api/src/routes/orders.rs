//! Purchase, cancellation, and order lookup endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{InMemoryCatalog, InMemoryOrderStore, Inventory, Order};
use pipeline::{OrderPipeline, SimulatedFulfillment};
use serde::{Deserialize, Serialize};
use store::{InMemoryCounterStore, InMemoryWorkQueue};

use crate::error::ApiError;
use crate::routes::require_identity;

/// The pipeline wired over the in-memory stores the server runs with.
pub type AppPipeline =
    OrderPipeline<InMemoryCounterStore, InMemoryOrderStore, InMemoryWorkQueue>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub pipeline: Arc<AppPipeline>,
    pub catalog: Arc<InMemoryCatalog>,
    pub inventory: Inventory<InMemoryCounterStore>,
    pub orders: InMemoryOrderStore,
    pub queue: InMemoryWorkQueue,
    pub fulfillment: Arc<SimulatedFulfillment>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub item_id: String,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub order_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub order_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            item_id: order.item_id.to_string(),
            item_name: order.item_name,
            quantity: order.quantity,
            unit_price_cents: order.unit_price.cents(),
            total_cents: order.total.cents(),
            status: order.status.to_string(),
            created_at: order.created_at,
            finalized_at: order.finalized_at,
        }
    }
}

// -- Handlers --

/// POST /purchase — admit a purchase; responds before fulfillment runs.
#[tracing::instrument(skip(state, headers, req))]
pub async fn purchase(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    let identity = require_identity(&headers)?;
    let order = state
        .pipeline
        .purchase(identity, req.item_id.into(), req.quantity)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PurchaseResponse {
            order_id: order.id.to_string(),
            status: order.status.to_string(),
        }),
    ))
}

/// POST /orders/{id}/cancel — cancel a still-pending order.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CancelResponse>, ApiError> {
    let identity = require_identity(&headers)?;
    let order_id = parse_order_id(&id)?;
    let order = state.pipeline.cancel(order_id, &identity).await?;

    Ok(Json(CancelResponse {
        order_id: order.id.to_string(),
        status: order.status.to_string(),
    }))
}

/// GET /orders/{id} — load one of the requester's orders.
#[tracing::instrument(skip(state, headers))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, ApiError> {
    let identity = require_identity(&headers)?;
    let order_id = parse_order_id(&id)?;
    let order = state
        .pipeline
        .order_for(order_id, &identity)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}

/// GET /orders — the requester's order history, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let identity = require_identity(&headers)?;
    let orders = state.pipeline.orders_for(&identity).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::InvalidInput(format!("Invalid order id: {e}")))
}
