//! Product listing with live stock counts.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{Catalog, Product};
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub effective_price_cents: i64,
    pub flash_sale: bool,
    pub discount_percent: u32,
    pub stock: i64,
}

/// GET /products — catalog with real-time stock from the counter store.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let mut out = Vec::new();
    for product in state.catalog.list().await {
        let stock = state.inventory.stock(&product.id).await.unwrap_or(0);
        out.push(to_response(product, stock));
    }
    Ok(Json(out))
}

fn to_response(product: Product, stock: i64) -> ProductResponse {
    ProductResponse {
        id: product.id.to_string(),
        effective_price_cents: product.effective_unit_price().cents(),
        name: product.name,
        description: product.description,
        price_cents: product.price.cents(),
        flash_sale: product.flash_sale,
        discount_percent: product.discount_percent,
        stock,
    }
}
