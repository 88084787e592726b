//! Pipeline error types.

use std::time::Duration;

use common::{ItemId, OrderId};
use domain::InventoryError;
use store::StoreError;
use thiserror::Error;

/// Errors returned synchronously from purchase admission.
///
/// Everything here happens before the caller gets a response, so no
/// compensation is owed to the caller: either nothing was reserved, or the
/// reservation was already rolled back.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Over the request budget; retry once the window resets.
    #[error("Rate limited, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Quantity must be at least one.
    #[error("Invalid quantity: must be at least 1")]
    InvalidQuantity,

    /// The item is not in the catalog.
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    /// The reservation lost; not retryable with the same parameters.
    #[error("Out of stock: {0}")]
    OutOfStock(ItemId),

    /// Shared-state store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<InventoryError> for PipelineError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InvalidQuantity => PipelineError::InvalidQuantity,
            InventoryError::UnknownItem(item) => PipelineError::UnknownItem(item),
            InventoryError::OutOfStock(item) => PipelineError::OutOfStock(item),
            InventoryError::Store(e) => PipelineError::Store(e),
        }
    }
}

/// Reasons a cancellation request is rejected.
#[derive(Debug, Error)]
pub enum CancelError {
    /// No such order.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order belongs to someone else.
    #[error("Order belongs to a different requester")]
    NotOwner,

    /// The order already reached a terminal status (possibly by losing the
    /// race to a worker mid-cancellation).
    #[error("Order already reached a terminal status")]
    AlreadyTerminal,

    /// The cancellation window has elapsed.
    #[error("Cancellation window has expired")]
    WindowExpired,

    /// Inventory release failure during compensation.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Shared-state store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
