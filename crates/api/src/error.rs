//! API error types with HTTP response mapping.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use pipeline::{CancelError, PipelineError};

/// API-level error type that maps to HTTP responses.
///
/// The body is always `{"error": <code>, "message": <text>}` so clients
/// can branch on machine-readable reason codes — in particular the cancel
/// rejections, which must distinguish "already final" from "window
/// expired" from "not found/not yours".
#[derive(Debug)]
pub enum ApiError {
    /// Purchase admission failure.
    Purchase(PipelineError),
    /// Cancellation rejection.
    Cancel(CancelError),
    /// The request carried no verified identity header.
    MissingIdentity,
    /// Malformed client input.
    InvalidInput(String),
    /// Resource not found.
    NotFound(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Purchase(err) => purchase_parts(err),
            ApiError::Cancel(err) => cancel_parts(err),
            ApiError::MissingIdentity => (
                StatusCode::BAD_REQUEST,
                "missing_identity",
                "x-identity header is required".to_string(),
            ),
            ApiError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_input", msg.clone())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    msg.clone(),
                )
            }
        }
    }
}

fn purchase_parts(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::RateLimited { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many requests. Please try again later.".to_string(),
        ),
        PipelineError::InvalidQuantity => (
            StatusCode::BAD_REQUEST,
            "invalid_quantity",
            err.to_string(),
        ),
        PipelineError::UnknownItem(_) => (StatusCode::NOT_FOUND, "unknown_item", err.to_string()),
        PipelineError::OutOfStock(_) => (StatusCode::BAD_REQUEST, "out_of_stock", err.to_string()),
        PipelineError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            err.to_string(),
        ),
    }
}

fn cancel_parts(err: &CancelError) -> (StatusCode, &'static str, String) {
    match err {
        CancelError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        CancelError::NotOwner => (StatusCode::FORBIDDEN, "not_owner", err.to_string()),
        CancelError::AlreadyTerminal => (StatusCode::CONFLICT, "already_terminal", err.to_string()),
        CancelError::WindowExpired => (StatusCode::BAD_REQUEST, "window_expired", err.to_string()),
        CancelError::Inventory(_) | CancelError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            err.to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        if let ApiError::Purchase(PipelineError::RateLimited { retry_after }) = &self {
            // Round up so clients never retry a hair too early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = secs.to_string().parse() {
                headers.insert(header::RETRY_AFTER, value);
            }
        }

        let (status, code, message) = self.parts();
        let body = serde_json::json!({ "error": code, "message": message });
        (status, headers, axum::Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Purchase(err)
    }
}

impl From<CancelError> for ApiError {
    fn from(err: CancelError) -> Self {
        ApiError::Cancel(err)
    }
}

impl From<domain::InventoryError> for ApiError {
    fn from(err: domain::InventoryError) -> Self {
        ApiError::Purchase(PipelineError::from(err))
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
