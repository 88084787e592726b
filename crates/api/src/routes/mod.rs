//! HTTP route handlers.

pub mod admin;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use axum::http::HeaderMap;
use common::Identity;

use crate::error::ApiError;

/// Extracts the verified identity the auth collaborator attached upstream.
///
/// The core trusts this header as-is; requests without it never reach the
/// pipeline.
pub(crate) fn require_identity(headers: &HeaderMap) -> Result<Identity, ApiError> {
    headers
        .get("x-identity")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(Identity::new)
        .ok_or(ApiError::MissingIdentity)
}
