//! Liveness endpoint.

use axum::Json;

/// GET /health — liveness probe.
///
/// All stores are in-process, so being able to answer at all is the whole
/// check.
pub async fn check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "flash-sale-core",
    }))
}
