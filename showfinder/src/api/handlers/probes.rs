use axum::Json;
use serde_json::{Value, json};

/// Liveness message kept for clients of the original API.
#[tracing::instrument]
pub async fn welcome() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Welcome!",
    }))
}

pub async fn healthz() -> &'static str {
    "OK"
}
