use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::context::AppContext;

/// GET /health
pub async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "streams": ctx.registry.len(),
        "subscribers": ctx.event_bus.subscriber_count(),
    }))
}
