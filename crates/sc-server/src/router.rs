//! Axum router construction.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/events", get(routes::events::events_handler))
        .route(
            "/streams",
            get(routes::streams::list_streams).post(routes::streams::register_stream),
        )
        .route(
            "/streams/{id}",
            get(routes::streams::get_stream).delete(routes::streams::delete_stream),
        )
        .route(
            "/streams/{id}/complete",
            post(routes::streams::complete_stream),
        )
        .route("/streams/{id}/resume", post(routes::streams::resume_stream));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/hls/{stream_id}/{file}", get(routes::hls::serve_file))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
