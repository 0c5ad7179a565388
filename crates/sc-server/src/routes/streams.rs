//! Stream lifecycle endpoints used by the transcoder side.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use sc_core::events::{EventCategory, EventPayload};
use sc_core::StreamId;
use sc_hls::{StreamInfo, StreamOptions, TranscodeStream};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

fn lookup(ctx: &AppContext, id: &StreamId) -> sc_core::Result<Arc<TranscodeStream>> {
    ctx.registry
        .get(id)
        .ok_or_else(|| sc_core::Error::not_found("stream", id))
}

fn with_id(request_id: &RequestId) -> impl Fn(sc_core::Error) -> AppError + '_ {
    move |e| AppError::new(e).with_request_id(request_id.0.clone())
}

/// GET /api/streams
pub async fn list_streams(State(ctx): State<AppContext>) -> Json<Vec<StreamInfo>> {
    Json(ctx.registry.list())
}

/// POST /api/streams
///
/// Registers a stream and creates its directory under the streams root.
pub async fn register_stream(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Json(options): Json<StreamOptions>,
) -> Result<impl IntoResponse, AppError> {
    let fail = with_id(&request_id);

    let id = options.id.clone().unwrap_or_default();
    let dir = sc_hls::stream_dir(&ctx.config.streams.root, &id).map_err(&fail)?;

    if ctx.registry.get(&id).is_some() {
        return Err(fail(sc_core::Error::Conflict(format!(
            "Stream {id} already exists"
        ))));
    }

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| fail(e.into()))?;

    let stream = ctx.registry.register(StreamOptions {
        id: Some(id.clone()),
        ..options
    });

    ctx.event_bus.broadcast(
        EventCategory::Admin,
        EventPayload::StreamRegistered { stream_id: id },
    );

    Ok((StatusCode::CREATED, Json(stream.info())))
}

/// GET /api/streams/{id}
pub async fn get_stream(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<StreamInfo>, AppError> {
    let stream = lookup(&ctx, &StreamId::from(id)).map_err(with_id(&request_id))?;
    Ok(Json(stream.info()))
}

/// DELETE /api/streams/{id}
pub async fn delete_stream(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = StreamId::from(id);
    ctx.registry
        .remove(&id)
        .ok_or_else(|| sc_core::Error::not_found("stream", &id))
        .map_err(with_id(&request_id))?;

    ctx.event_bus.broadcast(
        EventCategory::Admin,
        EventPayload::StreamClosed { stream_id: id },
    );

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/streams/{id}/complete
pub async fn complete_stream(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<StreamInfo>, AppError> {
    let stream = lookup(&ctx, &StreamId::from(id)).map_err(with_id(&request_id))?;
    stream.mark_complete();
    Ok(Json(stream.info()))
}

/// POST /api/streams/{id}/resume
///
/// Ends a reset once the transcoder has restarted at the new position.
pub async fn resume_stream(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<StreamInfo>, AppError> {
    let stream = lookup(&ctx, &StreamId::from(id)).map_err(with_id(&request_id))?;
    stream.finish_reset();
    Ok(Json(stream.info()))
}
