//! HLS file delivery.
//!
//! Playlists and segments are served straight from the streams root while
//! the transcoder is still writing them. Anything not on disk yet answers
//! 404 so the player retries; a request the current encode will never
//! satisfy answers 500 after a `stream_reset` event has been published.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;

use sc_core::StreamId;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// GET /hls/{stream_id}/{file}
pub async fn serve_file(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path((stream_id, file)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let stream_id = StreamId::from(stream_id);

    let segment = ctx
        .responder
        .handle(&stream_id, &file)
        .await
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))?;

    ctx.registry.touch(&stream_id);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, segment.content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        segment.body,
    ))
}
