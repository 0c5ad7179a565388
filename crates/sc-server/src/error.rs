//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`sc_core::Error`] so that route handlers
//! can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: sc_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: sc_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<sc_core::Error> for AppError {
    fn from(e: sc_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self.inner {
            // Expected outcome: the player is told to restart.
            sc_core::Error::StreamReset { .. } => {
                tracing::info!(status = %status, error = %self.inner, "Stream reset response");
            }
            _ if status.is_server_error() => {
                tracing::error!(
                    status = %status,
                    error = %self.inner,
                    "Server error in API handler"
                );
            }
            // Players poll missing segments constantly.
            err if err.is_retryable() => {
                tracing::debug!(status = %status, error = %err, "Not available yet");
            }
            _ => {}
        }

        let code = match &self.inner {
            sc_core::Error::NotFound { .. } => "not_found",
            sc_core::Error::Validation(_) => "validation_error",
            sc_core::Error::Conflict(_) => "conflict",
            sc_core::Error::SegmentPending { .. } => "segment_pending",
            sc_core::Error::StreamResetting { .. } => "stream_resetting",
            sc_core::Error::StreamReset { .. } => "stream_reset",
            sc_core::Error::UnknownStream { .. } => "unknown_stream",
            sc_core::Error::Io { .. } => "io_error",
            sc_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}
