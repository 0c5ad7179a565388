//! Unified error type for shelfcast.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for HTTP handlers to derive a status code via [`Error::http_status`].
//!
//! Segment delivery deliberately reports every "not ready yet" condition as a
//! 404 so that HLS players fall back to their normal retry loop; only a
//! triggered reset and an unknown stream are server errors.

use std::fmt;
use std::path::Path;

/// Unified error type covering all failure modes in shelfcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "stream").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The segment is not on disk yet, or another request is already
    /// waiting on it.
    #[error("Segment not available yet: {path}")]
    SegmentPending {
        /// Resolved on-disk path of the segment.
        path: String,
    },

    /// The stream is rebuilding its segment set after a reset.
    #[error("Stream {stream_id} is resetting")]
    StreamResetting {
        /// The stream being reset.
        stream_id: String,
    },

    /// The requested segment will never be produced by the current encode;
    /// a reset to `start_time` has been published.
    #[error("Stream {stream_id} reset to {start_time}s")]
    StreamReset {
        /// The stream that was reset.
        stream_id: String,
        /// Playback position (seconds) the encode restarts from.
        start_time: f64,
    },

    /// Segments were requested for a stream the session registry does not
    /// know about.
    #[error("Stream does not exist: {stream_id}")]
    UnknownStream {
        /// The unknown stream identifier.
        stream_id: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::SegmentPending { .. } => 404,
            Error::StreamResetting { .. } => 404,
            Error::StreamReset { .. } => 500,
            Error::UnknownStream { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::SegmentPending`].
    pub fn segment_pending(path: &Path) -> Self {
        Error::SegmentPending {
            path: path.display().to_string(),
        }
    }

    /// Convenience constructor for [`Error::StreamResetting`].
    pub fn stream_resetting(stream_id: impl fmt::Display) -> Self {
        Error::StreamResetting {
            stream_id: stream_id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::StreamReset`].
    pub fn stream_reset(stream_id: impl fmt::Display, start_time: f64) -> Self {
        Error::StreamReset {
            stream_id: stream_id.to_string(),
            start_time,
        }
    }

    /// Convenience constructor for [`Error::UnknownStream`].
    pub fn unknown_stream(stream_id: impl fmt::Display) -> Self {
        Error::UnknownStream {
            stream_id: stream_id.to_string(),
        }
    }

    /// Whether the client is expected to retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SegmentPending { .. } | Error::StreamResetting { .. }
        )
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
