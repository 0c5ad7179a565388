//! Stream reset detection.
//!
//! When the first request for a missing media segment arrives, the owning
//! stream is asked whether the requested ordinal lies inside what the current
//! encode will eventually produce. If it does not, the player must restart at
//! a new position: a reset event is published and the request fails.

use std::sync::Arc;

use async_trait::async_trait;
use sc_core::events::{EventBus, EventCategory, EventPayload};
use sc_core::{Error, Result, StreamId};

use crate::filename::parse_ordinal;

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Live state of one transcode, as seen by the delivery path.
#[async_trait]
pub trait StreamHandle: Send + Sync {
    /// Identifier used in published reset events.
    fn id(&self) -> &StreamId;

    /// Whether the stream is currently rebuilding its segment set.
    fn is_resetting(&self) -> bool;

    /// Evaluate a requested ordinal against the current encode window.
    ///
    /// Returns the playback start time (seconds) the encode restarts from
    /// when the request diverges, `None` when no reset is needed. The stream
    /// is the sole authority for reset transitions.
    async fn check_segment_number_request(&self, ordinal: u64) -> Option<f64>;
}

/// Lookup of live streams by id.
pub trait SessionRegistry: Send + Sync {
    fn get_stream(&self, stream_id: &StreamId) -> Option<Arc<dyn StreamHandle>>;
}

/// Destination for reset notifications.
pub trait ResetSink: Send + Sync {
    fn publish_reset(&self, stream_id: &StreamId, start_time: f64);
}

impl ResetSink for EventBus {
    fn publish_reset(&self, stream_id: &StreamId, start_time: f64) {
        self.broadcast(
            EventCategory::User,
            EventPayload::StreamReset {
                start_time,
                stream_id: stream_id.clone(),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Result of evaluating a missing media segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResetDecision {
    /// The segment is inside the encode window; it is just not written yet.
    NoReset,
    /// The filename carries no ordinal, so nothing can be evaluated.
    Unparsable,
    /// The stream is already mid-reset.
    Resetting,
    /// A reset to `start_time` was triggered and published.
    Reset { start_time: f64 },
}

/// Decides whether a missing segment means "retry" or "restart".
#[derive(Clone)]
pub struct ResetDetector {
    registry: Arc<dyn SessionRegistry>,
    sink: Arc<dyn ResetSink>,
}

impl ResetDetector {
    pub fn new(registry: Arc<dyn SessionRegistry>, sink: Arc<dyn ResetSink>) -> Self {
        Self { registry, sink }
    }

    /// Evaluate a missing media segment `filename` of `stream_id`.
    ///
    /// Fails only for an unknown stream. A triggered reset publishes exactly
    /// one event before returning [`ResetDecision::Reset`].
    pub async fn evaluate(&self, stream_id: &StreamId, filename: &str) -> Result<ResetDecision> {
        let ordinal = match parse_ordinal(filename) {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(stream_id = %stream_id, "Skipping reset evaluation: {e}");
                return Ok(ResetDecision::Unparsable);
            }
        };

        let Some(stream) = self.registry.get_stream(stream_id) else {
            tracing::error!(stream_id = %stream_id, "Stream does not exist");
            return Err(Error::unknown_stream(stream_id));
        };

        if stream.is_resetting() {
            tracing::info!(stream_id = %stream_id, "Stream is currently resetting");
            return Ok(ResetDecision::Resetting);
        }

        match stream.check_segment_number_request(ordinal).await {
            Some(start_time) => {
                tracing::info!(
                    stream_id = %stream_id,
                    segment = ordinal,
                    start_time,
                    "Resetting stream, notifying client"
                );
                self.sink.publish_reset(stream.id(), start_time);
                Ok(ResetDecision::Reset { start_time })
            }
            None => Ok(ResetDecision::NoReset),
        }
    }
}

// ---------------------------------------------------------------------------
// Test doubles, shared with the responder tests.
// ---------------------------------------------------------------------------
