//! Segment delivery for one `GET /<stream_id>/<file>` request.
//!
//! Present files are returned immediately (after clearing any leftover lock
//! marker). Absent files go through the lock marker so that only the first
//! request noticing the gap evaluates it; for media segments that evaluation
//! may end in a stream reset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use sc_core::{Error, Result, StreamId};

use crate::filename::{content_type, SegmentKind};
use crate::lock::{self, LockAcquire};
use crate::reset::{ResetDecision, ResetDetector, ResetSink, SessionRegistry};
use crate::resolve::resolve;

/// A stream file ready to be sent.
#[derive(Debug, Clone)]
pub struct SegmentFile {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub body: Bytes,
}

/// Serves stream files from `streams_root`.
#[derive(Clone)]
pub struct SegmentResponder {
    streams_root: PathBuf,
    detector: ResetDetector,
}

impl SegmentResponder {
    pub fn new(
        streams_root: impl Into<PathBuf>,
        registry: Arc<dyn SessionRegistry>,
        sink: Arc<dyn ResetSink>,
    ) -> Self {
        Self {
            streams_root: streams_root.into(),
            detector: ResetDetector::new(registry, sink),
        }
    }

    pub fn streams_root(&self) -> &Path {
        &self.streams_root
    }

    /// Handle a request for `filename` of `stream_id`.
    ///
    /// Every "not ready yet" outcome is [`Error::SegmentPending`] or
    /// [`Error::StreamResetting`]; a triggered reset is
    /// [`Error::StreamReset`].
    pub async fn handle(&self, stream_id: &StreamId, filename: &str) -> Result<SegmentFile> {
        let path = resolve(&self.streams_root, stream_id, filename)?;

        if !is_file(&path).await {
            return Err(self.on_missing(stream_id, filename, &path).await);
        }

        // A poll that earlier found this segment missing left a marker behind.
        lock::clear_if_present(&path).await;

        let body = match tokio::fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::segment_pending(&path));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SegmentFile {
            content_type: content_type(filename),
            path,
            body,
        })
    }

    async fn on_missing(&self, stream_id: &StreamId, filename: &str, path: &Path) -> Error {
        tracing::debug!(stream_id = %stream_id, path = %path.display(), "File path does not exist");

        match lock::create(path).await {
            Ok(LockAcquire::Created) => {
                tracing::info!(
                    stream_id = %stream_id,
                    lock = %lock::lock_path(path).display(),
                    "Lock file created"
                );
            }
            Ok(LockAcquire::AlreadyHeld) => {
                tracing::debug!(
                    stream_id = %stream_id,
                    lock = %lock::lock_path(path).display(),
                    "Waiting for lock file to be removed"
                );
                return Error::segment_pending(path);
            }
            Err(e) => {
                // Typically the transcoder has not created the stream
                // directory yet. Without a marker every poll would look like
                // the first one, so nothing is evaluated.
                tracing::warn!(
                    stream_id = %stream_id,
                    path = %path.display(),
                    "Failed to create lock file: {e}"
                );
                return Error::segment_pending(path);
            }
        }

        if !SegmentKind::from_filename(filename).is_media_segment() {
            return Error::segment_pending(path);
        }

        match self.detector.evaluate(stream_id, filename).await {
            Ok(ResetDecision::Reset { start_time }) => Error::stream_reset(stream_id, start_time),
            Ok(ResetDecision::Resetting) => Error::stream_resetting(stream_id),
            Ok(ResetDecision::NoReset | ResetDecision::Unparsable) => Error::segment_pending(path),
            Err(e) => e,
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
