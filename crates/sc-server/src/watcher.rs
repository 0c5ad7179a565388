//! Segment watcher background task.
//!
//! Watches the streams root for media segments written by the transcoder and
//! feeds their ordinals into the owning stream, which advances its encode
//! window and ends a pending reset once output at the new position appears.

use std::path::Path;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio_util::sync::CancellationToken;

use sc_core::StreamId;
use sc_hls::lock::LOCK_SUFFIX;
use sc_hls::{parse_ordinal, SegmentKind};

use crate::context::AppContext;

/// Map a filesystem path to `(stream id, segment ordinal)`.
///
/// Only `<root>/<stream_id>/<prefix>-<n>.<ts|m4s>` qualifies; lock markers,
/// playlists and init segments yield `None`.
pub fn segment_from_path(path: &Path) -> Option<(StreamId, u64)> {
    let filename = path.file_name()?.to_str()?;
    if filename.ends_with(LOCK_SUFFIX) || !SegmentKind::from_filename(filename).is_media_segment()
    {
        return None;
    }
    let ordinal = parse_ordinal(filename).ok()?;
    let stream_id = path.parent()?.file_name()?.to_str()?;
    Some((StreamId::from(stream_id), ordinal))
}

/// Run the segment watcher until `cancel` fires.
pub async fn run_watcher(ctx: AppContext, cancel: CancellationToken) {
    let streams = &ctx.config.streams;
    if !streams.watch {
        tracing::info!("Segment watcher disabled");
        return;
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<std::path::PathBuf>();

    let mut watcher: RecommendedWatcher =
        match notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
                    ) {
                        for path in event.paths {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::warn!("Segment watcher error: {e}"),
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                tracing::error!("Failed to create segment watcher: {e}");
                return;
            }
        };

    if let Err(e) = watcher.watch(&streams.root, RecursiveMode::Recursive) {
        tracing::warn!("Failed to watch {}: {e}", streams.root.display());
        return;
    }
    tracing::info!("Watching streams root: {}", streams.root.display());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => {
                let Some(path) = received else { break };
                let Some((stream_id, ordinal)) = segment_from_path(&path) else {
                    continue;
                };
                match ctx.registry.get(&stream_id) {
                    Some(stream) => {
                        tracing::trace!(stream_id = %stream_id, segment = ordinal, "Segment written");
                        stream.mark_segment_created(ordinal);
                    }
                    None => {
                        tracing::debug!(stream_id = %stream_id, "Segment for unregistered stream");
                    }
                }
            }
        }
    }

    tracing::info!("Segment watcher stopped");
    drop(watcher);
}
