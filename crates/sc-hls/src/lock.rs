//! Per-segment lock markers.
//!
//! A marker is a zero-byte sibling file named `<segment>.lock`. It is a
//! cooperative "someone is already waiting on this segment" signal, not a
//! mutex: it has no owner, and whichever request later finds the segment on
//! disk removes it.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to a segment path to form its lock marker.
pub const LOCK_SUFFIX: &str = ".lock";

/// Outcome of [`create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquire {
    /// This call created the marker; the caller is the first observer.
    Created,
    /// The marker already existed.
    AlreadyHeld,
}

/// Path of the lock marker belonging to `segment`.
pub fn lock_path(segment: &Path) -> PathBuf {
    let mut name = OsString::from(segment.as_os_str());
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Whether a marker currently exists for `segment`.
pub async fn exists(segment: &Path) -> bool {
    tokio::fs::try_exists(lock_path(segment))
        .await
        .unwrap_or(false)
}

/// Atomically create the marker for `segment` if it is absent.
///
/// Losing the race to another creator is reported as
/// [`LockAcquire::AlreadyHeld`], not as an error.
pub async fn create(segment: &Path) -> io::Result<LockAcquire> {
    let path = lock_path(segment);
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(_) => Ok(LockAcquire::Created),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(LockAcquire::AlreadyHeld),
        Err(e) => Err(e),
    }
}

/// Remove the marker for `segment` if there is one.
///
/// Never fails: a marker that vanished in between, or one that cannot be
/// deleted, is only logged. Returns whether this call removed it.
pub async fn clear_if_present(segment: &Path) -> bool {
    if !exists(segment).await {
        return false;
    }

    let path = lock_path(segment);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!(lock = %path.display(), "Lock file removed");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(lock = %path.display(), "Lock file already removed");
            false
        }
        Err(e) => {
            tracing::warn!(lock = %path.display(), "Failed to remove lock file: {e}");
            false
        }
    }
}
