//! Request-to-path resolution.

use std::path::{Path, PathBuf};

use sc_core::{Error, Result, StreamId};

use crate::lock::LOCK_SUFFIX;

/// Join `streams_root/stream_id/filename`.
///
/// Both the stream id and the filename must be a single plain path
/// component, so the result can never leave `streams_root/stream_id`. Lock
/// markers are not servable.
pub fn resolve(streams_root: &Path, stream_id: &StreamId, filename: &str) -> Result<PathBuf> {
    let dir = stream_dir(streams_root, stream_id)?;
    check_component("segment filename", filename)?;

    if filename.ends_with(LOCK_SUFFIX) {
        return Err(Error::Validation(format!(
            "Invalid segment filename: {filename}"
        )));
    }

    Ok(dir.join(filename))
}

/// Directory holding the files of `stream_id`.
pub fn stream_dir(streams_root: &Path, stream_id: &StreamId) -> Result<PathBuf> {
    check_component("stream id", stream_id.as_str())?;
    Ok(streams_root.join(stream_id.as_str()))
}

fn check_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty()
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0')
        || value.contains("..")
        || value.starts_with('.')
    {
        return Err(Error::Validation(format!("Invalid {what}: {value:?}")));
    }
    Ok(())
}
