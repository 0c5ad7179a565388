//! Segment filename inspection.
//!
//! Transcoder output is named `<prefix>-<ordinal>.<ext>`, e.g. `output-12.ts`.

use std::path::Path;

/// The ordinal could not be read from a segment filename.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no segment ordinal in {filename:?}")]
pub struct ParseFailure {
    pub filename: String,
}

/// Extract the ordinal from `<prefix>-<ordinal>.<ext>`.
///
/// The extension is stripped, the basename split on `-`, and the second token
/// parsed as an unsigned integer.
pub fn parse_ordinal(filename: &str) -> Result<u64, ParseFailure> {
    let fail = || ParseFailure {
        filename: filename.to_owned(),
    };

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(fail)?;

    let token = stem.split('-').nth(1).ok_or_else(fail)?;
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(fail());
    }
    token.parse::<u64>().map_err(|_| fail())
}

/// What kind of file a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// MPEG transport-stream segment (`.ts`).
    TransportStream,
    /// Fragmented MP4 media segment (`.m4s`).
    FragmentedMp4,
    /// Anything else (playlist, init segment, ...).
    Other,
}

impl SegmentKind {
    pub fn from_filename(filename: &str) -> Self {
        match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some("ts") => SegmentKind::TransportStream,
            Some("m4s") => SegmentKind::FragmentedMp4,
            _ => SegmentKind::Other,
        }
    }

    /// Media segments take part in reset evaluation; other files do not.
    pub fn is_media_segment(self) -> bool {
        !matches!(self, SegmentKind::Other)
    }
}

/// Guess the MIME type of a stream file from its extension.
pub fn content_type(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("ts") => "video/mp2t",
        Some("m4s") => "video/iso.segment",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("mp4") => "video/mp4",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("vtt") => "text/vtt",
        _ => "application/octet-stream",
    }
}
