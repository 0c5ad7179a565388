//! sc-hls: on-demand HLS segment delivery.
//!
//! Segments are written into `streams_root/<stream_id>/` by an external
//! transcoder while players poll for them over HTTP. The only signalling
//! channel between the two is the filesystem:
//!
//! - [`resolve`] maps a request onto a path inside the stream directory.
//! - [`filename`] extracts the segment ordinal and media kind.
//! - [`lock`] manages `<segment>.lock` markers so that only the first request
//!   noticing a missing segment evaluates it.
//! - [`reset`] decides whether a missing segment is merely late or will never
//!   exist because playback left the encoded window.
//! - [`responder`] ties the above together for one request.
//! - [`registry`] is the in-memory session registry the server plugs in.

pub mod filename;
pub mod lock;
pub mod registry;
pub mod reset;
pub mod resolve;
pub mod responder;

pub use filename::{parse_ordinal, SegmentKind};
pub use registry::{
    start_cleanup_task, RegistrySettings, StreamInfo, StreamOptions, StreamRegistry,
    TranscodeStream,
};
pub use reset::{ResetDecision, ResetDetector, ResetSink, SessionRegistry, StreamHandle};
pub use resolve::{resolve, stream_dir};
pub use responder::{SegmentFile, SegmentResponder};
