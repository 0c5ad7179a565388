//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server and streams sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub streams: StreamsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit (async, embedded, etc.).
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.streams.root.as_os_str().is_empty() {
            warnings.push("streams.root is empty; the working directory will be used".into());
        }

        if !(self.streams.segment_length_secs > 0.0) {
            warnings.push(format!(
                "streams.segment_length_secs is {}; reset start times will all be 0",
                self.streams.segment_length_secs
            ));
        }

        if self.streams.cleanup_interval_secs == 0 {
            warnings.push("streams.cleanup_interval_secs is 0; idle stream cleanup is disabled".into());
        }

        if self.streams.max_forward_gap == 0 {
            warnings.push(
                "streams.max_forward_gap is 0; any request past the newest segment resets the stream"
                    .into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Stream directory and transcode-window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamsConfig {
    /// Directory holding one sub-directory per stream.
    pub root: PathBuf,
    /// Streams idle for longer than this are dropped from the registry.
    pub session_expiry_secs: u64,
    /// How often the idle-stream cleanup runs (0 disables it).
    pub cleanup_interval_secs: u64,
    /// Default HLS segment duration for newly registered streams.
    pub segment_length_secs: f64,
    /// How far past the newest produced segment a request may land before
    /// the encode is restarted at the requested position.
    pub max_forward_gap: u64,
    /// How many segments before the requested one a restarted encode begins.
    pub reset_lead_segments: u64,
    /// Watch the streams root for segment files written by the transcoder.
    pub watch: bool,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./streams"),
            session_expiry_secs: 3600,
            cleanup_interval_secs: 60,
            segment_length_secs: 6.0,
            max_forward_gap: 10,
            reset_lead_segments: 5,
            watch: true,
        }
    }
}
