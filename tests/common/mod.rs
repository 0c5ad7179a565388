//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary streams root, a config
//! pointing at it, and a full [`AppContext`]. The [`TestHarness::with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sc_core::config::Config;
use sc_hls::{StreamOptions, TranscodeStream};
use sc_server::context::AppContext;
use sc_server::router::build_router;
use tempfile::TempDir;

/// Test harness wrapping a fully-constructed [`AppContext`] backed by a
/// temporary streams root.
pub struct TestHarness {
    pub ctx: AppContext,
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration. The streams root is
    /// always replaced by a fresh temporary directory.
    pub fn with_config(mut config: Config) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        config.streams.root = dir.path().to_path_buf();
        config.streams.watch = false;

        Self {
            ctx: AppContext::new(config),
            dir,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Register a stream and create its directory.
    pub fn register(&self, id: &str) -> Arc<TranscodeStream> {
        std::fs::create_dir_all(self.root().join(id)).expect("failed to create stream dir");
        self.ctx.registry.register(StreamOptions {
            id: Some(id.into()),
            ..Default::default()
        })
    }

    /// Write a file into a stream directory, as the transcoder would.
    pub fn write_segment(&self, stream_id: &str, filename: &str, data: &[u8]) -> PathBuf {
        let path = self.root().join(stream_id).join(filename);
        std::fs::write(&path, data).expect("failed to write segment");
        path
    }

    pub fn lock_exists(&self, stream_id: &str, filename: &str) -> bool {
        self.root()
            .join(stream_id)
            .join(format!("{filename}.lock"))
            .exists()
    }
}
