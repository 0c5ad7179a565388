//! sc-server: HTTP delivery server, stream lifecycle API, and background
//! tasks.
//!
//! This crate ties sc-core and sc-hls together into a running server:
//!
//! - Axum-based HLS delivery under `/hls`, stream lifecycle API and SSE
//!   under `/api`
//! - Idle-stream cleanup task
//! - Segment watcher feeding transcoder output into the session registry
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod watcher;

use std::net::SocketAddr;
use std::time::Duration;

use sc_core::config::Config;
use sc_core::events::{EventCategory, EventPayload};
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the shelfcast server.
///
/// Creates the streams root, builds the [`AppContext`], spawns the cleanup
/// task and segment watcher, and serves HTTP until a shutdown signal is
/// received.
pub async fn start(config: Config) -> sc_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let root = &config.streams.root;
    if !root.exists() {
        tokio::fs::create_dir_all(root).await?;
        tracing::info!("Created streams root {}", root.display());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| sc_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config);
    let cancel = CancellationToken::new();

    let cleanup_handle = spawn_cleanup(&ctx);

    let watcher_ctx = ctx.clone();
    let watcher_cancel = cancel.clone();
    let watcher_handle = tokio::spawn(async move {
        watcher::run_watcher(watcher_ctx, watcher_cancel).await;
    });

    let app = router::build_router(ctx);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| sc_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    cancel.cancel();
    if let Some(handle) = cleanup_handle {
        handle.abort();
    }
    let _ = watcher_handle.await;

    result.map_err(|e| sc_core::Error::Internal(format!("Server error: {e}")))?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Spawn the idle-stream cleanup task, announcing every expired stream.
fn spawn_cleanup(ctx: &AppContext) -> Option<tokio::task::JoinHandle<()>> {
    let interval_secs = ctx.config.streams.cleanup_interval_secs;
    if interval_secs == 0 {
        tracing::info!("Idle stream cleanup disabled");
        return None;
    }

    let event_bus = ctx.event_bus.clone();
    Some(sc_hls::start_cleanup_task(
        ctx.registry.clone(),
        Duration::from_secs(interval_secs),
        move |stream_id| {
            event_bus.broadcast(
                EventCategory::Admin,
                EventPayload::StreamClosed {
                    stream_id: stream_id.clone(),
                },
            );
        },
    ))
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
