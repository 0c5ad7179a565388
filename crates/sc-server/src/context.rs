//! Application context shared by all route handlers via Axum state.

use std::sync::Arc;

use sc_core::config::Config;
use sc_core::events::EventBus;
use sc_hls::{RegistrySettings, SegmentResponder, StreamRegistry};

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Active transcode streams.
    pub registry: StreamRegistry,
    /// Broadcast event bus for SSE.
    pub event_bus: Arc<EventBus>,
    /// Segment delivery over the streams root.
    pub responder: SegmentResponder,
}

impl AppContext {
    /// Build a context with a fresh registry and event bus.
    pub fn new(config: Config) -> Self {
        let registry = StreamRegistry::new(RegistrySettings::from(&config.streams));
        let event_bus = Arc::new(EventBus::default());
        let responder = SegmentResponder::new(
            config.streams.root.clone(),
            Arc::new(registry.clone()),
            event_bus.clone(),
        );

        Self {
            config: Arc::new(config),
            registry,
            event_bus,
            responder,
        }
    }
}
