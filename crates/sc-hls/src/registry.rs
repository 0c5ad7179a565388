//! In-memory playback-session registry.
//!
//! Tracks every active transcode and its encode window with automatic
//! cleanup of idle streams. The delivery path sees it only through the
//! [`SessionRegistry`] / [`StreamHandle`] traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use sc_core::config::StreamsConfig;
use sc_core::StreamId;
use serde::{Deserialize, Serialize};

use crate::reset::{SessionRegistry, StreamHandle};

/// Registry-wide tuning shared by all streams.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Segment duration used when a stream does not specify one.
    pub default_segment_length: f64,
    /// Requests further than this past the newest segment trigger a reset.
    pub max_forward_gap: u64,
    /// Segments of lead-in before the requested one when restarting.
    pub reset_lead_segments: u64,
    /// Duration after which an idle stream is considered expired.
    pub expiry: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self::from(&StreamsConfig::default())
    }
}

impl From<&StreamsConfig> for RegistrySettings {
    fn from(config: &StreamsConfig) -> Self {
        Self {
            default_segment_length: config.segment_length_secs,
            max_forward_gap: config.max_forward_gap,
            reset_lead_segments: config.reset_lead_segments,
            expiry: Duration::from_secs(config.session_expiry_secs),
        }
    }
}

/// Parameters for registering a stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Explicit id; a random one is generated when absent.
    pub id: Option<StreamId>,
    /// Segment duration in seconds.
    pub segment_length_secs: Option<f64>,
    /// Playback position the first encode starts from.
    pub start_time_secs: f64,
}

/// Serializable snapshot of a stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub id: StreamId,
    pub segment_length_secs: f64,
    pub start_ordinal: u64,
    pub furthest_segment: Option<u64>,
    pub resetting: bool,
    pub complete: bool,
    pub reset_count: u32,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug)]
struct EncodeState {
    start_ordinal: u64,
    furthest_segment: Option<u64>,
    resetting: bool,
    /// Ordinal whose request triggered the current reset.
    reset_target: Option<u64>,
    complete: bool,
    reset_count: u32,
    last_seen: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// TranscodeStream
// ---------------------------------------------------------------------------

/// One active transcode and its encode window.
#[derive(Debug)]
pub struct TranscodeStream {
    id: StreamId,
    segment_length: f64,
    max_forward_gap: u64,
    reset_lead_segments: u64,
    started_at: DateTime<Utc>,
    state: Mutex<EncodeState>,
}

impl TranscodeStream {
    fn new(id: StreamId, options: &StreamOptions, settings: &RegistrySettings) -> Self {
        let segment_length = options
            .segment_length_secs
            .filter(|len| *len > 0.0)
            .unwrap_or(settings.default_segment_length);
        let start_ordinal = ordinal_at(options.start_time_secs, segment_length);
        let now = Utc::now();

        Self {
            id,
            segment_length,
            max_forward_gap: settings.max_forward_gap,
            reset_lead_segments: settings.reset_lead_segments,
            started_at: now,
            state: Mutex::new(EncodeState {
                start_ordinal,
                furthest_segment: None,
                resetting: false,
                reset_target: None,
                complete: false,
                reset_count: 0,
                last_seen: now,
            }),
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Record client activity.
    pub fn touch(&self) {
        self.state.lock().last_seen = Utc::now();
    }

    /// Record that the transcoder wrote segment `ordinal`.
    ///
    /// While resetting, only output inside the restarted encode's window
    /// (from its start up to `max_forward_gap` past the requested segment)
    /// counts; the first such segment ends the reset.
    pub fn mark_segment_created(&self, ordinal: u64) {
        let mut state = self.state.lock();

        if state.resetting {
            let window_end = state
                .reset_target
                .map_or(u64::MAX, |target| target.saturating_add(self.max_forward_gap));
            if ordinal < state.start_ordinal || ordinal > window_end {
                tracing::trace!(
                    stream_id = %self.id,
                    segment = ordinal,
                    "Ignoring output of previous encode"
                );
                return;
            }
            state.resetting = false;
            state.reset_target = None;
            tracing::info!(stream_id = %self.id, segment = ordinal, "Stream reset complete");
        }

        if state.furthest_segment.map_or(true, |f| ordinal > f) {
            state.furthest_segment = Some(ordinal);
        }
    }

    /// End a reset without waiting for new output.
    pub fn finish_reset(&self) {
        let mut state = self.state.lock();
        if state.resetting {
            state.resetting = false;
            state.reset_target = None;
            tracing::info!(stream_id = %self.id, "Stream reset finished");
        }
    }

    /// Record that the transcoder produced the whole item.
    pub fn mark_complete(&self) {
        self.state.lock().complete = true;
        tracing::info!(stream_id = %self.id, "Transcode complete");
    }

    pub fn info(&self) -> StreamInfo {
        let state = self.state.lock();
        StreamInfo {
            id: self.id.clone(),
            segment_length_secs: self.segment_length,
            start_ordinal: state.start_ordinal,
            furthest_segment: state.furthest_segment,
            resetting: state.resetting,
            complete: state.complete,
            reset_count: state.reset_count,
            started_at: self.started_at,
            last_seen: state.last_seen,
        }
    }

    fn last_seen(&self) -> DateTime<Utc> {
        self.state.lock().last_seen
    }

    fn evaluate(&self, ordinal: u64) -> Option<f64> {
        let mut state = self.state.lock();
        state.last_seen = Utc::now();

        if state.resetting {
            return None;
        }

        let diverged = if ordinal < state.start_ordinal {
            tracing::warn!(
                stream_id = %self.id,
                segment = ordinal,
                start = state.start_ordinal,
                "Segment requested before encode start"
            );
            true
        } else if state.complete {
            false
        } else {
            match state.furthest_segment {
                Some(furthest) if ordinal.saturating_sub(furthest) > self.max_forward_gap => {
                    tracing::info!(
                        stream_id = %self.id,
                        segment = ordinal,
                        furthest,
                        "Segment requested too far ahead of encode"
                    );
                    true
                }
                _ => false,
            }
        };

        if !diverged {
            return None;
        }

        let start_time = ordinal as f64 * self.segment_length;
        state.start_ordinal = ordinal.saturating_sub(self.reset_lead_segments);
        state.furthest_segment = None;
        state.complete = false;
        state.resetting = true;
        state.reset_target = Some(ordinal);
        state.reset_count += 1;

        tracing::info!(
            stream_id = %self.id,
            start_time,
            encode_start = state.start_ordinal,
            "Reset transcode"
        );

        Some(start_time)
    }
}

#[async_trait]
impl StreamHandle for TranscodeStream {
    fn id(&self) -> &StreamId {
        &self.id
    }

    fn is_resetting(&self) -> bool {
        self.state.lock().resetting
    }

    async fn check_segment_number_request(&self, ordinal: u64) -> Option<f64> {
        self.evaluate(ordinal)
    }
}

fn ordinal_at(time_secs: f64, segment_length: f64) -> u64 {
    if time_secs > 0.0 && segment_length > 0.0 {
        (time_secs / segment_length).floor() as u64
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// StreamRegistry
// ---------------------------------------------------------------------------

/// Thread-safe registry of active streams.
#[derive(Clone)]
pub struct StreamRegistry {
    streams: Arc<DashMap<StreamId, Arc<TranscodeStream>>>,
    settings: RegistrySettings,
}

impl StreamRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Register a new stream, replacing any stream with the same id.
    pub fn register(&self, options: StreamOptions) -> Arc<TranscodeStream> {
        let id = options.id.clone().unwrap_or_default();
        let stream = Arc::new(TranscodeStream::new(id.clone(), &options, &self.settings));

        if self.streams.insert(id.clone(), stream.clone()).is_some() {
            tracing::warn!(stream_id = %id, "Replaced existing stream");
        }
        tracing::info!(
            stream_id = %id,
            segment_length = stream.segment_length,
            "Registered stream"
        );

        stream
    }

    pub fn get(&self, stream_id: &StreamId) -> Option<Arc<TranscodeStream>> {
        self.streams.get(stream_id).map(|entry| entry.value().clone())
    }

    /// Remove a stream, returning it if it existed.
    pub fn remove(&self, stream_id: &StreamId) -> Option<Arc<TranscodeStream>> {
        let (_, stream) = self.streams.remove(stream_id)?;
        tracing::info!(
            stream_id = %stream_id,
            duration_secs = (Utc::now() - stream.started_at).num_seconds(),
            "Removed stream"
        );
        Some(stream)
    }

    /// Record client activity on a stream; unknown ids are ignored.
    pub fn touch(&self, stream_id: &StreamId) {
        if let Some(stream) = self.streams.get(stream_id) {
            stream.touch();
        }
    }

    pub fn list(&self) -> Vec<StreamInfo> {
        let mut infos: Vec<StreamInfo> = self.streams.iter().map(|e| e.value().info()).collect();
        infos.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        infos
    }

    /// Remove streams idle for longer than the configured expiry.
    ///
    /// Returns the removed ids.
    pub fn cleanup_expired(&self) -> Vec<StreamId> {
        let now = Utc::now();
        let expiry = chrono::Duration::from_std(self.settings.expiry)
            .unwrap_or_else(|_| chrono::Duration::seconds(3600));

        let mut removed = Vec::new();
        self.streams.retain(|stream_id, stream| {
            let idle = now - stream.last_seen();
            if idle > expiry {
                tracing::info!(
                    stream_id = %stream_id,
                    inactive_secs = idle.num_seconds(),
                    "Expired stream removed"
                );
                removed.push(stream_id.clone());
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            tracing::debug!(removed = removed.len(), "Cleaned up expired streams");
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}

impl SessionRegistry for StreamRegistry {
    fn get_stream(&self, stream_id: &StreamId) -> Option<Arc<dyn StreamHandle>> {
        self.get(stream_id).map(|s| s as Arc<dyn StreamHandle>)
    }
}

/// Start a background task that periodically drops expired streams.
///
/// `on_expired` is called with every removed id.
pub fn start_cleanup_task<F>(
    registry: StreamRegistry,
    interval: Duration,
    on_expired: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn(&StreamId) + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            for id in registry.cleanup_expired() {
                on_expired(&id);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RegistrySettings {
        RegistrySettings {
            default_segment_length: 6.0,
            max_forward_gap: 10,
            reset_lead_segments: 5,
            expiry: Duration::from_secs(60),
        }
    }

    fn stream(registry: &StreamRegistry, id: &str) -> Arc<TranscodeStream> {
        registry.register(StreamOptions {
            id: Some(StreamId::from(id)),
            ..Default::default()
        })
    }

    #[test]
    fn register_and_lookup() {
        let registry = StreamRegistry::new(settings());
        let s = stream(&registry, "s1");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&"s1".into()).unwrap().id(), s.id());
        assert!(registry.get_stream(&"s1".into()).is_some());
        assert!(registry.get_stream(&"s2".into()).is_none());
    }

    #[test]
    fn register_without_id_generates_one() {
        let registry = StreamRegistry::new(settings());
        let s = registry.register(StreamOptions::default());
        assert!(!s.id().as_str().is_empty());
        assert_eq!(registry.list()[0].segment_length_secs, 6.0);
    }

    #[test]
    fn start_time_sets_start_ordinal() {
        let registry = StreamRegistry::new(settings());
        let s = registry.register(StreamOptions {
            start_time_secs: 61.0,
            segment_length_secs: Some(10.0),
            ..Default::default()
        });
        assert_eq!(s.info().start_ordinal, 6);
    }

    #[tokio::test]
    async fn within_window_needs_no_reset() {
        let registry = StreamRegistry::new(settings());
        let s = stream(&registry, "s1");
        s.mark_segment_created(3);

        assert_eq!(s.check_segment_number_request(4).await, None);
        assert_eq!(s.check_segment_number_request(13).await, None);
        assert!(!s.is_resetting());
    }

    #[tokio::test]
    async fn far_ahead_resets() {
        let registry = StreamRegistry::new(settings());
        let s = stream(&registry, "s1");
        s.mark_segment_created(3);

        assert_eq!(s.check_segment_number_request(20).await, Some(120.0));
        assert!(s.is_resetting());
        let info = s.info();
        assert_eq!(info.start_ordinal, 15);
        assert_eq!(info.furthest_segment, None);
        assert_eq!(info.reset_count, 1);

        // Further checks while resetting do not trigger again.
        assert_eq!(s.check_segment_number_request(100).await, None);
        assert_eq!(s.info().reset_count, 1);
    }

    #[tokio::test]
    async fn before_start_resets() {
        let registry = StreamRegistry::new(settings());
        let s = registry.register(StreamOptions {
            id: Some("s1".into()),
            start_time_secs: 600.0,
            ..Default::default()
        });
        assert_eq!(s.info().start_ordinal, 100);

        assert_eq!(s.check_segment_number_request(2).await, Some(12.0));
        assert_eq!(s.info().start_ordinal, 0);
    }

    #[tokio::test]
    async fn complete_transcode_never_resets_forward() {
        let registry = StreamRegistry::new(settings());
        let s = stream(&registry, "s1");
        s.mark_segment_created(3);
        s.mark_complete();

        assert_eq!(s.check_segment_number_request(500).await, None);
    }

    #[tokio::test]
    async fn no_output_yet_never_resets_forward() {
        let registry = StreamRegistry::new(settings());
        let s = stream(&registry, "s1");
        assert_eq!(s.check_segment_number_request(500).await, None);
    }

    #[tokio::test]
    async fn new_output_ends_reset() {
        let registry = StreamRegistry::new(settings());
        let s = stream(&registry, "s1");
        s.mark_segment_created(1);
        s.check_segment_number_request(40).await.unwrap();
        assert!(s.is_resetting());

        // Stale output from the old encode is ignored.
        s.mark_segment_created(2);
        assert!(s.is_resetting());

        s.mark_segment_created(35);
        assert!(!s.is_resetting());
        assert_eq!(s.info().furthest_segment, Some(35));
    }

    #[tokio::test]
    async fn backward_seek_ignores_old_encode_output() {
        let registry = StreamRegistry::new(settings());
        let s = registry.register(StreamOptions {
            id: Some("s1".into()),
            start_time_secs: 600.0,
            ..Default::default()
        });
        s.mark_segment_created(100);

        assert_eq!(s.check_segment_number_request(2).await, Some(12.0));
        assert_eq!(s.info().start_ordinal, 0);

        // The old encoder keeps writing past the new window.
        s.mark_segment_created(101);
        assert!(s.is_resetting());
        assert_eq!(s.info().furthest_segment, None);

        s.mark_segment_created(0);
        assert!(!s.is_resetting());
        assert_eq!(s.info().furthest_segment, Some(0));

        // Forward checks are measured against the new encode.
        assert_eq!(s.check_segment_number_request(105).await, Some(630.0));
    }

    #[test]
    fn finish_reset_clears_flag() {
        let registry = StreamRegistry::new(settings());
        let s = stream(&registry, "s1");
        s.evaluate(0);
        s.mark_segment_created(1);
        assert!(s.evaluate(50).is_some());
        s.finish_reset();
        assert!(!s.is_resetting());
    }

    #[test]
    fn remove_stream() {
        let registry = StreamRegistry::new(settings());
        stream(&registry, "s1");
        assert!(registry.remove(&"s1".into()).is_some());
        assert!(registry.remove(&"s1".into()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn cleanup_removes_idle_streams() {
        let registry = StreamRegistry::new(RegistrySettings {
            expiry: Duration::from_millis(10),
            ..settings()
        });
        stream(&registry, "s1");
        std::thread::sleep(Duration::from_millis(50));
        stream(&registry, "s2");

        let removed = registry.cleanup_expired();
        assert_eq!(removed, vec![StreamId::from("s1")]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cleanup_keeps_active_streams() {
        let registry = StreamRegistry::new(settings());
        stream(&registry, "s1");
        assert!(registry.cleanup_expired().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_task_reports_expired() {
        let registry = StreamRegistry::new(RegistrySettings {
            expiry: Duration::from_millis(10),
            ..settings()
        });
        stream(&registry, "s1");

        let expired = Arc::new(Mutex::new(Vec::new()));
        let sink = expired.clone();
        let handle = start_cleanup_task(registry.clone(), Duration::from_millis(50), move |id| {
            sink.lock().push(id.clone())
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();

        assert!(registry.is_empty());
        assert_eq!(*expired.lock(), vec![StreamId::from("s1")]);
    }
}
