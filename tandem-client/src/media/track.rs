use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tandem_core::{MediaKind, TrackId, TrackSource};
use tokio::sync::{broadcast, watch};

/// Samples buffered per subscriber before the slowest one starts skipping.
const SAMPLE_BUFFER: usize = 64;

/// One encoded media frame on its way to the transports sending a track.
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub data: Bytes,
    pub duration: Duration,
}

/// Handle to a locally captured track. Shared between the media controller
/// and whichever session sends it.
#[derive(Debug)]
pub struct LocalTrack {
    id: TrackId,
    kind: MediaKind,
    source: TrackSource,
    label: String,
    stream_id: String,
    enabled: AtomicBool,
    ended: watch::Sender<bool>,
    samples: broadcast::Sender<MediaSample>,
}

impl LocalTrack {
    pub fn new(kind: MediaKind, source: TrackSource, label: impl Into<String>) -> Self {
        Self::with_stream(kind, source, label, default_stream_id(source))
    }

    pub fn with_stream(
        kind: MediaKind,
        source: TrackSource,
        label: impl Into<String>,
        stream_id: impl Into<String>,
    ) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            id: TrackId::new(),
            kind,
            source,
            label: label.into(),
            stream_id: stream_id.into(),
            enabled: AtomicBool::new(true),
            ended,
            samples: broadcast::channel(SAMPLE_BUFFER).0,
        }
    }

    pub fn id(&self) -> &TrackId {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the enabled flag and return the new value. Capture keeps running.
    pub fn toggle_enabled(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }

    /// End capture. Idempotent; also what the platform calls when the user
    /// stops a share from the browser's own UI.
    pub fn stop(&self) {
        self.ended.send_replace(true);
    }

    pub fn is_live(&self) -> bool {
        !*self.ended.borrow()
    }

    /// Hands a captured frame to every transport sending this track.
    /// Frames of a disabled or ended track are dropped; returns whether
    /// the frame went out.
    pub fn push_sample(&self, sample: MediaSample) -> bool {
        if !self.is_enabled() || !self.is_live() {
            return false;
        }
        let _ = self.samples.send(sample);
        true
    }

    pub fn subscribe_samples(&self) -> broadcast::Receiver<MediaSample> {
        self.samples.subscribe()
    }

    /// Resolves once the track has ended, however that happened.
    pub async fn ended(&self) {
        let mut rx = self.ended.subscribe();
        let _ = rx.wait_for(|ended| *ended).await;
    }
}

fn default_stream_id(source: TrackSource) -> &'static str {
    match source {
        TrackSource::Microphone | TrackSource::Camera => "local-camera",
        TrackSource::Screen => "local-screen",
    }
}

/// A group of tracks returned by one capture request.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<Arc<LocalTrack>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<LocalTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    pub fn track(&self, kind: MediaKind) -> Option<&Arc<LocalTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }
}
