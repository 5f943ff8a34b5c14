use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tandem_client::CallBehavior;
use tandem_core::{PeerId, RemoteTrack, SessionOrigin};
use tokio::sync::Mutex;

/// Event types that can be recorded by TestCallBehavior.
#[derive(Debug, Clone)]
pub enum CallEvent {
    Opened {
        peer_id: PeerId,
        origin: SessionOrigin,
    },
    RemoteTrack {
        peer_id: PeerId,
        track: RemoteTrack,
    },
    DataChannelOpen {
        peer_id: PeerId,
        label: String,
    },
    Message {
        peer_id: PeerId,
        data: Bytes,
    },
    Closed {
        peer_id: PeerId,
    },
}

/// A test implementation of CallBehavior that records all events.
#[derive(Clone, Default)]
pub struct TestCallBehavior {
    events: Arc<Mutex<Vec<CallEvent>>>,
}

impl TestCallBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_events(&self) -> Vec<CallEvent> {
        self.events.lock().await.clone()
    }

    pub async fn remote_tracks(&self, peer_id: &PeerId) -> Vec<RemoteTrack> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                CallEvent::RemoteTrack { peer_id: id, track } if id == peer_id => {
                    Some(track.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub async fn has_closed(&self, peer_id: &PeerId) -> bool {
        self.events
            .lock()
            .await
            .iter()
            .any(|e| matches!(e, CallEvent::Closed { peer_id: id } if id == peer_id))
    }

    /// Wait until `predicate` holds for the recorded events, with timeout.
    pub async fn wait_for<F>(&self, timeout_ms: u64, predicate: F) -> bool
    where
        F: Fn(&[CallEvent]) -> bool,
    {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if predicate(&self.events.lock().await) {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    async fn record(&self, event: CallEvent) {
        self.events.lock().await.push(event);
    }
}

#[async_trait]
impl CallBehavior for TestCallBehavior {
    async fn on_session_opened(&self, peer_id: PeerId, origin: SessionOrigin) {
        self.record(CallEvent::Opened { peer_id, origin }).await;
    }

    async fn on_remote_track(&self, peer_id: PeerId, track: RemoteTrack) {
        self.record(CallEvent::RemoteTrack { peer_id, track }).await;
    }

    async fn on_data_channel_open(&self, peer_id: PeerId, label: String) {
        self.record(CallEvent::DataChannelOpen { peer_id, label })
            .await;
    }

    async fn on_message(&self, peer_id: PeerId, data: Bytes) {
        self.record(CallEvent::Message { peer_id, data }).await;
    }

    async fn on_session_closed(&self, peer_id: PeerId) {
        self.record(CallEvent::Closed { peer_id }).await;
    }
}
