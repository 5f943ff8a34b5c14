use async_trait::async_trait;
use bytes::Bytes;
use tandem_core::{PeerId, RemoteTrack, SessionOrigin};

/// Application hooks invoked from a session's event loop. Every hook
/// defaults to doing nothing.
#[async_trait]
pub trait CallBehavior: Send + Sync + 'static {
    async fn on_session_opened(&self, _peer_id: PeerId, _origin: SessionOrigin) {}

    async fn on_remote_track(&self, _peer_id: PeerId, _track: RemoteTrack) {}

    async fn on_data_channel_open(&self, _peer_id: PeerId, _label: String) {}

    async fn on_message(&self, _peer_id: PeerId, _data: Bytes) {}

    async fn on_session_closed(&self, _peer_id: PeerId) {}
}

pub struct NoopBehavior;

impl CallBehavior for NoopBehavior {}
