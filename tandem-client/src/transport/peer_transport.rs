use crate::media::LocalTrack;
use crate::transport::{TransportConfig, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tandem_core::{IceCandidate, PeerId, SessionDescription, TrackId};
use tokio::sync::mpsc;

/// The connectivity-establishment object behind one session. Offer/answer
/// generation, ICE and media plumbing live behind this seam; the
/// negotiation engine only sequences the calls.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Also accepts a rollback description, which discards a pending local offer.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<()>;

    /// Swap the media feeding the sender of `old` without renegotiating.
    async fn replace_track(&self, old: &TrackId, track: Arc<LocalTrack>) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<()>;

    async fn send_data(&self, data: Bytes) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds a transport for a new session. `event_tx` is where the transport
/// reports candidates, remote tracks and state changes.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn connect(
        &self,
        peer_id: PeerId,
        config: TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>>;
}
