use crate::state::CallStatus;
use crate::transport::PeerConnectionState;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::PeerId;
use tokio::sync::watch;
use tracing::debug;

/// Per-peer call status, observable by the UI and the media controller.
#[derive(Clone, Default)]
pub struct SessionStateStore {
    statuses: Arc<DashMap<PeerId, watch::Sender<CallStatus>>>,
}

impl SessionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `peer_id` as idle, replacing any earlier status.
    pub fn track(&self, peer_id: &PeerId) {
        self.set(peer_id, CallStatus::Idle);
    }

    pub fn on_connection_state(&self, peer_id: &PeerId, state: PeerConnectionState) {
        self.set(peer_id, state.into());
    }

    pub fn on_hang_up(&self, peer_id: &PeerId) {
        self.set(peer_id, CallStatus::Disconnected);
    }

    pub fn status(&self, peer_id: &PeerId) -> Option<CallStatus> {
        self.statuses.get(peer_id).map(|tx| *tx.borrow())
    }

    /// Watches one peer. Unknown peers start out idle.
    pub fn observe(&self, peer_id: &PeerId) -> watch::Receiver<CallStatus> {
        self.statuses
            .entry(peer_id.clone())
            .or_insert_with(|| watch::channel(CallStatus::Idle).0)
            .subscribe()
    }

    fn set(&self, peer_id: &PeerId, status: CallStatus) {
        let entry = self
            .statuses
            .entry(peer_id.clone())
            .or_insert_with(|| watch::channel(status).0);
        let previous = entry.send_replace(status);
        if previous != status {
            debug!("Call status for {:?}: {:?} -> {:?}", peer_id, previous, status);
        }
    }
}
