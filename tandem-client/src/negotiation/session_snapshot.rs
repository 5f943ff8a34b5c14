use crate::negotiation::SignalingState;
use tandem_core::{MediaKind, PeerId, RemoteTrack, Role, SessionDescription, TrackId};

/// Point-in-time view of a session, for observers and tests.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub peer_id: PeerId,
    pub role: Role,
    pub signaling_state: SignalingState,
    pub established: bool,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,
    pub pending_candidates: usize,
    pub local_tracks: Vec<(TrackId, MediaKind)>,
    pub remote_tracks: Vec<RemoteTrack>,
    pub data_channel: Option<String>,
}

impl SessionSnapshot {
    pub fn remote_track_count(&self, kind: MediaKind) -> usize {
        self.remote_tracks.iter().filter(|t| t.kind == kind).count()
    }
}
