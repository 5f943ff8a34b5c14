use bytes::Bytes;
use tandem_core::{IceCandidate, RemoteTrack};

/// Connection state as reported by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events a transport raises for the session that owns it.
#[derive(Debug)]
pub enum TransportEvent {
    CandidateGenerated(IceCandidate),
    NegotiationNeeded,
    RemoteTrack(RemoteTrack),
    StateChanged(PeerConnectionState),
    DataChannelOpen(String),
    Message(Bytes),
}
