use crate::transport::PeerConnectionState;
use serde::Serialize;

/// Connection status as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl From<PeerConnectionState> for CallStatus {
    fn from(state: PeerConnectionState) -> Self {
        match state {
            PeerConnectionState::New => CallStatus::Idle,
            PeerConnectionState::Connecting => CallStatus::Connecting,
            PeerConnectionState::Connected => CallStatus::Connected,
            PeerConnectionState::Disconnected | PeerConnectionState::Closed => {
                CallStatus::Disconnected
            }
            PeerConnectionState::Failed => CallStatus::Failed,
        }
    }
}
