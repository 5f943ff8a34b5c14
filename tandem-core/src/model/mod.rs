mod description;
mod media;
mod peer;
mod signaling;

pub use description::{IceCandidate, SdpType, SessionDescription};
pub use media::{MediaKind, RemoteTrack, TrackId, TrackSource};
pub use peer::{PeerId, Role, SessionOrigin};
pub use signaling::{Exchange, IceServerConfig, InboundSignal, OutboundSignal};
