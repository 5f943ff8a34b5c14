use crate::model::description::{IceCandidate, SessionDescription};
use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Which event family an offer/answer pair travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// First exchange of a session (`user:call` / `call:accepted`).
    Call,
    /// Any later exchange (`peer:nego:needed` / `peer:nego:done`).
    Renegotiation,
}

/// Events delivered to us by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundSignal {
    #[serde(rename = "user:joined")]
    PeerJoined {
        #[serde(rename = "id", alias = "peerId")]
        peer_id: PeerId,
        #[serde(rename = "email", alias = "displayLabel", default)]
        display_label: String,
    },

    #[serde(rename = "incomming:call")]
    IncomingCall {
        from: PeerId,
        offer: SessionDescription,
    },

    #[serde(rename = "call:accepted")]
    CallAccepted {
        from: PeerId,
        #[serde(rename = "ans", alias = "answer")]
        answer: SessionDescription,
    },

    #[serde(rename = "peer:nego:needed")]
    RenegotiationOffer {
        from: PeerId,
        offer: SessionDescription,
    },

    /// The relay strips the sender here, so `from` is usually absent.
    #[serde(rename = "peer:nego:final")]
    RenegotiationAnswer {
        #[serde(default)]
        from: Option<PeerId>,
        #[serde(rename = "ans", alias = "answer")]
        answer: SessionDescription,
    },

    #[serde(rename = "peer:ice")]
    IceCandidate {
        from: PeerId,
        candidate: IceCandidate,
    },

    #[serde(rename = "ice:config")]
    IceConfig {
        #[serde(rename = "iceServers")]
        ice_servers: Vec<IceServerConfig>,
    },
}

impl InboundSignal {
    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            InboundSignal::PeerJoined { peer_id, .. } => Some(peer_id),
            InboundSignal::IncomingCall { from, .. }
            | InboundSignal::CallAccepted { from, .. }
            | InboundSignal::RenegotiationOffer { from, .. }
            | InboundSignal::IceCandidate { from, .. } => Some(from),
            InboundSignal::RenegotiationAnswer { from, .. } => from.as_ref(),
            InboundSignal::IceConfig { .. } => None,
        }
    }
}

/// Messages we hand to the relay. Everything peer-bound names its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundSignal {
    #[serde(rename = "room:join")]
    JoinRoom { email: String, room: String },

    #[serde(rename = "user:call")]
    Call {
        to: PeerId,
        offer: SessionDescription,
    },

    #[serde(rename = "call:accepted")]
    CallAccepted {
        to: PeerId,
        #[serde(rename = "ans")]
        answer: SessionDescription,
    },

    #[serde(rename = "peer:nego:needed")]
    RenegotiationOffer {
        to: PeerId,
        offer: SessionDescription,
    },

    #[serde(rename = "peer:nego:done")]
    RenegotiationAnswer {
        to: PeerId,
        #[serde(rename = "ans")]
        answer: SessionDescription,
    },

    #[serde(rename = "peer:ice")]
    IceCandidate { to: PeerId, candidate: IceCandidate },
}

impl OutboundSignal {
    pub fn offer(to: PeerId, offer: SessionDescription, exchange: Exchange) -> Self {
        match exchange {
            Exchange::Call => OutboundSignal::Call { to, offer },
            Exchange::Renegotiation => OutboundSignal::RenegotiationOffer { to, offer },
        }
    }

    pub fn answer(to: PeerId, answer: SessionDescription, exchange: Exchange) -> Self {
        match exchange {
            Exchange::Call => OutboundSignal::CallAccepted { to, answer },
            Exchange::Renegotiation => OutboundSignal::RenegotiationAnswer { to, answer },
        }
    }

    pub fn target(&self) -> Option<&PeerId> {
        match self {
            OutboundSignal::JoinRoom { .. } => None,
            OutboundSignal::Call { to, .. }
            | OutboundSignal::CallAccepted { to, .. }
            | OutboundSignal::RenegotiationOffer { to, .. }
            | OutboundSignal::RenegotiationAnswer { to, .. }
            | OutboundSignal::IceCandidate { to, .. } => Some(to),
        }
    }
}
