use crate::error::Result;
use crate::media::LocalTrack;
use crate::negotiation::SessionSnapshot;
use bytes::Bytes;
use std::sync::Arc;
use tandem_core::{Exchange, IceCandidate, MediaKind, SessionDescription};
use tokio::sync::oneshot;

/// Work queued for one session's event loop.
#[derive(Debug)]
pub enum SessionCommand {
    /// Send an offer (the call, or a renegotiation once established).
    Initiate,

    ReceiveOffer {
        offer: SessionDescription,
        exchange: Exchange,
    },

    ReceiveAnswer { answer: SessionDescription },

    AddCandidate { candidate: IceCandidate },

    AttachTrack { track: Arc<LocalTrack> },

    ReplaceTrack {
        kind: MediaKind,
        track: Arc<LocalTrack>,
        reply: oneshot::Sender<Result<()>>,
    },

    SendData { data: Bytes },

    Snapshot { reply: oneshot::Sender<SessionSnapshot> },

    /// Local hang-up. The reply fires once the transport is closed.
    Close { reply: oneshot::Sender<()> },
}
