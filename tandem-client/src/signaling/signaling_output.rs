use async_trait::async_trait;
use tandem_core::{Exchange, IceCandidate, OutboundSignal, PeerId, SessionDescription};

/// Where outgoing signals go. The relay connection implements this; tests
/// plug in a recorder.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_signal(&self, signal: OutboundSignal);

    async fn send_offer(&self, peer_id: PeerId, offer: SessionDescription, exchange: Exchange) {
        self.send_signal(OutboundSignal::offer(peer_id, offer, exchange))
            .await;
    }

    async fn send_answer(&self, peer_id: PeerId, answer: SessionDescription, exchange: Exchange) {
        self.send_signal(OutboundSignal::answer(peer_id, answer, exchange))
            .await;
    }

    async fn send_ice(&self, peer_id: PeerId, candidate: IceCandidate) {
        self.send_signal(OutboundSignal::IceCandidate {
            to: peer_id,
            candidate,
        })
        .await;
    }
}
