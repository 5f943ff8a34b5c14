use async_trait::async_trait;
use std::sync::Arc;
use tandem_client::SignalingOutput;
use tandem_core::{OutboundSignal, PeerId};
use tokio::sync::{Mutex, mpsc};

/// Mock SignalingOutput that captures all outgoing signals.
#[derive(Clone)]
pub struct MockSignalingOutput {
    /// Channel to send captured signals.
    tx: mpsc::UnboundedSender<OutboundSignal>,
    /// All captured signals (for verification).
    signals: Arc<Mutex<Vec<OutboundSignal>>>,
}

impl MockSignalingOutput {
    /// Create a new MockSignalingOutput and its receiver channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    pub async fn all(&self) -> Vec<OutboundSignal> {
        self.signals.lock().await.clone()
    }

    /// Offers and answers sent to `peer_id`, in order.
    pub async fn descriptions_for(&self, peer_id: &PeerId) -> Vec<OutboundSignal> {
        self.signals
            .lock()
            .await
            .iter()
            .filter(|s| s.target() == Some(peer_id))
            .filter(|s| !matches!(s, OutboundSignal::IceCandidate { .. }))
            .cloned()
            .collect()
    }

    pub async fn offer_count(&self) -> usize {
        self.signals
            .lock()
            .await
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    OutboundSignal::Call { .. } | OutboundSignal::RenegotiationOffer { .. }
                )
            })
            .count()
    }

    pub async fn ice_candidates_for(&self, peer_id: &PeerId) -> Vec<String> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                OutboundSignal::IceCandidate { to, candidate } if to == peer_id => {
                    Some(candidate.candidate.clone())
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_signal(&self, signal: OutboundSignal) {
        tracing::debug!("[MockSignaling] {:?}", signal);

        self.signals.lock().await.push(signal.clone());
        let _ = self.tx.send(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{Exchange, IceCandidate, SessionDescription};

    #[tokio::test]
    async fn test_mock_signaling_captures_offer() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let peer_id = PeerId::from("bob");

        signaling
            .send_offer(peer_id.clone(), SessionDescription::offer("o"), Exchange::Call)
            .await;

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, OutboundSignal::Call { .. }));
        assert_eq!(signaling.offer_count().await, 1);
    }

    #[tokio::test]
    async fn test_mock_signaling_captures_ice() {
        let (signaling, _rx) = MockSignalingOutput::new();
        let peer_id = PeerId::from("bob");

        signaling
            .send_ice(peer_id.clone(), IceCandidate::new("candidate:123"))
            .await;

        let candidates = signaling.ice_candidates_for(&peer_id).await;
        assert_eq!(candidates, vec!["candidate:123".to_string()]);
    }
}
