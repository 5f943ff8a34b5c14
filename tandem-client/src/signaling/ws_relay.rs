use crate::signaling::{SignalingOutput, Subscription};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tandem_core::{InboundSignal, OutboundSignal};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// JSON-over-WebSocket link to the room relay.
///
/// Outbound signals are queued to a writer task; inbound text frames are
/// decoded into [`InboundSignal`]s and handed out through the receiver
/// returned by [`WsRelay::connect`]. Both tasks stop when the relay is dropped.
pub struct WsRelay {
    outgoing: mpsc::Sender<OutboundSignal>,
    _writer: Subscription,
    _reader: Subscription,
}

impl WsRelay {
    pub async fn connect(
        url: &str,
        timeout: Duration,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<InboundSignal>)> {
        info!("Connecting to relay at {}", url);
        let (ws, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .with_context(|| format!("relay connection timed out after {timeout:?}"))?
            .context("relay handshake failed")?;

        let (mut write, mut read) = ws.split();
        let (outgoing, mut out_rx) = mpsc::channel::<OutboundSignal>(capacity);
        let (in_tx, in_rx) = mpsc::channel(capacity);

        let writer = tokio::spawn(async move {
            while let Some(signal) = out_rx.recv().await {
                let json = match serde_json::to_string(&signal) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode signal: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    warn!("Relay write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<InboundSignal>(&text) {
                            Ok(signal) => {
                                if in_tx.send(signal).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => debug!("Unrecognized relay message: {}. Text: {}", e, text),
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("Relay closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!("Relay read failed: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok((
            Self {
                outgoing,
                _writer: Subscription::new(writer),
                _reader: Subscription::new(reader),
            },
            in_rx,
        ))
    }
}

#[async_trait]
impl SignalingOutput for WsRelay {
    async fn send_signal(&self, signal: OutboundSignal) {
        if self.outgoing.send(signal).await.is_err() {
            warn!("Relay connection is gone; dropping signal");
        }
    }
}
