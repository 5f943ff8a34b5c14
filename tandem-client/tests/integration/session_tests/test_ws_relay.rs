use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tandem_client::{ClientConfig, SignalingAdapter, SignalingOutput, WsRelay};
use tandem_core::{InboundSignal, OutboundSignal, PeerId};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::integration::init_tracing;
use crate::utils::{LoopbackFactory, SETTLE_TIMEOUT_MS, wait_until};

/// A one-connection relay: sends `greeting`, then echoes back every text
/// frame it receives on `seen`.
async fn spawn_relay(greeting: &'static str) -> (String, tokio::sync::mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(greeting.into())).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = seen_tx.send(text.to_string()).await;
            }
        }
    });

    (url, seen_rx)
}

#[tokio::test]
async fn test_relay_frames_round_trip() {
    init_tracing();

    let (url, mut seen) =
        spawn_relay(r#"{"event":"user:joined","data":{"id":"bob","email":"bob@example.com"}}"#)
            .await;
    let (relay, mut inbound) = WsRelay::connect(&url, Duration::from_secs(5), 16)
        .await
        .unwrap();

    let signal = inbound.recv().await.unwrap();
    assert_eq!(
        signal,
        InboundSignal::PeerJoined {
            peer_id: PeerId::from("bob"),
            display_label: "bob@example.com".into(),
        }
    );

    relay
        .send_signal(OutboundSignal::JoinRoom {
            email: "alice@example.com".into(),
            room: "standup".into(),
        })
        .await;
    let text = seen.recv().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["event"], "room:join");
    assert_eq!(json["data"]["room"], "standup");
}

#[tokio::test]
async fn test_relay_feeds_the_adapter() {
    init_tracing();

    let (url, _seen) =
        spawn_relay(r#"{"event":"user:joined","data":{"id":"bob","email":"bob@example.com"}}"#)
            .await;
    let (relay, inbound) = WsRelay::connect(&url, Duration::from_secs(5), 16)
        .await
        .unwrap();

    let adapter = SignalingAdapter::new(
        ClientConfig::default(),
        std::sync::Arc::new(relay),
        std::sync::Arc::new(LoopbackFactory::new("alice")),
    );
    let _pump = adapter.subscribe(inbound);

    let registry = adapter.registry();
    let bob = PeerId::from("bob");
    let bob_ref = &bob;
    assert!(
        wait_until(SETTLE_TIMEOUT_MS, || async move { registry.contains(bob_ref) }).await,
        "joined peer never reached the adapter"
    );
}

#[tokio::test]
async fn test_unreachable_relay_fails() {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    assert!(WsRelay::connect(&url, Duration::from_secs(2), 16).await.is_err());
}
