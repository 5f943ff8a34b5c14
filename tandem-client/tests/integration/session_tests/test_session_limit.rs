use tandem_client::Error;

use crate::integration::{announce, create_pair, init_tracing};
use crate::utils::{TestPeer, establish_call};

#[tokio::test]
async fn test_single_call_model() {
    init_tracing();

    let (mut alice, mut bob) = create_pair().await;
    let carol = TestPeer::new("carol");
    establish_call(&mut alice, &mut bob).await;

    // A newcomer at capacity is noted but gets no session.
    announce(&alice, &carol).await;
    assert_eq!(alice.adapter.registry().len(), 1);
    assert!(!alice.adapter.registry().contains(&carol.id));

    let err = alice.adapter.initiate(&carol.id).await.unwrap_err();
    assert!(matches!(err, Error::SessionLimit(1)));

    // Once the call ends there is room again.
    alice.adapter.end_call(&bob.id).await.unwrap();
    alice.adapter.initiate(&carol.id).await.unwrap();
    assert!(alice.adapter.registry().contains(&carol.id));
}

#[tokio::test]
async fn test_unknown_session_errors() {
    init_tracing();

    let alice = TestPeer::new("alice");
    let ghost = tandem_core::PeerId::from("ghost");

    assert!(matches!(
        alice.adapter.end_call(&ghost).await,
        Err(Error::UnknownSession(_))
    ));
    assert!(matches!(
        alice.adapter.snapshot(&ghost).await,
        Err(Error::UnknownSession(_))
    ));

    // Signals from strangers are dropped without opening sessions.
    alice
        .adapter
        .add_candidate(ghost.clone(), tandem_core::IceCandidate::new("candidate:x"))
        .await
        .unwrap();
    alice
        .adapter
        .receive_offer(
            ghost.clone(),
            tandem_core::SessionDescription::offer("fake-sdp;kind=offer"),
            tandem_core::Exchange::Renegotiation,
        )
        .await
        .unwrap();
    assert!(alice.adapter.registry().is_empty());
}
