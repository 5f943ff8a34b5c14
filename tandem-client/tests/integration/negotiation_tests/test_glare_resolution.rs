use tandem_client::SignalingState;
use tandem_core::{OutboundSignal, Role, SessionDescription};

use crate::integration::{announce, create_pair, init_tracing};
use crate::utils::{TestPeer, establish_call, pump};

fn last_offer_to(signals: &[OutboundSignal]) -> SessionDescription {
    signals
        .iter()
        .rev()
        .find_map(|s| match s {
            OutboundSignal::RenegotiationOffer { offer, .. } => Some(offer.clone()),
            _ => None,
        })
        .expect("no renegotiation offer sent")
}

#[tokio::test]
async fn test_glare_resolution() {
    init_tracing();

    let (mut alice, mut bob) = create_pair().await;
    establish_call(&mut alice, &mut bob).await;
    assert_eq!(alice.snapshot(&bob.id).await.role, Role::Impolite);
    assert_eq!(bob.snapshot(&alice.id).await.role, Role::Polite);

    // Both renegotiate before either offer is delivered.
    alice.adapter.initiate(&bob.id).await.unwrap();
    bob.adapter.initiate(&alice.id).await.unwrap();
    alice.settle().await;
    bob.settle().await;
    assert_eq!(
        alice.snapshot(&bob.id).await.signaling_state,
        SignalingState::HaveLocalOffer
    );
    assert_eq!(
        bob.snapshot(&alice.id).await.signaling_state,
        SignalingState::HaveLocalOffer
    );

    let alice_offer = last_offer_to(&alice.signaling.all().await);
    let bob_first_offer = last_offer_to(&bob.signaling.all().await);

    pump(&mut [&mut alice, &mut bob]).await;

    let a = alice.snapshot(&bob.id).await;
    let b = bob.snapshot(&alice.id).await;
    assert_eq!(a.signaling_state, SignalingState::Stable);
    assert_eq!(b.signaling_state, SignalingState::Stable);
    assert_eq!(a.local_description, b.remote_description);
    assert_eq!(a.remote_description, b.local_description);

    // The impolite offer won: bob applied it, alice never applied bob's.
    assert!(bob.link(&alice.id).remote_history().contains(&alice_offer));
    assert!(!alice.link(&bob.id).remote_history().contains(&bob_first_offer));

    // Bob's preempted intent was re-offered once things settled.
    let bob_offers = bob
        .signaling
        .all()
        .await
        .iter()
        .filter(|s| matches!(s, OutboundSignal::RenegotiationOffer { .. }))
        .count();
    assert_eq!(bob_offers, 2);
}

#[tokio::test]
async fn test_glare_on_first_call_from_joined_side() {
    init_tracing();

    // Alice learned about bob from the relay, bob knows alice out of band.
    let (mut alice, mut bob) = create_pair().await;

    alice.adapter.initiate(&bob.id).await.unwrap();
    bob.adapter.initiate(&alice.id).await.unwrap();
    alice.settle().await;
    bob.settle().await;

    pump(&mut [&mut alice, &mut bob]).await;

    let a = alice.snapshot(&bob.id).await;
    let b = bob.snapshot(&alice.id).await;

    // Alice's offer sorts lower, so she yields and becomes the callee.
    assert_eq!(a.role, Role::Polite);
    assert_eq!(b.role, Role::Impolite);
    assert_eq!(a.signaling_state, SignalingState::Stable);
    assert_eq!(b.signaling_state, SignalingState::Stable);
    assert_eq!(a.local_description, b.remote_description);
    assert_eq!(a.remote_description, b.local_description);
}

/// Both call at once and the exchange still converges with one polite side.
async fn assert_simultaneous_calls_converge(mut alice: TestPeer, mut bob: TestPeer) {
    alice.adapter.initiate(&bob.id).await.unwrap();
    bob.adapter.initiate(&alice.id).await.unwrap();
    alice.settle().await;
    bob.settle().await;

    pump(&mut [&mut alice, &mut bob]).await;

    let a = alice.snapshot(&bob.id).await;
    let b = bob.snapshot(&alice.id).await;
    assert_ne!(a.role, b.role);
    assert_eq!(a.role, Role::Polite);
    assert_eq!(b.role, Role::Impolite);
    assert_eq!(a.signaling_state, SignalingState::Stable);
    assert_eq!(b.signaling_state, SignalingState::Stable);
    assert_eq!(a.local_description, b.remote_description);
    assert_eq!(a.remote_description, b.local_description);
    assert!(a.established);
    assert!(b.established);
}

#[tokio::test]
async fn test_glare_on_first_call_when_both_joined() {
    init_tracing();

    let alice = TestPeer::new("alice");
    let bob = TestPeer::new("bob");
    announce(&alice, &bob).await;
    announce(&bob, &alice).await;

    assert_simultaneous_calls_converge(alice, bob).await;
}

#[tokio::test]
async fn test_glare_on_first_call_when_both_outgoing() {
    init_tracing();

    // Neither side heard about the other from the relay.
    let alice = TestPeer::new("alice");
    let bob = TestPeer::new("bob");

    assert_simultaneous_calls_converge(alice, bob).await;
}
