use tandem_client::SignalingState;
use tandem_core::{IceCandidate, InboundSignal, OutboundSignal};

use crate::integration::{create_pair, init_tracing};
use crate::utils::{deliver, pump};

#[tokio::test]
async fn test_candidates_wait_for_remote_description() {
    init_tracing();

    let (mut alice, mut bob) = create_pair().await;
    alice.adapter.initiate(&bob.id).await.unwrap();
    alice.settle().await;

    // Bob's candidates overtake his answer on the relay.
    for n in 0..3 {
        alice
            .adapter
            .handle_signal(InboundSignal::IceCandidate {
                from: bob.id.clone(),
                candidate: IceCandidate::new(format!("candidate:early-{n}")),
            })
            .await;
    }

    let snapshot = alice.snapshot(&bob.id).await;
    assert_eq!(snapshot.signaling_state, SignalingState::HaveLocalOffer);
    assert_eq!(snapshot.pending_candidates, 3);
    assert!(alice.link(&bob.id).applied_candidates().is_empty());

    pump(&mut [&mut alice, &mut bob]).await;

    let snapshot = alice.snapshot(&bob.id).await;
    assert_eq!(snapshot.pending_candidates, 0);

    // Flushed in arrival order, ahead of anything that came after the answer.
    let applied = alice.link(&bob.id).applied_candidates();
    assert_eq!(
        &applied[..3],
        ["candidate:early-0", "candidate:early-1", "candidate:early-2"]
    );
    assert_eq!(applied.len(), 4);
}

#[tokio::test]
async fn test_candidate_before_answer_is_buffered_not_dropped() {
    init_tracing();

    let (mut alice, mut bob) = create_pair().await;
    alice.adapter.initiate(&bob.id).await.unwrap();
    alice.settle().await;

    // Let bob answer, then reorder his output so the candidate goes first.
    for signal in alice.drain_signals() {
        deliver(&[&mut bob], &alice.id, signal).await;
    }
    bob.settle().await;

    let mut from_bob = bob.drain_signals();
    from_bob.sort_by_key(|s| !matches!(s, OutboundSignal::IceCandidate { .. }));
    assert!(matches!(from_bob[0], OutboundSignal::IceCandidate { .. }));

    let bob_id = bob.id.clone();
    let first = from_bob.remove(0);
    deliver(&[&mut alice], &bob_id, first).await;
    assert_eq!(alice.snapshot(&bob_id).await.pending_candidates, 1);

    for signal in from_bob {
        deliver(&[&mut alice], &bob_id, signal).await;
    }
    alice.settle().await;

    assert_eq!(alice.link(&bob_id).applied_candidates().len(), 1);
    assert_eq!(
        alice.snapshot(&bob_id).await.signaling_state,
        SignalingState::Stable
    );
}
