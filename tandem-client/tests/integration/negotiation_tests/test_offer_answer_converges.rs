use tandem_client::{CallStatus, SignalingState};
use tandem_core::{Exchange, Role, SdpType};

use crate::integration::{create_pair, exchange_of, init_tracing};
use crate::utils::establish_call;

#[tokio::test]
async fn test_offer_answer_converges() {
    init_tracing();

    let (mut alice, mut bob) = create_pair().await;
    establish_call(&mut alice, &mut bob).await;

    let a = alice.snapshot(&bob.id).await;
    let b = bob.snapshot(&alice.id).await;

    assert_eq!(a.signaling_state, SignalingState::Stable);
    assert_eq!(b.signaling_state, SignalingState::Stable);
    assert!(a.established && b.established);

    // Both sides agree on the same pair of descriptions.
    let offer = a.local_description.clone().expect("alice has no local description");
    let answer = b.local_description.clone().expect("bob has no local description");
    assert_eq!(offer.sdp_type, SdpType::Offer);
    assert_eq!(answer.sdp_type, SdpType::Answer);
    assert_eq!(b.remote_description, Some(offer));
    assert_eq!(a.remote_description, Some(answer));

    // The caller is impolite, the callee polite.
    assert_eq!(a.role, Role::Impolite);
    assert_eq!(b.role, Role::Polite);

    // The first exchange travels as user:call / call:accepted.
    let exchanges: Vec<_> = alice
        .signaling
        .descriptions_for(&bob.id)
        .await
        .iter()
        .filter_map(exchange_of)
        .collect();
    assert_eq!(exchanges, vec![Exchange::Call]);
    let exchanges: Vec<_> = bob
        .signaling
        .descriptions_for(&alice.id)
        .await
        .iter()
        .filter_map(exchange_of)
        .collect();
    assert_eq!(exchanges, vec![Exchange::Call]);

    // Candidates went both ways and were applied.
    assert_eq!(alice.signaling.ice_candidates_for(&bob.id).await.len(), 1);
    assert_eq!(bob.link(&alice.id).applied_candidates().len(), 1);
    assert_eq!(alice.link(&bob.id).applied_candidates().len(), 1);

    assert_eq!(
        alice.adapter.status().status(&bob.id),
        Some(CallStatus::Connected)
    );
    assert_eq!(
        bob.adapter.status().status(&alice.id),
        Some(CallStatus::Connected)
    );
}

#[tokio::test]
async fn test_renegotiation_uses_nego_events() {
    init_tracing();

    let (mut alice, mut bob) = create_pair().await;
    establish_call(&mut alice, &mut bob).await;

    // Calling again on a live session renegotiates.
    establish_call(&mut alice, &mut bob).await;

    let exchanges: Vec<_> = alice
        .signaling
        .descriptions_for(&bob.id)
        .await
        .iter()
        .filter_map(exchange_of)
        .collect();
    assert_eq!(exchanges, vec![Exchange::Call, Exchange::Renegotiation]);

    let a = alice.snapshot(&bob.id).await;
    let b = bob.snapshot(&alice.id).await;
    assert_eq!(a.signaling_state, SignalingState::Stable);
    assert_eq!(b.signaling_state, SignalingState::Stable);
    assert_eq!(a.local_description, b.remote_description);
    assert_eq!(a.remote_description, b.local_description);
}
