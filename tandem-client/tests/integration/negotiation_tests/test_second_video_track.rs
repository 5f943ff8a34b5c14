use std::sync::Arc;
use tandem_client::{LocalTrack, SignalingState};
use tandem_core::{MediaKind, TrackSource};

use crate::integration::{create_pair, init_tracing};
use crate::utils::{establish_call, pump};

fn video(label: &str) -> Arc<LocalTrack> {
    Arc::new(LocalTrack::new(MediaKind::Video, TrackSource::Camera, label))
}

#[tokio::test]
async fn test_second_video_track_renegotiates() {
    init_tracing();

    let (mut alice, mut bob) = create_pair().await;

    // Alice's camera goes out with the call itself.
    alice
        .adapter
        .attach_track(&bob.id, video("alice camera"))
        .await
        .unwrap();
    establish_call(&mut alice, &mut bob).await;

    // Bob publishes audio and video once the call is up.
    let bob_audio = Arc::new(LocalTrack::new(
        MediaKind::Audio,
        TrackSource::Microphone,
        "bob mic",
    ));
    bob.adapter
        .attach_track(&alice.id, bob_audio)
        .await
        .unwrap();
    bob.adapter
        .attach_track(&alice.id, video("bob camera"))
        .await
        .unwrap();
    pump(&mut [&mut alice, &mut bob]).await;

    // Alice adds a second video track; the transport asks for renegotiation.
    let offers_before = alice.signaling.offer_count().await;
    alice
        .adapter
        .attach_track(&bob.id, video("alice second camera"))
        .await
        .unwrap();
    pump(&mut [&mut alice, &mut bob]).await;
    assert_eq!(alice.signaling.offer_count().await, offers_before + 1);

    let a = alice.snapshot(&bob.id).await;
    let b = bob.snapshot(&alice.id).await;
    assert_eq!(a.signaling_state, SignalingState::Stable);
    assert_eq!(b.signaling_state, SignalingState::Stable);

    assert_eq!(a.remote_tracks.len(), 2);
    assert_eq!(a.remote_track_count(MediaKind::Audio), 1);
    assert_eq!(a.remote_track_count(MediaKind::Video), 1);

    assert_eq!(b.remote_tracks.len(), 2);
    assert_eq!(b.remote_track_count(MediaKind::Video), 2);

    assert_eq!(alice.behavior.remote_tracks(&bob.id).await.len(), 2);
    assert_eq!(bob.behavior.remote_tracks(&alice.id).await.len(), 2);
}
