use crate::media::LocalTrack;
use crate::signaling::Subscription;
use crate::transport::{
    PeerConnectionState, PeerTransport, TransportConfig, TransportEvent, TransportFactory,
};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tandem_core::{
    IceCandidate, MediaKind, PeerId, RemoteTrack, SdpType, SessionDescription, TrackId,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Builds [`RtcTransport`]s backed by the `webrtc` crate.
#[derive(Debug, Default, Clone)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn connect(
        &self,
        peer_id: PeerId,
        config: TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        let transport = RtcTransport::new(peer_id, config, event_tx).await?;
        Ok(Box::new(transport))
    }
}

/// A sender and the task feeding it the local track's samples.
struct OutgoingTrack {
    sender: Arc<RTCRtpSender>,
    _feed: Subscription,
}

pub struct RtcTransport {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackId, OutgoingTrack>>,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    event_tx: mpsc::Sender<TransportEvent>,
}

impl RtcTransport {
    pub async fn new(
        peer_id: PeerId,
        config: TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = event_tx.clone();
        let uid_state = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    info!("Peer connection state changed for {:?}: {:?}", uid, s);
                    let Some(state) = map_connection_state(s) else {
                        return;
                    };
                    let _ = tx.send(TransportEvent::StateChanged(state)).await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(candidate)).await;
            })
        }));

        let nego_tx = event_tx.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let tx = nego_tx.clone();
            Box::pin(async move {
                let _ = tx.send(TransportEvent::NegotiationNeeded).await;
            })
        }));

        let track_tx = event_tx.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => MediaKind::Audio,
                        _ => MediaKind::Video,
                    };
                    let remote = RemoteTrack {
                        id: TrackId(track.id()),
                        kind,
                        stream_id: Some(track.stream_id()),
                    };
                    let _ = tx.send(TransportEvent::RemoteTrack(remote)).await;
                })
            },
        ));

        let data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>> = Arc::new(Mutex::new(None));
        let dc_slot = data_channel.clone();
        let dc_tx = event_tx.clone();
        let uid_dc = peer_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let slot = dc_slot.clone();
            let tx = dc_tx.clone();
            let uid = uid_dc.clone();

            Box::pin(async move {
                debug!("Data channel '{}' announced by {:?}", dc.label(), uid);
                wire_data_channel(&dc, tx);
                *slot.lock().await = Some(dc);
            })
        }));

        Ok(Self {
            peer_id,
            peer_connection,
            senders: Mutex::new(HashMap::new()),
            data_channel,
            event_tx,
        })
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<()> {
        let (local, feed) = feed_sample_track(&track);
        let sender = self
            .peer_connection
            .add_track(local)
            .await
            .with_context(|| format!("Failed to add {} track {}", track.kind(), track.id()))?;
        self.senders.lock().await.insert(
            track.id().clone(),
            OutgoingTrack {
                sender,
                _feed: feed,
            },
        );
        Ok(())
    }

    async fn replace_track(&self, old: &TrackId, track: Arc<LocalTrack>) -> Result<()> {
        let mut senders = self.senders.lock().await;
        let Some(outgoing) = senders.remove(old) else {
            bail!("no sender carries track {}", old);
        };
        let (local, feed) = feed_sample_track(&track);
        if let Err(e) = outgoing.sender.replace_track(Some(local)).await {
            senders.insert(old.clone(), outgoing);
            return Err(e.into());
        }
        senders.insert(
            track.id().clone(),
            OutgoingTrack {
                sender: outgoing.sender,
                _feed: feed,
            },
        );
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        let dc = self.peer_connection.create_data_channel(label, None).await?;
        wire_data_channel(&dc, self.event_tx.clone());
        *self.data_channel.lock().await = Some(dc);
        Ok(())
    }

    async fn send_data(&self, data: Bytes) -> Result<()> {
        let Some(dc) = self.data_channel.lock().await.clone() else {
            return Err(anyhow!("no data channel for {:?}", self.peer_id));
        };
        dc.send(&data).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.senders.lock().await.clear();
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn wire_data_channel(dc: &Arc<RTCDataChannel>, tx: mpsc::Sender<TransportEvent>) {
    let label = dc.label().to_owned();
    let tx_open = tx.clone();
    dc.on_open(Box::new(move || {
        Box::pin(async move {
            let _ = tx_open.send(TransportEvent::DataChannelOpen(label)).await;
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::Message(msg.data)).await;
        })
    }));
}

fn sample_track(track: &LocalTrack) -> Arc<TrackLocalStaticSample> {
    let mime_type = match track.kind() {
        MediaKind::Audio => MIME_TYPE_OPUS,
        MediaKind::Video => MIME_TYPE_VP8,
    };
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        },
        track.id().0.clone(),
        track.stream_id().to_owned(),
    ))
}

/// Builds the webrtc track for `track` and spawns the task that writes its
/// samples into it. The task stops with the returned subscription.
fn feed_sample_track(
    track: &LocalTrack,
) -> (Arc<dyn TrackLocal + Send + Sync>, Subscription) {
    let sink = sample_track(track);
    let local: Arc<dyn TrackLocal + Send + Sync> = sink.clone();
    let id = track.id().clone();
    let mut samples = track.subscribe_samples();

    let feed = tokio::spawn(async move {
        loop {
            match samples.recv().await {
                Ok(sample) => {
                    let sample = Sample {
                        data: sample.data,
                        duration: sample.duration,
                        timestamp: std::time::SystemTime::now(),
                        ..Default::default()
                    };
                    if let Err(e) = sink.write_sample(&sample).await {
                        debug!("Dropping sample for track {}: {}", id, e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Track {} fell behind by {} samples", id, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    (local, Subscription::new(feed))
}

fn map_connection_state(state: RTCPeerConnectionState) -> Option<PeerConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(PeerConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(PeerConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(PeerConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(PeerConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(PeerConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(PeerConnectionState::Closed),
        _ => None,
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => {
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            rollback
        }
    };
    Ok(rtc)
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => bail!("unexpected description type {:?}", other),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}
