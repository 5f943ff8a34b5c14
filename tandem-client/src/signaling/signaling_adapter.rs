use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::media::LocalTrack;
use crate::negotiation::{NegotiationEngine, SessionSnapshot};
use crate::session::{
    CallBehavior, NoopBehavior, PeerSession, SessionCommand, SessionHandle, SessionRegistry,
};
use crate::signaling::{SignalingOutput, Subscription};
use crate::state::SessionStateStore;
use crate::transport::{TransportConfig, TransportFactory};
use bytes::Bytes;
use std::sync::Arc;
use tandem_core::{
    Exchange, IceCandidate, IceServerConfig, InboundSignal, OutboundSignal, PeerId,
    SessionDescription, SessionOrigin,
};
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};

struct AdapterInner {
    config: ClientConfig,
    registry: SessionRegistry,
    status: SessionStateStore,
    output: Arc<dyn SignalingOutput>,
    factory: Arc<dyn TransportFactory>,
    behavior: Arc<dyn CallBehavior>,
    transport_config: RwLock<TransportConfig>,
}

/// Routes relay signals to per-peer sessions and exposes the local call
/// controls. Cheap to clone.
#[derive(Clone)]
pub struct SignalingAdapter {
    inner: Arc<AdapterInner>,
}

impl SignalingAdapter {
    pub fn new(
        config: ClientConfig,
        output: Arc<dyn SignalingOutput>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self::with_behavior(config, output, factory, Arc::new(NoopBehavior))
    }

    pub fn with_behavior(
        config: ClientConfig,
        output: Arc<dyn SignalingOutput>,
        factory: Arc<dyn TransportFactory>,
        behavior: Arc<dyn CallBehavior>,
    ) -> Self {
        let transport_config = RwLock::new(config.transport_config());
        Self {
            inner: Arc::new(AdapterInner {
                config,
                registry: SessionRegistry::new(),
                status: SessionStateStore::new(),
                output,
                factory,
                behavior,
                transport_config,
            }),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn status(&self) -> &SessionStateStore {
        &self.inner.status
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.transport_config.read().await.ice_servers.clone()
    }

    /// Announces us in `room` under the configured display label.
    pub async fn join_room(&self, room: impl Into<String>) {
        let room = room.into();
        info!("Joining room {}", room);
        self.inner
            .output
            .send_signal(OutboundSignal::JoinRoom {
                email: self.inner.config.display_label.clone(),
                room,
            })
            .await;
    }

    /// Feeds every inbound signal into the adapter until the stream ends or
    /// the returned subscription is dropped.
    pub fn subscribe(&self, mut inbound: mpsc::Receiver<InboundSignal>) -> Subscription {
        let adapter = self.clone();
        Subscription::new(tokio::spawn(async move {
            while let Some(signal) = inbound.recv().await {
                adapter.handle_signal(signal).await;
            }
            debug!("Inbound signal stream ended");
        }))
    }

    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<InboundSignal>(text) {
            Ok(signal) => self.handle_signal(signal).await,
            Err(e) => warn!("Invalid signal: {}. Text: {}", e, text),
        }
    }

    pub async fn handle_signal(&self, signal: InboundSignal) {
        let res = match signal {
            InboundSignal::PeerJoined {
                peer_id,
                display_label,
            } => {
                info!("Peer {:?} ({}) joined the room", peer_id, display_label);
                self.on_peer_joined(peer_id).await;
                Ok(())
            }

            InboundSignal::IncomingCall { from, offer } => {
                self.receive_offer(from, offer, Exchange::Call).await
            }

            InboundSignal::CallAccepted { from, answer } => {
                self.receive_answer(Some(from), answer).await
            }

            InboundSignal::RenegotiationOffer { from, offer } => {
                self.receive_offer(from, offer, Exchange::Renegotiation)
                    .await
            }

            InboundSignal::RenegotiationAnswer { from, answer } => {
                self.receive_answer(from, answer).await
            }

            InboundSignal::IceCandidate { from, candidate } => {
                self.add_candidate(from, candidate).await
            }

            InboundSignal::IceConfig { ice_servers } => {
                info!("Received ICE config with {} servers", ice_servers.len());
                self.inner.transport_config.write().await.ice_servers = ice_servers;
                Ok(())
            }
        };

        if let Err(e) = res {
            warn!("Failed to handle signal: {}", e);
        }
    }

    async fn on_peer_joined(&self, peer_id: PeerId) {
        if self.inner.registry.contains(&peer_id) {
            debug!("Already have a session with {:?}", peer_id);
            return;
        }
        if let Err(e) = self.open_session(peer_id, SessionOrigin::Joined).await {
            info!("Not opening a session for joined peer: {}", e);
        }
    }

    /// Calls `peer_id`, or renegotiates if a call is already up.
    pub async fn initiate(&self, peer_id: &PeerId) -> Result<()> {
        let session = match self.inner.registry.get(peer_id) {
            Some(session) => session,
            None => {
                self.open_session(peer_id.clone(), SessionOrigin::Outgoing)
                    .await?
            }
        };
        session.send(SessionCommand::Initiate).await
    }

    /// A call offer from an unknown peer opens a polite session for it.
    pub async fn receive_offer(
        &self,
        from: PeerId,
        offer: SessionDescription,
        exchange: Exchange,
    ) -> Result<()> {
        let session = match self.inner.registry.get(&from) {
            Some(session) => session,
            None if exchange == Exchange::Call => {
                self.open_session(from, SessionOrigin::Incoming).await?
            }
            None => {
                debug!("Renegotiation offer from unknown peer {:?}; ignoring", from);
                return Ok(());
            }
        };
        session
            .send(SessionCommand::ReceiveOffer { offer, exchange })
            .await
    }

    /// Renegotiation answers usually arrive without a sender; those go to the
    /// one session that is waiting for an answer.
    pub async fn receive_answer(
        &self,
        from: Option<PeerId>,
        answer: SessionDescription,
    ) -> Result<()> {
        let session = match from {
            Some(peer_id) => self.inner.registry.get(&peer_id),
            None => self.route_unaddressed_answer(),
        };
        let Some(session) = session else {
            debug!("No session for answer; ignoring");
            return Ok(());
        };
        session.send(SessionCommand::ReceiveAnswer { answer }).await
    }

    fn route_unaddressed_answer(&self) -> Option<SessionHandle> {
        let mut waiting = self.inner.registry.awaiting_answer();
        match waiting.len() {
            1 => waiting.pop(),
            0 => {
                warn!("Answer arrived with no offer outstanding; dropping");
                None
            }
            n => {
                warn!("Answer is ambiguous across {} sessions; dropping", n);
                None
            }
        }
    }

    pub async fn add_candidate(&self, from: PeerId, candidate: IceCandidate) -> Result<()> {
        let Some(session) = self.inner.registry.get(&from) else {
            debug!("Candidate from unknown peer {:?}; ignoring", from);
            return Ok(());
        };
        session.send(SessionCommand::AddCandidate { candidate }).await
    }

    pub async fn attach_track(&self, peer_id: &PeerId, track: Arc<LocalTrack>) -> Result<()> {
        self.session(peer_id)?
            .send(SessionCommand::AttachTrack { track })
            .await
    }

    /// Swaps the outgoing track of the same kind without renegotiating.
    pub async fn replace_track(&self, peer_id: &PeerId, track: Arc<LocalTrack>) -> Result<()> {
        let session = self.session(peer_id)?;
        let (reply, rx) = oneshot::channel();
        session
            .send(SessionCommand::ReplaceTrack {
                kind: track.kind(),
                track,
                reply,
            })
            .await?;
        rx.await
            .map_err(|_| Error::SessionClosed(peer_id.clone()))?
    }

    pub async fn send_data(&self, peer_id: &PeerId, data: Bytes) -> Result<()> {
        self.session(peer_id)?
            .send(SessionCommand::SendData { data })
            .await
    }

    pub async fn snapshot(&self, peer_id: &PeerId) -> Result<SessionSnapshot> {
        self.session(peer_id)?.snapshot().await
    }

    /// Hangs up: closes the transport and forgets the session.
    pub async fn end_call(&self, peer_id: &PeerId) -> Result<()> {
        let Some(session) = self.inner.registry.remove(peer_id) else {
            return Err(Error::UnknownSession(peer_id.clone()));
        };

        info!("Ending call with {:?}", peer_id);
        let res = session.close().await;
        self.inner.status.on_hang_up(peer_id);
        res
    }

    /// Hangs up every session.
    pub async fn end_all(&self) {
        for peer_id in self.inner.registry.peers() {
            if let Err(e) = self.end_call(&peer_id).await {
                debug!("Ending call with {:?}: {}", peer_id, e);
            }
        }
    }

    fn session(&self, peer_id: &PeerId) -> Result<SessionHandle> {
        self.inner
            .registry
            .get(peer_id)
            .ok_or_else(|| Error::UnknownSession(peer_id.clone()))
    }

    async fn open_session(&self, peer_id: PeerId, origin: SessionOrigin) -> Result<SessionHandle> {
        let inner = &self.inner;
        let max = inner.config.max_sessions;
        if inner.registry.len() >= max {
            return Err(Error::SessionLimit(max));
        }

        let transport_config = inner.transport_config.read().await.clone();
        let (event_tx, event_rx) = mpsc::channel(inner.config.transport_event_capacity);
        let transport = inner
            .factory
            .connect(peer_id.clone(), transport_config, event_tx)
            .await
            .map_err(Error::transport)?;

        // Another signal may have opened the same session meanwhile.
        if let Some(existing) = inner.registry.get(&peer_id) {
            debug!("Session with {:?} opened concurrently; reusing it", peer_id);
            if let Err(e) = transport.close().await {
                debug!("Closing spare transport failed: {:#}", e);
            }
            return Ok(existing);
        }

        let engine = NegotiationEngine::new(
            peer_id.clone(),
            origin,
            transport,
            inner.output.clone(),
            inner.config.data_channel_label.clone(),
        );
        let awaiting_answer = engine.awaiting_answer_flag();
        let (command_tx, command_rx) = mpsc::channel(inner.config.command_capacity);
        let serial = inner.registry.next_serial();

        let session = PeerSession::new(
            serial,
            engine,
            command_rx,
            event_rx,
            inner.registry.clone(),
            inner.status.clone(),
            inner.behavior.clone(),
        );

        inner.status.track(&peer_id);
        let handle = SessionHandle::new(
            peer_id.clone(),
            serial,
            command_tx,
            awaiting_answer,
            Subscription::new(tokio::spawn(session.run())),
        );
        inner.registry.insert(handle.clone());

        info!("Opened {:?} session with {:?}", origin, peer_id);
        inner.behavior.on_session_opened(peer_id, origin).await;
        Ok(handle)
    }
}
