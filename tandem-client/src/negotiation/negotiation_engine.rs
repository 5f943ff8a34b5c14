use crate::error::{Error, Result};
use crate::media::LocalTrack;
use crate::negotiation::{CandidateQueue, OfferSlot, SessionSnapshot, SignalingState};
use crate::signaling::SignalingOutput;
use crate::transport::PeerTransport;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_core::{
    Exchange, IceCandidate, MediaKind, PeerId, RemoteTrack, Role, SessionDescription,
    SessionOrigin, TrackId,
};
use tracing::{debug, info, warn};

/// Perfect-negotiation state machine for one remote peer.
///
/// Owns the peer's transport and drives every offer/answer exchange through
/// it. All methods take `&mut self`, so the owning session serializes them:
/// a signal is fully applied before the next one is looked at.
pub struct NegotiationEngine {
    peer_id: PeerId,
    origin: SessionOrigin,
    role: Role,
    state: SignalingState,
    transport: Box<dyn PeerTransport>,
    output: Arc<dyn SignalingOutput>,
    local_description: Option<SessionDescription>,
    stable_local: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    candidates: CandidateQueue,
    offers: OfferSlot,
    awaiting_answer: Arc<AtomicBool>,
    renegotiation_deferred: bool,
    established: bool,
    local_tracks: Vec<Arc<LocalTrack>>,
    attached: HashSet<TrackId>,
    remote_tracks: Vec<RemoteTrack>,
    data_channel_label: String,
    data_channel: Option<String>,
}

impl NegotiationEngine {
    pub fn new(
        peer_id: PeerId,
        origin: SessionOrigin,
        transport: Box<dyn PeerTransport>,
        output: Arc<dyn SignalingOutput>,
        data_channel_label: impl Into<String>,
    ) -> Self {
        Self {
            peer_id,
            origin,
            role: Role::for_origin(origin),
            state: SignalingState::Stable,
            transport,
            output,
            local_description: None,
            stable_local: None,
            remote_description: None,
            candidates: CandidateQueue::default(),
            offers: OfferSlot::default(),
            awaiting_answer: Arc::new(AtomicBool::new(false)),
            renegotiation_deferred: false,
            established: false,
            local_tracks: Vec::new(),
            attached: HashSet::new(),
            remote_tracks: Vec::new(),
            data_channel_label: data_channel_label.into(),
            data_channel: None,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn origin(&self) -> SessionOrigin {
        self.origin
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SignalingState {
        self.state
    }

    /// Shared flag that is set while an offer of ours is awaiting its answer.
    pub fn awaiting_answer_flag(&self) -> Arc<AtomicBool> {
        self.awaiting_answer.clone()
    }

    /// Starts an exchange: the call offer for a fresh session, a
    /// renegotiation offer afterwards.
    pub async fn initiate(&mut self) -> Result<()> {
        if self.state != SignalingState::Stable {
            return Err(Error::violation(format!(
                "cannot offer to {} while {:?}",
                self.peer_id, self.state
            )));
        }

        let exchange = if self.established {
            Exchange::Renegotiation
        } else {
            Exchange::Call
        };
        self.start_offer(exchange).await
    }

    async fn start_offer(&mut self, exchange: Exchange) -> Result<()> {
        let token = self.offers.begin();

        self.sync_outgoing_tracks().await?;

        if exchange == Exchange::Call && self.data_channel.is_none() {
            self.transport
                .create_data_channel(&self.data_channel_label)
                .await
                .map_err(Error::transport)?;
            self.data_channel = Some(self.data_channel_label.clone());
        }

        let offer = self.transport.create_offer().await.map_err(Error::transport)?;
        self.transport
            .set_local_description(offer.clone())
            .await
            .map_err(Error::transport)?;

        if !self.offers.commit(token, exchange, offer.clone()) {
            debug!("Offer to {:?} was preempted before sending", self.peer_id);
            return Ok(());
        }

        self.local_description = Some(offer.clone());
        self.state = SignalingState::HaveLocalOffer;
        self.awaiting_answer.store(true, Ordering::SeqCst);

        info!("Sending {:?} offer to {:?}", exchange, self.peer_id);
        self.output
            .send_offer(self.peer_id.clone(), offer, exchange)
            .await;
        Ok(())
    }

    /// Applies a remote offer and answers it, resolving glare by role.
    pub async fn receive_offer(
        &mut self,
        offer: SessionDescription,
        exchange: Exchange,
    ) -> Result<()> {
        if exchange == Exchange::Call && !self.established {
            self.settle_call_role(&offer);
        }

        match self.state {
            SignalingState::Stable => {}
            SignalingState::HaveLocalOffer if self.role == Role::Impolite => {
                info!(
                    "Offer collision with {:?}; keeping our own offer",
                    self.peer_id
                );
                return Ok(());
            }
            SignalingState::HaveLocalOffer => self.rollback().await?,
            SignalingState::HaveRemoteOffer | SignalingState::Closed => {
                return Err(Error::violation(format!(
                    "offer from {} while {:?}",
                    self.peer_id, self.state
                )));
            }
        }

        if let Err(e) = self.transport.set_remote_description(offer.clone()).await {
            // A rolled-back offer of ours must not wait for the next exchange.
            self.resume_after_failure().await;
            return Err(Error::transport(e));
        }

        let previous_remote = self.remote_description.replace(offer);
        self.state = SignalingState::HaveRemoteOffer;

        if let Err(e) = self.answer_remote_offer(exchange).await {
            warn!(
                "Answering {:?} failed, reverting its offer: {}",
                self.peer_id, e
            );
            if let Err(rollback_err) = self
                .transport
                .set_remote_description(SessionDescription::rollback())
                .await
            {
                warn!("Rollback for {:?} failed: {:#}", self.peer_id, rollback_err);
            }
            self.remote_description = previous_remote;
            self.state = SignalingState::Stable;
            self.resume_after_failure().await;
            return Err(e);
        }

        self.on_stable().await
    }

    /// Fixes the role once the other side's call offer shows who the callee
    /// is. With no call of our own outstanding we are the callee. When both
    /// sides called at once, the offer that sorts higher wins; both ends
    /// compare the same pair, so exactly one of them yields.
    fn settle_call_role(&mut self, offer: &SessionDescription) {
        let role = match (self.state, self.offers.current()) {
            (SignalingState::HaveLocalOffer, Some(ours)) if ours.description.sdp > offer.sdp => {
                Role::Impolite
            }
            (SignalingState::HaveLocalOffer, Some(ours)) if ours.description.sdp == offer.sdp => {
                warn!("Call offers from {:?} are identical; yielding", self.peer_id);
                Role::Polite
            }
            _ => Role::Polite,
        };

        if role != self.role {
            info!("Taking the {:?} role with {:?}", role, self.peer_id);
            self.role = role;
        }
    }

    async fn answer_remote_offer(&mut self, exchange: Exchange) -> Result<()> {
        self.flush_candidates().await;
        self.sync_outgoing_tracks().await?;

        let answer = self.transport.create_answer().await.map_err(Error::transport)?;
        self.transport
            .set_local_description(answer.clone())
            .await
            .map_err(Error::transport)?;

        self.local_description = Some(answer.clone());
        self.stable_local = Some(answer.clone());
        self.state = SignalingState::Stable;
        self.established = true;

        info!("Sending {:?} answer to {:?}", exchange, self.peer_id);
        self.output
            .send_answer(self.peer_id.clone(), answer, exchange)
            .await;
        Ok(())
    }

    /// Polite side of a collision: drop our offer, remember to re-offer.
    async fn rollback(&mut self) -> Result<()> {
        let cancelled = self.offers.cancel();
        self.awaiting_answer.store(false, Ordering::SeqCst);

        self.transport
            .set_local_description(SessionDescription::rollback())
            .await
            .map_err(Error::transport)?;

        self.local_description = self.stable_local.clone();
        self.state = SignalingState::Stable;
        self.renegotiation_deferred = true;

        info!(
            "Offer collision with {:?}; rolled back {:?}",
            self.peer_id,
            cancelled.map(|offer| offer.token)
        );
        Ok(())
    }

    /// Completes our outstanding offer. An answer we did not ask for is
    /// rejected without touching the session.
    pub async fn receive_answer(&mut self, answer: SessionDescription) -> Result<()> {
        if self.state != SignalingState::HaveLocalOffer || self.offers.current().is_none() {
            return Err(Error::violation(format!(
                "answer from {} while {:?}",
                self.peer_id, self.state
            )));
        }

        self.transport
            .set_remote_description(answer.clone())
            .await
            .map_err(Error::transport)?;

        if let Some(offer) = self.offers.settle() {
            debug!("{:?} offer {:?} answered", offer.exchange, offer.token);
        }
        self.awaiting_answer.store(false, Ordering::SeqCst);
        self.remote_description = Some(answer);
        self.stable_local = self.local_description.clone();
        self.state = SignalingState::Stable;
        self.established = true;

        self.flush_candidates().await;
        self.sync_outgoing_tracks().await?;
        self.on_stable().await
    }

    /// Remote candidates wait until a remote description exists.
    pub async fn add_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if self.state == SignalingState::Closed {
            return Err(Error::SessionClosed(self.peer_id.clone()));
        }

        if self.remote_description.is_none() {
            self.candidates.push(candidate);
            debug!(
                "Buffered candidate from {:?} ({} pending)",
                self.peer_id,
                self.candidates.len()
            );
            return Ok(());
        }

        self.apply_candidate(candidate).await;
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        let Err(e) = self.transport.add_ice_candidate(candidate).await else {
            return;
        };
        warn!("Failed to add ICE candidate for {:?}: {:#}", self.peer_id, e);
    }

    async fn flush_candidates(&mut self) {
        for candidate in self.candidates.drain() {
            self.apply_candidate(candidate).await;
        }
    }

    /// Forwards a locally discovered candidate to the peer.
    pub async fn local_candidate(&self, candidate: IceCandidate) {
        if self.state == SignalingState::Closed {
            return;
        }
        self.output.send_ice(self.peer_id.clone(), candidate).await;
    }

    /// The transport wants a fresh exchange. Runs now when stable, otherwise
    /// once the current exchange completes. Ignored before the call itself.
    pub async fn negotiation_needed(&mut self) -> Result<()> {
        if !self.established {
            debug!("Negotiation needed for {:?} before call; ignoring", self.peer_id);
            return Ok(());
        }

        match self.state {
            SignalingState::Stable => self.start_offer(Exchange::Renegotiation).await,
            SignalingState::HaveLocalOffer | SignalingState::HaveRemoteOffer => {
                debug!("Deferring renegotiation with {:?}", self.peer_id);
                self.renegotiation_deferred = true;
                Ok(())
            }
            SignalingState::Closed => Ok(()),
        }
    }

    async fn resume_after_failure(&mut self) {
        if let Err(e) = self.on_stable().await {
            warn!("Deferred renegotiation with {:?} failed: {}", self.peer_id, e);
        }
    }

    async fn on_stable(&mut self) -> Result<()> {
        if self.state == SignalingState::Stable && std::mem::take(&mut self.renegotiation_deferred)
        {
            info!("Running deferred renegotiation with {:?}", self.peer_id);
            self.start_offer(Exchange::Renegotiation).await?;
        }
        Ok(())
    }

    /// Adds an outgoing track. Before the first exchange completes it is only
    /// recorded and gets bound on the first description applied.
    pub async fn attach_track(&mut self, track: Arc<LocalTrack>) -> Result<()> {
        if self.state == SignalingState::Closed {
            return Err(Error::SessionClosed(self.peer_id.clone()));
        }
        if self.local_tracks.iter().any(|t| t.id() == track.id()) {
            return Ok(());
        }

        self.local_tracks.push(track.clone());

        if !self.established {
            debug!("Holding {} track {} for {:?}", track.kind(), track.id(), self.peer_id);
            return Ok(());
        }

        self.bind(track).await?;
        if self.state != SignalingState::Stable {
            self.renegotiation_deferred = true;
        }
        Ok(())
    }

    async fn bind(&mut self, track: Arc<LocalTrack>) -> Result<()> {
        let id = track.id().clone();
        self.transport
            .add_track(track)
            .await
            .map_err(Error::transport)?;
        self.attached.insert(id);
        Ok(())
    }

    async fn sync_outgoing_tracks(&mut self) -> Result<()> {
        let unbound: Vec<_> = self
            .local_tracks
            .iter()
            .filter(|t| !self.attached.contains(t.id()))
            .cloned()
            .collect();

        for track in unbound {
            self.bind(track).await?;
        }
        Ok(())
    }

    /// Swaps the outgoing track of `kind` in place. Never renegotiates.
    pub async fn replace_track(&mut self, kind: MediaKind, track: Arc<LocalTrack>) -> Result<()> {
        let Some(slot) = self.local_tracks.iter().position(|t| t.kind() == kind) else {
            return Err(Error::violation(format!(
                "no outgoing {kind} track for {}",
                self.peer_id
            )));
        };

        let old = self.local_tracks[slot].clone();
        if old.id() == track.id() {
            return Ok(());
        }

        if self.attached.remove(old.id()) {
            if let Err(e) = self.transport.replace_track(old.id(), track.clone()).await {
                self.attached.insert(old.id().clone());
                return Err(Error::transport(e));
            }
            self.attached.insert(track.id().clone());
        }

        info!(
            "Replaced outgoing {} track {} with {} for {:?}",
            kind,
            old.id(),
            track.id(),
            self.peer_id
        );
        self.local_tracks[slot] = track;
        Ok(())
    }

    pub fn record_remote_track(&mut self, track: RemoteTrack) -> bool {
        if self.remote_tracks.iter().any(|t| t.id == track.id) {
            return false;
        }
        info!(
            "Remote {} track {} from {:?}",
            track.kind, track.id, self.peer_id
        );
        self.remote_tracks.push(track);
        true
    }

    pub fn data_channel_opened(&mut self, label: &str) {
        self.data_channel = Some(label.to_owned());
    }

    pub async fn send_data(&self, data: Bytes) -> Result<()> {
        if self.state == SignalingState::Closed {
            return Err(Error::SessionClosed(self.peer_id.clone()));
        }
        self.transport
            .send_data(data)
            .await
            .map_err(Error::transport)
    }

    /// Idempotent.
    pub async fn close(&mut self) {
        if self.state == SignalingState::Closed {
            return;
        }

        self.offers.cancel();
        self.awaiting_answer.store(false, Ordering::SeqCst);
        self.candidates.clear();
        self.renegotiation_deferred = false;
        self.state = SignalingState::Closed;

        if let Err(e) = self.transport.close().await {
            warn!("Closing transport for {:?} failed: {:#}", self.peer_id, e);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            peer_id: self.peer_id.clone(),
            role: self.role,
            signaling_state: self.state,
            established: self.established,
            local_description: self.local_description.clone(),
            remote_description: self.remote_description.clone(),
            pending_candidates: self.candidates.len(),
            local_tracks: self
                .local_tracks
                .iter()
                .map(|t| (t.id().clone(), t.kind()))
                .collect(),
            remote_tracks: self.remote_tracks.clone(),
            data_channel: self.data_channel.clone(),
        }
    }
}
