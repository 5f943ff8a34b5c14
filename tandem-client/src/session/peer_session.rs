use crate::error::{Error, Result};
use crate::negotiation::NegotiationEngine;
use crate::session::{CallBehavior, SessionCommand, SessionRegistry};
use crate::state::SessionStateStore;
use crate::transport::{PeerConnectionState, TransportEvent};
use std::ops::ControlFlow;
use std::sync::Arc;
use tandem_core::PeerId;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Event loop owning one peer's negotiation engine.
///
/// Commands and transport events are consumed one at a time. Transport
/// events win ties so a state change is observed before the next signal.
pub struct PeerSession {
    peer_id: PeerId,
    serial: u64,
    engine: NegotiationEngine,
    command_rx: mpsc::Receiver<SessionCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    registry: SessionRegistry,
    status: SessionStateStore,
    behavior: Arc<dyn CallBehavior>,
}

impl PeerSession {
    pub fn new(
        serial: u64,
        engine: NegotiationEngine,
        command_rx: mpsc::Receiver<SessionCommand>,
        transport_rx: mpsc::Receiver<TransportEvent>,
        registry: SessionRegistry,
        status: SessionStateStore,
        behavior: Arc<dyn CallBehavior>,
    ) -> Self {
        Self {
            peer_id: engine.peer_id().clone(),
            serial,
            engine,
            command_rx,
            transport_rx,
            registry,
            status,
            behavior,
        }
    }

    pub async fn run(mut self) {
        info!("Session event loop started for {:?}", self.peer_id);

        loop {
            tokio::select! {
                biased;

                evt = self.transport_rx.recv() => {
                    match evt {
                        Some(e) => {
                            if self.handle_transport_event(e).await.is_break() {
                                break;
                            }
                        }
                        None => {
                            warn!("Transport channel closed unexpectedly");
                            self.engine.close().await;
                            break;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => {
                            if self.handle_command(c).await.is_break() {
                                break;
                            }
                        }
                        None => {
                            info!("Command channel closed. Shutting down session.");
                            self.engine.close().await;
                            break;
                        }
                    }
                }
            }
        }

        info!("Session event loop finished for {:?}", self.peer_id);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> ControlFlow<()> {
        match cmd {
            SessionCommand::Initiate => {
                let res = self.engine.initiate().await;
                self.report(res);
            }

            SessionCommand::ReceiveOffer { offer, exchange } => {
                let res = self.engine.receive_offer(offer, exchange).await;
                self.report(res);
            }

            SessionCommand::ReceiveAnswer { answer } => {
                let res = self.engine.receive_answer(answer).await;
                self.report(res);
            }

            SessionCommand::AddCandidate { candidate } => {
                let res = self.engine.add_candidate(candidate).await;
                self.report(res);
            }

            SessionCommand::AttachTrack { track } => {
                let res = self.engine.attach_track(track).await;
                self.report(res);
            }

            SessionCommand::ReplaceTrack { kind, track, reply } => {
                let _ = reply.send(self.engine.replace_track(kind, track).await);
            }

            SessionCommand::SendData { data } => {
                let res = self.engine.send_data(data).await;
                self.report(res);
            }

            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }

            SessionCommand::Close { reply } => {
                info!("Hanging up on {:?}", self.peer_id);
                self.engine.close().await;
                self.status.on_hang_up(&self.peer_id);
                self.behavior.on_session_closed(self.peer_id.clone()).await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) -> ControlFlow<()> {
        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                self.engine.local_candidate(candidate).await;
            }

            TransportEvent::NegotiationNeeded => {
                let res = self.engine.negotiation_needed().await;
                self.report(res);
            }

            TransportEvent::RemoteTrack(track) => {
                if self.engine.record_remote_track(track.clone()) {
                    self.behavior
                        .on_remote_track(self.peer_id.clone(), track)
                        .await;
                }
            }

            TransportEvent::StateChanged(state) => {
                self.status.on_connection_state(&self.peer_id, state);

                if matches!(
                    state,
                    PeerConnectionState::Failed | PeerConnectionState::Closed
                ) {
                    self.release(state).await;
                    return ControlFlow::Break(());
                }
            }

            TransportEvent::DataChannelOpen(label) => {
                info!("Data channel {:?} open with {:?}", label, self.peer_id);
                self.engine.data_channel_opened(&label);
                self.behavior
                    .on_data_channel_open(self.peer_id.clone(), label)
                    .await;
            }

            TransportEvent::Message(data) => {
                self.behavior.on_message(self.peer_id.clone(), data).await;
            }
        }

        ControlFlow::Continue(())
    }

    /// Terminal transport state: tear down and leave the registry. Removing
    /// our own entry may abort this task, so nothing awaits after it.
    async fn release(&mut self, state: PeerConnectionState) {
        error!(
            "Transport for {:?} is {:?}; releasing session",
            self.peer_id, state
        );
        self.engine.close().await;
        self.behavior.on_session_closed(self.peer_id.clone()).await;
        self.registry.remove_if_serial(&self.peer_id, self.serial);
    }

    fn report(&self, res: Result<()>) {
        match res {
            Ok(()) => {}
            Err(Error::ProtocolViolation(msg)) => {
                warn!("Ignoring signal for {:?}: {}", self.peer_id, msg);
            }
            Err(e @ Error::TransportFailure(_)) => {
                error!("Session {:?}: {}", self.peer_id, e);
            }
            Err(e) => warn!("Session {:?}: {}", self.peer_id, e),
        }
    }
}
