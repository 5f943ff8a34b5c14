use crate::error::{Error, Result};
use crate::negotiation::SessionSnapshot;
use crate::session::SessionCommand;
use crate::signaling::Subscription;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tandem_core::PeerId;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

/// Cloneable handle to a running session. The session task is aborted once
/// the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    peer_id: PeerId,
    serial: u64,
    command_tx: mpsc::Sender<SessionCommand>,
    awaiting_answer: Arc<AtomicBool>,
    _task: Arc<Subscription>,
}

impl SessionHandle {
    pub fn new(
        peer_id: PeerId,
        serial: u64,
        command_tx: mpsc::Sender<SessionCommand>,
        awaiting_answer: Arc<AtomicBool>,
        task: Subscription,
    ) -> Self {
        Self {
            peer_id,
            serial,
            command_tx,
            awaiting_answer,
            _task: Arc::new(task),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.awaiting_answer.load(Ordering::SeqCst)
    }

    pub async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| Error::SessionClosed(self.peer_id.clone()))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await
            .map_err(|_| Error::SessionClosed(self.peer_id.clone()))
    }

    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Close { reply }).await?;
        rx.await
            .map_err(|_| Error::SessionClosed(self.peer_id.clone()))
    }
}

/// All live sessions, keyed by remote peer.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<PeerId, SessionHandle>>,
    serials: Arc<AtomicU64>,
    departures: broadcast::Sender<PeerId>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            serials: Arc::new(AtomicU64::new(0)),
            departures: broadcast::channel(64).0,
        }
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces every peer whose session leaves the registry, whether it
    /// was hung up or released itself.
    pub fn departures(&self) -> broadcast::Receiver<PeerId> {
        self.departures.subscribe()
    }

    pub fn next_serial(&self) -> u64 {
        self.serials.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn insert(&self, handle: SessionHandle) {
        if let Some(old) = self.sessions.insert(handle.peer_id.clone(), handle) {
            warn!("Replaced session {} for {:?}", old.serial, old.peer_id);
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<SessionHandle> {
        self.sessions.get(peer_id).map(|h| h.clone())
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    pub fn remove(&self, peer_id: &PeerId) -> Option<SessionHandle> {
        let (_, handle) = self.sessions.remove(peer_id)?;
        let _ = self.departures.send(peer_id.clone());
        Some(handle)
    }

    /// Removes the entry only if it still belongs to session `serial`.
    pub fn remove_if_serial(&self, peer_id: &PeerId, serial: u64) -> bool {
        let removed = self
            .sessions
            .remove_if(peer_id, |_, h| h.serial == serial)
            .is_some();
        if removed {
            debug!("Session {} for {:?} left the registry", serial, peer_id);
            let _ = self.departures.send(peer_id.clone());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Sessions with an offer still waiting for its answer.
    pub fn awaiting_answer(&self) -> Vec<SessionHandle> {
        self.sessions
            .iter()
            .filter(|e| e.value().is_awaiting_answer())
            .map(|e| e.value().clone())
            .collect()
    }
}
