use crate::error::{Error, MediaError, Result};
use crate::media::{
    CaptureError, DeviceClass, LocalTrack, MediaConstraints, MediaDevices, MediaStream,
    media_error,
};
use crate::signaling::{SignalingAdapter, Subscription};
use crate::state::CallStatus;
use std::sync::{Arc, Weak};
use tandem_core::{MediaKind, PeerId};
use tokio::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

#[derive(Default)]
struct MediaInner {
    camera: Option<MediaStream>,
    screen: Option<MediaStream>,
    peer: Option<PeerId>,
    screen_watcher: Option<Subscription>,
    session_watcher: Option<Subscription>,
}

impl MediaInner {
    fn active_video(&self) -> Option<Arc<LocalTrack>> {
        self.screen
            .as_ref()
            .and_then(|s| s.track(MediaKind::Video))
            .or_else(|| self.camera.as_ref().and_then(|c| c.track(MediaKind::Video)))
            .cloned()
    }

    fn outgoing(&self) -> Vec<Arc<LocalTrack>> {
        let audio = self
            .camera
            .as_ref()
            .and_then(|c| c.track(MediaKind::Audio))
            .cloned();
        audio.into_iter().chain(self.active_video()).collect()
    }

    fn stop_capture(&mut self) {
        if let Some(screen) = self.screen.take() {
            screen.stop();
        }
        if let Some(camera) = self.camera.take() {
            camera.stop();
        }
    }
}

impl Drop for MediaInner {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

struct MediaShared {
    devices: Arc<dyn MediaDevices>,
    adapter: SignalingAdapter,
    state: Mutex<MediaInner>,
}

/// Local capture for the call: camera, microphone and screen.
///
/// Every termination path stops what was captured: [`MediaController::end_call`],
/// [`MediaController::release`], the bound session ending for any reason,
/// and dropping the last handle.
#[derive(Clone)]
pub struct MediaController {
    inner: Arc<MediaShared>,
}

impl MediaController {
    pub fn new(devices: Arc<dyn MediaDevices>, adapter: SignalingAdapter) -> Self {
        Self {
            inner: Arc::new(MediaShared {
                devices,
                adapter,
                state: Mutex::new(MediaInner::default()),
            }),
        }
    }

    fn ensure_capture_allowed(&self) -> Result<()> {
        let context = self.inner.devices.capture_context();
        if context.allows_capture() {
            return Ok(());
        }
        warn!("Capture refused outside a secure context ({})", context.origin);
        Err(MediaError::InsecureContext {
            origin: context.origin,
        }
        .into())
    }

    fn capture_error(&self, err: CaptureError) -> Error {
        let origin = self.inner.devices.capture_context().origin;
        let err = media_error(err, &origin);
        warn!("Capture failed: {}", err);
        err.into()
    }

    /// Opens camera and microphone. If a call is bound, the new tracks take
    /// over the outgoing slots (video stays on the screen while sharing).
    pub async fn acquire_camera_and_mic(&self) -> Result<MediaStream> {
        self.ensure_capture_allowed()?;

        let devices = self
            .inner
            .devices
            .enumerate_devices()
            .await
            .map_err(|e| self.capture_error(e))?;

        for (class, what) in [
            (DeviceClass::VideoInput, "camera"),
            (DeviceClass::AudioInput, "microphone"),
        ] {
            if !devices.iter().any(|d| d.kind == class) {
                warn!("No {} found", what);
                return Err(MediaError::MediaUnavailable {
                    reason: format!("no {what} found"),
                }
                .into());
            }
        }

        let stream = self
            .inner
            .devices
            .get_user_media(MediaConstraints::camera_and_mic())
            .await
            .map_err(|e| self.capture_error(e))?;

        let mut state = self.inner.state.lock().await;
        if let Some(previous) = state.camera.replace(stream.clone()) {
            previous.stop();
        }
        info!("Camera and microphone acquired ({} tracks)", stream.tracks().len());

        if let Some(peer) = state.peer.clone() {
            for track in stream.tracks() {
                if track.kind() == MediaKind::Video && state.screen.is_some() {
                    continue;
                }
                self.send_track(&peer, track.clone()).await?;
            }
        }
        Ok(stream)
    }

    /// Flips the outgoing track of `kind` on or off. Capture keeps running
    /// and nothing is signaled. Returns the new flag.
    pub async fn toggle_track_enabled(&self, kind: MediaKind) -> Result<bool> {
        let state = self.inner.state.lock().await;
        let track = match kind {
            MediaKind::Audio => state
                .camera
                .as_ref()
                .and_then(|c| c.track(MediaKind::Audio))
                .cloned(),
            MediaKind::Video => state.active_video(),
        };
        let Some(track) = track else {
            return Err(MediaError::MediaUnavailable {
                reason: format!("no {kind} track to toggle"),
            }
            .into());
        };

        let enabled = track.toggle_enabled();
        debug!("{} track {} enabled: {}", kind, track.id(), enabled);
        Ok(enabled)
    }

    /// Sends the screen instead of the camera. Swaps the track in place so no
    /// new offer/answer round is needed.
    pub async fn start_screen_share(&self) -> Result<()> {
        self.ensure_capture_allowed()?;

        if self.inner.state.lock().await.screen.is_some() {
            debug!("Screen share already running");
            return Ok(());
        }

        let stream = self
            .inner
            .devices
            .get_display_media()
            .await
            .map_err(|e| self.capture_error(e))?;
        let Some(track) = stream.track(MediaKind::Video).cloned() else {
            stream.stop();
            return Err(MediaError::MediaUnavailable {
                reason: "screen capture produced no video".into(),
            }
            .into());
        };

        let mut state = self.inner.state.lock().await;
        if state.screen.is_some() {
            debug!("Screen share started meanwhile; dropping the extra capture");
            stream.stop();
            return Ok(());
        }
        if let Some(peer) = state.peer.clone() {
            if let Err(e) = self.send_track(&peer, track.clone()).await {
                stream.stop();
                return Err(e);
            }
        }

        state.screen = Some(stream);
        state.screen_watcher = Some(self.watch_screen_track(track.clone()));
        info!("Screen share started ({})", track.label());
        Ok(())
    }

    /// Returns to the camera. A no-op when not sharing.
    pub async fn stop_screen_share(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        // Dropping the watcher first keeps it from reacting to our own stop.
        state.screen_watcher.take();
        self.restore_camera(&mut state).await
    }

    async fn restore_camera(&self, state: &mut MediaInner) -> Result<()> {
        let Some(screen) = state.screen.take() else {
            return Ok(());
        };

        let camera_video = state
            .camera
            .as_ref()
            .and_then(|c| c.track(MediaKind::Video))
            .cloned();

        let res = match (state.peer.clone(), camera_video) {
            (Some(peer), Some(camera)) => self.inner.adapter.replace_track(&peer, camera).await,
            _ => Ok(()),
        };

        screen.stop();
        info!("Screen share stopped");
        res
    }

    /// The user ended sharing from the browser's own controls.
    async fn on_screen_track_ended(&self, track: &LocalTrack) {
        let mut state = self.inner.state.lock().await;
        let current = state
            .screen
            .as_ref()
            .and_then(|s| s.track(MediaKind::Video))
            .is_some_and(|t| t.id() == track.id());
        if !current {
            return;
        }

        info!("Screen share ended outside the app; falling back to camera");
        if let Some(watcher) = state.screen_watcher.take() {
            watcher.detach();
        }
        if let Err(e) = self.restore_camera(&mut state).await {
            warn!("Camera fallback failed: {}", e);
        }
    }

    fn watch_screen_track(&self, track: Arc<LocalTrack>) -> Subscription {
        let shared = Arc::downgrade(&self.inner);
        Subscription::new(tokio::spawn(async move {
            track.ended().await;
            if let Some(controller) = Self::upgrade(&shared) {
                controller.on_screen_track_ended(&track).await;
            }
        }))
    }

    /// Replaces the outgoing track of the same kind, or attaches `track` if
    /// there is none yet.
    async fn send_track(&self, peer: &PeerId, track: Arc<LocalTrack>) -> Result<()> {
        match self.inner.adapter.replace_track(peer, track.clone()).await {
            Err(Error::ProtocolViolation(_)) => {
                debug!("No outgoing {} yet for {:?}; attaching", track.kind(), peer);
                self.inner.adapter.attach_track(peer, track).await
            }
            res => res,
        }
    }

    /// Binds capture to the call with `peer`: attaches the outgoing tracks and
    /// releases capture once that session ends, whoever ends it.
    pub async fn publish_to(&self, peer: &PeerId) -> Result<()> {
        let departures = self.inner.adapter.registry().departures();
        let mut state = self.inner.state.lock().await;
        for track in state.outgoing() {
            self.inner.adapter.attach_track(peer, track).await?;
        }
        state.peer = Some(peer.clone());
        state.session_watcher = Some(self.watch_session_end(peer, departures));
        info!("Publishing local media to {:?}", peer);
        Ok(())
    }

    fn watch_session_end(
        &self,
        peer: &PeerId,
        mut departures: broadcast::Receiver<PeerId>,
    ) -> Subscription {
        let registry = self.inner.adapter.registry().clone();
        let shared = Arc::downgrade(&self.inner);
        let peer = peer.clone();
        Subscription::new(tokio::spawn(async move {
            while registry.contains(&peer) {
                match departures.recv().await {
                    Ok(gone) if gone == peer => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
            if let Some(controller) = Self::upgrade(&shared) {
                controller.on_session_ended(&peer).await;
            }
        }))
    }

    async fn on_session_ended(&self, peer: &PeerId) {
        let mut state = self.inner.state.lock().await;
        if state.peer.as_ref() != Some(peer) {
            return;
        }

        warn!("Call with {:?} ended; releasing capture", peer);
        if let Some(watcher) = state.session_watcher.take() {
            watcher.detach();
        }
        state.peer = None;
        state.screen_watcher.take();
        state.stop_capture();
    }

    /// Hangs up the bound call, then releases capture.
    pub async fn end_call(&self) -> Result<()> {
        let peer = self.inner.state.lock().await.peer.take();
        let res = match peer {
            Some(peer) => self.inner.adapter.end_call(&peer).await,
            None => Ok(()),
        };
        self.release().await;
        res
    }

    /// Stops every captured track and forgets the bound call.
    pub async fn release(&self) {
        let mut state = self.inner.state.lock().await;
        state.screen_watcher.take();
        state.session_watcher.take();
        state.peer = None;
        state.stop_capture();
        info!("Local media released");
    }

    pub async fn active_track_count(&self) -> usize {
        let state = self.inner.state.lock().await;
        state.camera.as_ref().map_or(0, MediaStream::live_tracks)
            + state.screen.as_ref().map_or(0, MediaStream::live_tracks)
    }

    pub async fn is_sharing_screen(&self) -> bool {
        self.inner.state.lock().await.screen.is_some()
    }

    pub async fn status(&self) -> Option<CallStatus> {
        let state = self.inner.state.lock().await;
        state
            .peer
            .as_ref()
            .and_then(|peer| self.inner.adapter.status().status(peer))
    }

    fn upgrade(shared: &Weak<MediaShared>) -> Option<Self> {
        shared.upgrade().map(|inner| Self { inner })
    }
}
