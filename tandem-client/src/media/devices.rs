use crate::error::MediaError;
use crate::media::MediaStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tandem_core::utils::LOOPBACK_HOSTS;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    AudioInput,
    VideoInput,
    AudioOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceClass,
    pub label: String,
}

/// Where capture is being requested from.
#[derive(Debug, Clone)]
pub struct CaptureContext {
    pub secure: bool,
    pub hostname: String,
    pub origin: String,
}

impl CaptureContext {
    /// Browsers only expose capture to secure contexts, with loopback hosts
    /// counted as secure even over plain HTTP.
    pub fn allows_capture(&self) -> bool {
        self.secure || LOOPBACK_HOSTS.contains(&self.hostname.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub fn camera_and_mic() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Raw failures reported by a capture backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("capture not allowed")]
    NotAllowed,
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("device could not be read: {0}")]
    NotReadable(String),
    #[error("capture requires a secure context")]
    Insecure,
    #[error("{0}")]
    Other(String),
}

/// The platform's capture surface (camera, microphone, screen).
#[async_trait]
pub trait MediaDevices: Send + Sync + 'static {
    fn capture_context(&self) -> CaptureContext;

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    async fn get_user_media(&self, constraints: MediaConstraints)
    -> Result<MediaStream, CaptureError>;

    async fn get_display_media(&self) -> Result<MediaStream, CaptureError>;
}

pub(crate) fn media_error(err: CaptureError, origin: &str) -> MediaError {
    match err {
        CaptureError::NotAllowed => MediaError::PermissionDenied,
        CaptureError::Insecure => MediaError::InsecureContext {
            origin: origin.to_owned(),
        },
        CaptureError::NotFound(reason)
        | CaptureError::NotReadable(reason)
        | CaptureError::Other(reason) => MediaError::MediaUnavailable { reason },
    }
}
