use tandem_core::PeerId;
use thiserror::Error;

/// Capture failures the user can act on. Never retried automatically: the
/// fix is environmental (HTTPS, permissions, plugging in a device).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("no usable capture device: {reason}")]
    MediaUnavailable { reason: String },

    #[error("camera or microphone access was denied; allow it in the browser and retry")]
    PermissionDenied,

    #[error(
        "capture is only allowed from a secure context; open the app over HTTPS or from localhost instead of {origin}"
    )]
    InsecureContext { origin: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("session limit of {0} reached")]
    SessionLimit(usize),

    #[error("no session for peer {0}")]
    UnknownSession(PeerId),

    #[error("session for peer {0} is closed")]
    SessionClosed(PeerId),
}

impl Error {
    pub(crate) fn transport(err: anyhow::Error) -> Self {
        Error::TransportFailure(format!("{err:#}"))
    }

    pub(crate) fn violation(msg: impl Into<String>) -> Self {
        Error::ProtocolViolation(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
