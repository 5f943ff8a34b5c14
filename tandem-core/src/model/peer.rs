use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Relay-assigned identifier of a remote party.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// The relay announced the peer in our room.
    Joined,
    /// The local user called a peer we had no session for.
    Outgoing,
    /// The peer called us.
    Incoming,
}

/// Glare tiebreak role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Yields on glare: rolls back its own offer and answers the remote one.
    Polite,
    /// Wins on glare: ignores the colliding remote offer.
    Impolite,
}

impl Role {
    /// The callee is always polite. Both ends derive the same pair because
    /// only the callee learns about the session through an incoming call.
    pub fn for_origin(origin: SessionOrigin) -> Self {
        match origin {
            SessionOrigin::Incoming => Role::Polite,
            SessionOrigin::Joined | SessionOrigin::Outgoing => Role::Impolite,
        }
    }
}
