pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

/// Label of the data channel opened by the call initiator.
pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "messages";

/// Hosts browsers treat as potentially trustworthy even over plain HTTP.
pub const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:8000";
