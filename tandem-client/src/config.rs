use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tandem_core::IceServerConfig;
use tandem_core::utils::{
    DEFAULT_DATA_CHANNEL_LABEL, DEFAULT_RELAY_URL, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2,
};

/// Client-side settings. Every field has a default, so a partial JSON
/// document is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub relay_url: String,
    pub connect_timeout_secs: u64,
    /// Label announced to the room (the relay calls it `email`).
    pub display_label: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub data_channel_label: String,
    pub command_capacity: usize,
    pub transport_event_capacity: usize,
    /// Concurrent sessions allowed; the call model is one-to-one.
    pub max_sessions: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            connect_timeout_secs: 15,
            display_label: String::new(),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            data_channel_label: DEFAULT_DATA_CHANNEL_LABEL.to_owned(),
            command_capacity: 100,
            transport_event_capacity: 256,
            max_sessions: 1,
        }
    }
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            ice_servers: self.ice_servers.clone(),
        }
    }
}
