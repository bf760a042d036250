//! Runtime server configuration.

use std::path::PathBuf;
use std::time::Duration;

use parley_settings::ServerSettings;

use crate::hub::HubConfig;

/// Resolved configuration for [`ParleyServer`](crate::ParleyServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Per-connection ping period.
    pub heartbeat_interval: Duration,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Commands buffered in front of the hub.
    pub hub_queue_capacity: usize,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Root of the static file responder.
    pub static_dir: PathBuf,
    /// Sentinel the message log starts with.
    pub seed_message: String,
}

impl ServerConfig {
    /// Hub tuning derived from this configuration.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            heartbeat_interval: self.heartbeat_interval,
            queue_capacity: self.hub_queue_capacity,
            seed_message: self.seed_message.clone(),
        }
    }
}

impl Default for ServerConfig {
    /// Loopback on an ephemeral port; everything else as in [`ServerSettings`].
    fn default() -> Self {
        let mut config = Self::from(&ServerSettings::default());
        config.host = "127.0.0.1".into();
        config.port = 0;
        config
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            heartbeat_interval: Duration::from_millis(s.heartbeat_interval_ms),
            send_queue_capacity: s.send_queue_capacity,
            hub_queue_capacity: s.hub_queue_capacity,
            max_message_size: s.max_message_size,
            static_dir: PathBuf::from(&s.static_dir),
            seed_message: s.seed_message.clone(),
        }
    }
}
