//! Server and hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP listener configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}

/// Broadcast hub tuning.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Interval between heartbeat comments per subscriber.
    pub heartbeat_interval: Duration,
    /// Upper bound on one write to one subscriber.
    pub write_timeout: Duration,
    /// Upper bound on the whole shutdown sequence.
    pub shutdown_grace: Duration,
    /// Frames buffered per subscriber before writes fail fast.
    pub send_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(3),
            send_queue_capacity: 64,
        }
    }
}
