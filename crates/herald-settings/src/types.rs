//! Settings types. Serialized in camelCase to match the settings file.

use std::time::Duration;

use herald_core::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeraldSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Broadcast hub tuning.
    pub hub: HubSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl HeraldSettings {
    /// Reject values the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.hub.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.heartbeatIntervalMs must be greater than 0".into(),
            ));
        }
        if self.hub.write_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.writeTimeoutMs must be greater than 0".into(),
            ));
        }
        if self.hub.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.sendQueueCapacity must be greater than 0".into(),
            ));
        }
        if self.server.host.is_empty() {
            return Err(SettingsError::InvalidValue("server.host must not be empty".into()));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` for auto-assign).
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// Broadcast hub settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Interval between `: heartbeat` comments per subscriber.
    pub heartbeat_interval_ms: u64,
    /// Upper bound on a single write to one subscriber.
    pub write_timeout_ms: u64,
    /// Upper bound on the whole shutdown sequence.
    pub shutdown_grace_ms: u64,
    /// Frames buffered per subscriber before it is considered dead.
    pub send_queue_capacity: usize,
}

impl HubSettings {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Write timeout as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30_000,
            write_timeout_ms: 5_000,
            shutdown_grace_ms: 3_000,
            send_queue_capacity: 64,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}
