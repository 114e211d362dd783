//! Read-only hub status.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStatus {
    /// Subscribers currently registered.
    pub connected_subscribers: usize,
    /// Seconds since the hub started, with sub-second precision.
    pub uptime_seconds: f64,
    /// Current time, RFC 3339 UTC with milliseconds.
    pub timestamp: String,
}

/// Build a status snapshot from live counters.
pub fn hub_status(started_at: Instant, connected_subscribers: usize) -> HubStatus {
    HubStatus {
        connected_subscribers,
        uptime_seconds: started_at.elapsed().as_secs_f64(),
        timestamp: now_rfc3339(),
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
