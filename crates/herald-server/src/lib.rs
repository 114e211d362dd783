//! # herald-server
//!
//! In-memory SSE broadcast hub and its axum adapter.
//!
//! - Subscriber registry backed by a sharded concurrent map
//! - Encode-once fan-out with per-subscriber fault isolation
//! - Per-subscriber heartbeat comments and disconnect detection
//! - Bounded graceful shutdown that notifies every subscriber
//! - HTTP routes: `/sse`, `/broadcast`, `/status`, `/metrics`

#![deny(unsafe_code)]

pub mod config;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod status;

pub use config::{HubConfig, ServerConfig};
pub use hub::lifecycle::{HubController, ShutdownReport};
pub use hub::sink::{ChannelSink, EventSink, SseStream, channel};
pub use hub::subscriber::{CloseReason, Subscriber, SubscriberState};
pub use server::{HeraldServer, PublishRequest, PublishResponse};
pub use shutdown::{ShutdownCoordinator, wait_for_signal};
pub use status::HubStatus;
