//! # herald-core
//!
//! Shared vocabulary for the Herald SSE broadcast hub.
//!
//! - **Events**: [`Event`], [`EventId`], [`Payload`] describing one logical publish
//! - **Frames**: [`encode`] turns an event into `text/event-stream` wire text
//! - **Errors**: [`HubError`] and friends, built on `thiserror`
//! - **IDs**: [`SubscriberId`] newtype
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod errors;
pub mod event;
pub mod frame;
pub mod ids;
pub mod logging;

pub use errors::{DeliveryError, EncodeError, HubError, Result, SinkError};
pub use event::{Event, EventId, Payload, Retry, Token};
pub use frame::{Frame, HANDSHAKE_HEADERS, encode};
pub use ids::SubscriberId;
pub use logging::LogFormat;
