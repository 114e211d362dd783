//! Error taxonomy for the hub.
//!
//! - [`EncodeError`]: a payload could not be turned into wire text
//! - [`SinkError`]: a single write or close on one subscriber's sink failed
//! - [`DeliveryError`]: a [`SinkError`] attributed to a subscriber
//! - [`HubError`]: failures surfaced to the caller of a hub operation
//!
//! Delivery failures are contained at the subscriber boundary and never
//! become a [`HubError`].

use thiserror::Error;

use crate::ids::SubscriberId;

/// Event payload could not be serialized.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JSON serialization of a non-string payload failed.
    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A write to a subscriber's output sink failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The peer went away or the sink was closed locally.
    #[error("sink closed")]
    Closed,
    /// The outbound queue is full; the subscriber is not keeping up.
    #[error("sink queue full")]
    Full,
    /// The write did not complete within the allotted time.
    #[error("write timed out")]
    TimedOut,
    /// Any other transport failure.
    #[error("sink I/O error: {0}")]
    Io(String),
}

impl SinkError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Full => "full",
            Self::TimedOut => "timed_out",
            Self::Io(_) => "io",
        }
    }
}

/// Per-subscriber delivery failure. Logged, never propagated to publishers.
#[derive(Clone, Debug, Error)]
#[error("delivery to {subscriber} failed: {source}")]
pub struct DeliveryError {
    /// The subscriber whose sink failed.
    pub subscriber: SubscriberId,
    /// Underlying sink failure.
    #[source]
    pub source: SinkError,
}

/// Errors returned to callers of hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// The event could not be encoded; nothing was sent.
    #[error(transparent)]
    Encoding(#[from] EncodeError),

    /// A subscriber was registered twice.
    #[error("subscriber {0} is already registered")]
    DuplicateSubscriber(SubscriberId),

    /// The connection could not be set up for streaming.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn encode_error_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err = EncodeError::from(json_err);
        assert!(err.to_string().starts_with("failed to serialize event payload"));
    }

    #[test]
    fn encoding_converts_into_hub_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err: HubError = EncodeError::from(json_err).into();
        assert_matches!(err, HubError::Encoding(_));
    }

    #[test]
    fn duplicate_subscriber_display() {
        let err = HubError::DuplicateSubscriber(SubscriberId::from("sub_1"));
        assert_eq!(err.to_string(), "subscriber sub_1 is already registered");
    }

    #[test]
    fn handshake_display() {
        let err = HubError::Handshake("hub is shutting down".into());
        assert_eq!(err.to_string(), "handshake failed: hub is shutting down");
    }

    #[test]
    fn delivery_error_carries_source() {
        let err = DeliveryError {
            subscriber: SubscriberId::from("sub_9"),
            source: SinkError::Full,
        };
        assert_eq!(err.to_string(), "delivery to sub_9 failed: sink queue full");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("sink queue full"));
    }

    #[test]
    fn sink_error_kinds() {
        assert_eq!(SinkError::Closed.kind(), "closed");
        assert_eq!(SinkError::Full.kind(), "full");
        assert_eq!(SinkError::TimedOut.kind(), "timed_out");
        assert_eq!(SinkError::Io("x".into()).kind(), "io");
    }
}
