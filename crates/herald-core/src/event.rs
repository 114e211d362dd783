//! Logical events handed to the hub by publishers.
//!
//! An [`Event`] lives only for the duration of one encode + dispatch call.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EncodeError;

/// Name of the terminal event sent to every subscriber on shutdown.
pub const SHUTDOWN_EVENT: &str = "shutdown";

/// Payload of the terminal shutdown event.
pub const SHUTDOWN_MESSAGE: &str = "Server shutting down";

/// Opaque field token. Numbers and strings are passed through verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    /// Number, rendered in its JSON textual form.
    Number(serde_json::Number),
    /// String, rendered as-is.
    Text(String),
}

/// Value of the `id:` line.
pub type EventId = Token;

/// Value of the `retry:` line. Not range-checked.
pub type Retry = Token;

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => fmt::Display::fmt(n, f),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Token {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Token {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Event body. Strings are sent as-is; anything else is JSON-encoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Raw text.
    Text(String),
    /// Structured value, serialized to JSON at encode time.
    Json(Value),
}

impl Payload {
    /// Convert any serializable value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodeError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Text that will be split into `data:` lines.
    pub fn render(&self) -> Result<Cow<'_, str>, EncodeError> {
        match self {
            Self::Text(s) => Ok(Cow::Borrowed(s)),
            Self::Json(v) => Ok(Cow::Owned(serde_json::to_string(v)?)),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

/// One logical event: `{ event?, id?, data?, retry? }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Event name (`event:` line). Empty names are omitted on the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Event ID (`id:` line).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    /// Body (`data:` lines).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    /// Client reconnection hint (`retry:` line), normally milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<Retry>,
}

impl Event {
    /// Unnamed event carrying `data`.
    pub fn new(data: impl Into<Payload>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Named event carrying `data`.
    pub fn named(name: impl Into<String>, data: impl Into<Payload>) -> Self {
        Self {
            event: Some(name.into()),
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// The terminal notice written to every subscriber during shutdown.
    pub fn shutdown() -> Self {
        Self::named(SHUTDOWN_EVENT, SHUTDOWN_MESSAGE)
    }

    /// Set the `id:` token.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the `retry:` hint.
    #[must_use]
    pub fn with_retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_id_renders_verbatim() {
        assert_eq!(EventId::from(42_i64).to_string(), "42");
        let float: EventId = serde_json::from_value(json!(1.5)).unwrap();
        assert_eq!(float.to_string(), "1.5");
    }

    #[test]
    fn string_id_renders_verbatim() {
        assert_eq!(EventId::from("abc-1").to_string(), "abc-1");
    }

    #[test]
    fn payload_deserializes_string_as_text() {
        let p: Payload = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(p, Payload::Text("hello".into()));
    }

    #[test]
    fn payload_deserializes_object_as_json() {
        let p: Payload = serde_json::from_value(json!({"a": 1})).unwrap();
        assert_eq!(p, Payload::Json(json!({"a": 1})));
    }

    #[test]
    fn payload_from_value_unwraps_strings() {
        assert_eq!(Payload::from(json!("x")), Payload::Text("x".into()));
        assert_eq!(Payload::from(json!([1, 2])), Payload::Json(json!([1, 2])));
    }

    #[test]
    fn render_json_payload() {
        let p = Payload::Json(json!({"k": "v"}));
        assert_eq!(p.render().unwrap(), r#"{"k":"v"}"#);
    }

    #[test]
    fn json_constructor_rejects_non_string_keys() {
        let mut map = std::collections::BTreeMap::new();
        let _ = map.insert((1, 2), "tuple key");
        assert!(Payload::json(&map).is_err());
    }

    #[test]
    fn event_deserializes_publish_body() {
        let e: Event = serde_json::from_value(json!({
            "event": "update",
            "id": 7,
            "data": {"n": 1},
            "retry": 1500
        }))
        .unwrap();
        assert_eq!(e.event.as_deref(), Some("update"));
        assert_eq!(e.id, Some(EventId::from(7_i64)));
        assert_eq!(e.data, Some(Payload::Json(json!({"n": 1}))));
        assert_eq!(e.retry, Some(Retry::from(1500_u64)));
    }

    #[test]
    fn retry_accepts_strings_and_negative_numbers() {
        let e: Event = serde_json::from_value(json!({"retry": "3000"})).unwrap();
        assert_eq!(e.retry, Some(Retry::Text("3000".into())));
        let e: Event = serde_json::from_value(json!({"retry": -1})).unwrap();
        assert_eq!(e.retry, Some(Retry::from(-1_i64)));
    }

    #[test]
    fn event_deserializes_empty_body() {
        let e: Event = serde_json::from_value(json!({})).unwrap();
        assert_eq!(e, Event::default());
    }

    #[test]
    fn shutdown_event_shape() {
        let e = Event::shutdown();
        assert_eq!(e.event.as_deref(), Some("shutdown"));
        assert_eq!(e.data, Some(Payload::Text("Server shutting down".into())));
    }

    #[test]
    fn builders_compose() {
        let e = Event::new("body").with_id("x").with_retry(10_u64);
        assert_eq!(e.id, Some(EventId::Text("x".into())));
        assert_eq!(e.retry, Some(Retry::from(10_u64)));
        assert!(e.event.is_none());
    }
}
