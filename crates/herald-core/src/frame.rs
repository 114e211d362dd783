//! `text/event-stream` frame encoding.
//!
//! ```text
//! frame      := [id-line] [event-line] [retry-line] data-line* blank-line
//! id-line    := "id: " <token> "\n"
//! event-line := "event: " <token> "\n"
//! retry-line := "retry: " <token> "\n"
//! data-line  := "data: " <one-line-of-payload> "\n"
//! blank-line := "\n"
//! ```
//!
//! Comment frames (`: connected`, `: heartbeat`) carry no field lines.

use std::borrow::Cow;
use std::fmt::Write as _;

use bytes::Bytes;

use crate::errors::EncodeError;
use crate::event::Event;

/// Response headers that must precede the first body byte of a stream.
pub const HANDSHAKE_HEADERS: [(&str, &str); 3] = [
    ("content-type", "text/event-stream"),
    ("cache-control", "no-cache"),
    ("connection", "keep-alive"),
];

/// One encoded, immutable unit of the wire format.
///
/// Cloning is cheap: every subscriber in a broadcast shares the same buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    /// A comment frame: `: <text>\n\n`.
    pub fn comment(text: &str) -> Self {
        Self(Bytes::from(format!(": {text}\n\n")))
    }

    /// First bytes written to every new stream.
    pub fn connected() -> Self {
        Self(Bytes::from_static(b": connected\n\n"))
    }

    /// Keep-alive written on every heartbeat tick.
    pub fn heartbeat() -> Self {
        Self(Bytes::from_static(b": heartbeat\n\n"))
    }

    /// Raw bytes of the frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Frame as text.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame is empty. Encoded frames never are.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the frame, returning the shared buffer.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<String> for Frame {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

/// Encode an event into a frame.
///
/// Lines are emitted in order `id`, `event`, `retry`, `data`, each only when
/// the field is present (`event` also requires a non-empty name). The payload
/// is split on `\n` into one `data:` line per segment; an empty payload emits
/// no `data:` lines. A single blank line terminates the frame.
///
/// `id` and `retry` tokens are written verbatim. A
/// [`Payload::Json`](crate::event::Payload::Json) value
/// always renders, so in practice encoding failures surface earlier, from
/// [`Payload::json`](crate::event::Payload::json).
pub fn encode(event: &Event) -> Result<Frame, EncodeError> {
    let data = match &event.data {
        Some(payload) => Some(payload.render()?),
        None => None,
    };

    let mut out = String::with_capacity(data.as_ref().map_or(0, |d| d.len()) + 64);
    if let Some(id) = &event.id {
        let _ = writeln!(out, "id: {id}");
    }
    if let Some(name) = event.event.as_deref().filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "event: {name}");
    }
    if let Some(retry) = &event.retry {
        let _ = writeln!(out, "retry: {retry}");
    }
    if let Some(text) = data.filter(|d| !d.is_empty()) {
        for line in text.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push('\n');

    Ok(Frame::from(out))
}
