//! Side-channel events carried in place of a frame payload.

use std::fmt;

use crate::error::{FrameError, Result};

/// Kind of an inlined event, as carried in header byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Metadata tags.
    Tag,
    /// Application event travelling downstream.
    CustomDownstream,
    /// Application event travelling in both directions.
    CustomBoth,
}

impl EventKind {
    /// Wire value of this kind (never 0, which means "no event").
    pub const fn to_wire(self) -> u8 {
        match self {
            EventKind::Tag => 1,
            EventKind::CustomDownstream => 2,
            EventKind::CustomBoth => 3,
        }
    }

    /// Interpret a header event byte. 0 means no event.
    pub fn from_wire(value: u8) -> Result<Option<Self>> {
        match value {
            0 => Ok(None),
            1 => Ok(Some(EventKind::Tag)),
            2 => Ok(Some(EventKind::CustomDownstream)),
            3 => Ok(Some(EventKind::CustomBoth)),
            other => Err(FrameError::UnknownEventType(other)),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Tag => "tag",
            EventKind::CustomDownstream => "custom-downstream",
            EventKind::CustomBoth => "custom-both",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EventKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tag" => Ok(EventKind::Tag),
            "custom-downstream" => Ok(EventKind::CustomDownstream),
            "custom-both" => Ok(EventKind::CustomBoth),
            other => Err(FrameError::MalformedEvent(format!("unknown event kind {other:?}"))),
        }
    }
}

/// A typed event with an opaque structured-string body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedEvent {
    pub kind: EventKind,
    pub body: String,
}

impl TypedEvent {
    pub fn new(kind: EventKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    /// Parse an event body received on the wire.
    ///
    /// The body is taken verbatim and must be UTF-8.
    pub(crate) fn from_wire(kind: EventKind, body: &[u8]) -> Result<Self> {
        let body = std::str::from_utf8(body)
            .map_err(|err| FrameError::MalformedEvent(format!("body is not utf-8: {err}")))?;
        Ok(Self::new(kind, body))
    }
}
