use bytes::Bytes;

use crate::cache::{FormatDescriptor, FormatVersion};
use crate::event::TypedEvent;
use crate::header::FrameFlags;

/// One logical unit handed to the payloader.
///
/// A frame without a descriptor keeps whatever format was last announced.
/// A frame carrying an event sends the event instead of its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalFrame {
    pub payload: Bytes,
    pub descriptor: Option<FormatDescriptor>,
    pub event: Option<TypedEvent>,
    pub flags: FrameFlags,
    /// Media timestamp, copied into every packet.
    pub timestamp: u32,
}

impl LogicalFrame {
    /// A payload-only frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// An event-only frame.
    pub fn event(event: TypedEvent) -> Self {
        Self {
            event: Some(event),
            ..Self::default()
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<FormatDescriptor>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A frame rebuilt by the depayloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledFrame {
    pub payload: Bytes,
    pub flags: FrameFlags,
    /// Version the frame was sent under.
    pub version: FormatVersion,
    /// Descriptor resolved from the version cache.
    pub descriptor: FormatDescriptor,
    /// The active format switched with this frame.
    pub format_changed: bool,
    /// Timestamp of the packet that completed the frame.
    pub timestamp: u32,
}

/// What a completed fragment sequence turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembled {
    Frame(ReassembledFrame),
    Event(TypedEvent),
}

impl Reassembled {
    pub fn into_frame(self) -> Option<ReassembledFrame> {
        match self {
            Reassembled::Frame(frame) => Some(frame),
            Reassembled::Event(_) => None,
        }
    }

    pub fn into_event(self) -> Option<TypedEvent> {
        match self {
            Reassembled::Event(event) => Some(event),
            Reassembled::Frame(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn builder_sets_fields() {
        let frame = LogicalFrame::new(&b"abc"[..])
            .with_descriptor("video/x-raw")
            .with_flags(FrameFlags::DELTA_UNIT)
            .with_timestamp(90);

        assert_eq!(frame.payload.as_ref(), b"abc");
        assert_eq!(frame.descriptor.unwrap().as_str(), "video/x-raw");
        assert_eq!(frame.flags, FrameFlags::DELTA_UNIT);
        assert_eq!(frame.timestamp, 90);
        assert!(frame.event.is_none());
    }

    #[test]
    fn event_frame_has_no_payload() {
        let frame = LogicalFrame::event(TypedEvent::new(EventKind::Tag, "taglist"));
        assert!(frame.payload.is_empty());
        assert_eq!(frame.event.unwrap().kind, EventKind::Tag);
    }

    #[test]
    fn reassembled_accessors() {
        let event = Reassembled::Event(TypedEvent::new(EventKind::CustomBoth, "x"));
        assert!(event.clone().into_frame().is_none());
        assert!(event.into_event().is_some());
    }
}
