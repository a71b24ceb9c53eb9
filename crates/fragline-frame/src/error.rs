use fragline_transport::TransportError;

/// Errors that can occur while fragmenting or reassembling frames.
///
/// Reassembly errors are local: the depayloader discards the frame in
/// progress and keeps going. See [`FrameError::is_recoverable`].
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A varint or header ran past the end of the buffer.
    #[error("truncated input")]
    TruncatedInput,

    /// A length prefix claims more bytes than remain in the buffer.
    #[error("length prefix {length} exceeds remaining {remaining} bytes")]
    OversizedLength { length: usize, remaining: usize },

    /// A fragment did not start where the previous one ended.
    #[error("fragment offset {got} does not match expected {expected}")]
    FragmentMismatch { expected: u32, got: u32 },

    /// The inlined format descriptor could not be decoded.
    #[error("malformed format descriptor: {0}")]
    MalformedDescriptor(String),

    /// The inlined event could not be decoded.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The event type field holds an unknown tag.
    #[error("unknown event type {0}")]
    UnknownEventType(u8),

    /// A frame references a format version that was never announced.
    #[error("format version {0} referenced before being announced")]
    MissingFormatVersion(u8),

    /// A format version outside 0..=7.
    #[error("invalid format version {0} (must be 0-7)")]
    InvalidFormatVersion(u8),

    /// The reserved header bytes are not zero.
    #[error("reserved header bytes must be zero (got {0:#06x})")]
    ReservedBitsSet(u16),

    /// The frame being reassembled outgrew the configured bound.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The configured MTU leaves no room for payload after the header.
    #[error("mtu {mtu} too small (must exceed the {header}-byte header)")]
    MtuTooSmall { mtu: usize, header: usize },

    /// Pushing a packet to the transport failed; remaining fragments were dropped.
    #[error("transport push failed after {sent} of the frame's packets: {source}")]
    TransportPushFailed {
        sent: usize,
        #[source]
        source: TransportError,
    },

    /// Session description could not be parsed.
    #[error("invalid session description: {0}")]
    InvalidSession(String),

    /// The receiving transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// True for errors that only cost the frame being reassembled.
    ///
    /// Configuration, push and transport errors are not recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FrameError::TruncatedInput
            | FrameError::OversizedLength { .. }
            | FrameError::FragmentMismatch { .. }
            | FrameError::MalformedDescriptor(_)
            | FrameError::MalformedEvent(_)
            | FrameError::UnknownEventType(_)
            | FrameError::MissingFormatVersion(_)
            | FrameError::InvalidFormatVersion(_)
            | FrameError::ReservedBitsSet(_)
            | FrameError::FrameTooLarge { .. } => true,
            FrameError::Transport(err) => err.is_malformed(),
            FrameError::MtuTooSmall { .. }
            | FrameError::TransportPushFailed { .. }
            | FrameError::InvalidSession(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
