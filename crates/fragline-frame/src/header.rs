use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};
use fragline_transport::Datagram;

use crate::cache::FormatVersion;
use crate::error::{FrameError, Result};
use crate::event::EventKind;

/// Fragment header: flags (1) + event type (1) + reserved (2) + offset (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

const CAPS_INLINE_BIT: u8 = 0x80;
const VERSION_SHIFT: u8 = 4;
const FLAG_MASK: u8 = 0x0f;

bitflags! {
    /// Per-frame media flags, copied into every packet of the frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u8 {
        /// Frame cannot be decoded on its own.
        const DELTA_UNIT = 0b0000_1000;
        /// Media-specific flag 1.
        const MEDIA1 = 0b0000_0100;
        /// Media-specific flag 2.
        const MEDIA2 = 0b0000_0010;
        /// Media-specific flag 3.
        const MEDIA3 = 0b0000_0001;
    }
}

/// The 8-byte header at the front of every fragment.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |C| CV  |D|X|Y|Z|  Event type   |          Reserved (0)         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                   Fragment offset (32-bit BE)                 |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    /// The frame starts with an inlined format descriptor.
    pub caps_inline: bool,
    /// Format version that applies to the frame.
    pub version: FormatVersion,
    pub flags: FrameFlags,
    /// Raw event type byte; 0 when the frame carries no event.
    pub event_type: u8,
    /// Byte offset of this fragment within the frame.
    pub offset: u32,
}

impl PacketHeader {
    /// Interpret the event type byte.
    pub fn event_kind(&self) -> Result<Option<EventKind>> {
        EventKind::from_wire(self.event_type)
    }

    /// First header byte: C, CV and the media flags.
    pub fn flags_byte(&self) -> u8 {
        let mut byte = (self.version.get() << VERSION_SHIFT) | self.flags.bits();
        if self.caps_inline {
            byte |= CAPS_INLINE_BIT;
        }
        byte
    }
}

/// Write `header` in wire format.
pub fn encode_header(header: &PacketHeader, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u8(header.flags_byte());
    dst.put_u8(header.event_type);
    dst.put_u16(0);
    dst.put_u32(header.offset);
}

/// Parse a header from the first 8 bytes of `src`.
pub fn decode_header(src: &[u8]) -> Result<PacketHeader> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::TruncatedInput);
    }

    let reserved = u16::from_be_bytes([src[2], src[3]]);
    if reserved != 0 {
        return Err(FrameError::ReservedBitsSet(reserved));
    }

    let first = src[0];
    Ok(PacketHeader {
        caps_inline: first & CAPS_INLINE_BIT != 0,
        version: FormatVersion::from_bits(first >> VERSION_SHIFT),
        flags: FrameFlags::from_bits_truncate(first & FLAG_MASK),
        event_type: src[1],
        offset: u32::from_be_bytes([src[4], src[5], src[6], src[7]]),
    })
}

/// One fragment of a frame, as handed to or received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPacket {
    pub header: PacketHeader,
    /// Last fragment of the frame.
    pub marker: bool,
    /// The transport saw a gap before this packet.
    pub discont: bool,
    /// Media timestamp, passed through.
    pub timestamp: u32,
    /// Fragment bytes following the header.
    pub payload: Bytes,
}

impl TransportPacket {
    /// Total size on the transport (header + fragment bytes).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize into a datagram for the carrier.
    pub fn to_datagram(&self) -> Datagram {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_header(&self.header, &mut buf);
        buf.put_slice(&self.payload);
        Datagram {
            marker: self.marker,
            timestamp: self.timestamp,
            discont: false,
            payload: buf.freeze(),
        }
    }

    /// Parse a received datagram.
    pub fn from_datagram(datagram: Datagram) -> Result<Self> {
        let header = decode_header(&datagram.payload)?;
        Ok(Self {
            header,
            marker: datagram.marker,
            discont: datagram.discont,
            timestamp: datagram.timestamp,
            payload: datagram.payload.slice(HEADER_SIZE..),
        })
    }
}
