use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Carrier header: flags (1) + marker/type (1) + sequence (2) + timestamp (4) + stream id (4).
pub const CARRIER_HEADER_SIZE: usize = 12;

/// Carrier version written in the top two bits of the first byte.
pub const CARRIER_VERSION: u8 = 2;

/// Dynamic payload type used when none is configured.
pub const DEFAULT_PAYLOAD_TYPE: u8 = 96;

/// Media clock rate advertised for the timestamp field.
pub const DEFAULT_CLOCK_RATE: u32 = 90_000;

const MARKER_BIT: u8 = 0x80;
const PAYLOAD_TYPE_MASK: u8 = 0x7f;

/// Fixed carrier header preceding every datagram on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierHeader {
    /// Set on the last datagram of a logical frame.
    pub marker: bool,
    /// 7-bit payload type.
    pub payload_type: u8,
    /// Per-stream sequence number, wrapping.
    pub sequence: u16,
    /// Media timestamp, passed through untouched.
    pub timestamp: u32,
    /// Identifies the sending stream.
    pub stream_id: u32,
}

/// A datagram as seen by the fragmentation layer.
///
/// Sequence numbering and stream identity stay inside the transport; the
/// layer above only sees the marker, the timestamp and whether a gap was
/// detected before this datagram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datagram {
    pub marker: bool,
    pub timestamp: u32,
    /// Set by receiving endpoints when earlier datagrams may have been lost.
    pub discont: bool,
    pub payload: Bytes,
}

impl Datagram {
    /// Create an outgoing datagram.
    pub fn new(marker: bool, timestamp: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            marker,
            timestamp,
            discont: false,
            payload: payload.into(),
        }
    }

    /// The total wire size of this datagram (carrier header + payload).
    pub fn wire_size(&self) -> usize {
        CARRIER_HEADER_SIZE + self.payload.len()
    }
}

/// Encode a carrier header and payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬──────────┬──────────┬───────────┬───────────┬─────────┐
/// │ V=2    │ M │ PT   │ Sequence │ Timestamp │ Stream id │ Payload │
/// │ (1B)   │ (1B)     │ (2B BE)  │ (4B BE)   │ (4B BE)   │         │
/// └────────┴──────────┴──────────┴───────────┴───────────┴─────────┘
/// ```
pub fn encode_datagram(header: &CarrierHeader, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(CARRIER_HEADER_SIZE + payload.len());
    dst.put_u8(CARRIER_VERSION << 6);
    let mut second = header.payload_type & PAYLOAD_TYPE_MASK;
    if header.marker {
        second |= MARKER_BIT;
    }
    dst.put_u8(second);
    dst.put_u16(header.sequence);
    dst.put_u32(header.timestamp);
    dst.put_u32(header.stream_id);
    dst.put_slice(payload);
}

/// Decode one complete datagram into its carrier header and payload.
///
/// The payload shares the input allocation.
pub fn decode_datagram(mut src: Bytes) -> Result<(CarrierHeader, Bytes)> {
    if src.len() < CARRIER_HEADER_SIZE {
        return Err(TransportError::DatagramTooShort {
            len: src.len(),
            min: CARRIER_HEADER_SIZE,
        });
    }

    let first = src.get_u8();
    let version = first >> 6;
    if version != CARRIER_VERSION {
        return Err(TransportError::UnsupportedVersion(version));
    }

    let second = src.get_u8();
    let header = CarrierHeader {
        marker: second & MARKER_BIT != 0,
        payload_type: second & PAYLOAD_TYPE_MASK,
        sequence: src.get_u16(),
        timestamp: src.get_u32(),
        stream_id: src.get_u32(),
    };

    Ok((header, src))
}

/// Detects gaps in a received sequence number stream.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last: Option<u16>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sequence` and report whether it breaks continuity.
    ///
    /// The first sequence number observed always counts as a discontinuity,
    /// as does any number that is not exactly one past the previous one
    /// (loss, reordering, duplication).
    pub fn observe(&mut self, sequence: u16) -> bool {
        let discont = match self.last {
            Some(prev) => prev.wrapping_add(1) != sequence,
            None => true,
        };
        self.last = Some(sequence);
        discont
    }

    /// Forget the last observed sequence number.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
