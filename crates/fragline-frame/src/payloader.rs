use bytes::{BufMut, BytesMut};
use fragline_transport::TransportError;
use tracing::{debug, trace};

use crate::cache::{FormatCache, FormatDescriptor, FormatVersion};
use crate::error::{FrameError, Result};
use crate::frame::LogicalFrame;
use crate::header::{PacketHeader, TransportPacket, HEADER_SIZE};
use crate::varint::encode_varint;

/// Default maximum transmission size per packet (header included).
pub const DEFAULT_MTU: usize = 1400;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Configuration for a [`Payloader`].
#[derive(Debug, Clone)]
pub struct PayloaderConfig {
    /// Maximum packet size, 8-byte header included. Default: 1400.
    pub mtu: usize,
    /// Descriptor agreed at session setup (version 0), if any.
    pub initial_descriptor: Option<FormatDescriptor>,
}

impl Default for PayloaderConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            initial_descriptor: None,
        }
    }
}

/// Splits logical frames into transport packets.
///
/// Each frame is first serialized into one contiguous buffer (inlined
/// descriptor, then event or payload) and the buffer is then cut into
/// `mtu - 8` byte fragments. One payloader per session.
pub struct Payloader {
    mtu: usize,
    cache: FormatCache,
    /// Version stamped on outgoing packets.
    current_version: FormatVersion,
    /// Last version handed out by the in-band rotation.
    last_assigned: FormatVersion,
    last_announced: Option<FormatDescriptor>,
    /// Descriptor waiting to be inlined in front of the next frame.
    pending_caps: Option<FormatDescriptor>,
    buf: BytesMut,
}

impl Payloader {
    /// Create a payloader, validating the MTU once.
    pub fn new(config: PayloaderConfig) -> Result<Self> {
        if config.mtu <= HEADER_SIZE {
            return Err(FrameError::MtuTooSmall {
                mtu: config.mtu,
                header: HEADER_SIZE,
            });
        }

        let mut cache = FormatCache::new();
        if let Some(descriptor) = &config.initial_descriptor {
            cache.store(FormatVersion::OUT_OF_BAND, descriptor.clone());
        }

        Ok(Self {
            mtu: config.mtu,
            cache,
            current_version: FormatVersion::OUT_OF_BAND,
            last_assigned: FormatVersion::OUT_OF_BAND,
            last_announced: config.initial_descriptor,
            pending_caps: None,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        })
    }

    /// Announce a new upstream format.
    ///
    /// A descriptor equal to the last announced one is a no-op. Otherwise it
    /// takes the next version in the 1..=7 rotation and is inlined in front
    /// of the next frame.
    pub fn set_descriptor(&mut self, descriptor: FormatDescriptor) -> FormatVersion {
        if self.last_announced.as_ref() == Some(&descriptor) {
            return self.current_version;
        }

        let version = self.last_assigned.next_inline();
        debug!(%version, len = descriptor.len(), "announcing format");

        self.last_assigned = version;
        self.current_version = version;
        self.cache.store(version, descriptor.clone());
        self.last_announced = Some(descriptor.clone());
        self.pending_caps = Some(descriptor);
        version
    }

    /// Fragment one frame, handing each packet to `push` in order.
    ///
    /// Returns the number of packets pushed. A frame with nothing to send
    /// (no payload, no event, no format change) produces no packets. When
    /// `push` fails the remaining fragments are dropped and the error is
    /// returned as [`FrameError::TransportPushFailed`]; an announcement
    /// riding on that frame is re-inlined with the next one.
    pub fn payload_with<F>(&mut self, frame: &LogicalFrame, mut push: F) -> Result<usize>
    where
        F: FnMut(TransportPacket) -> std::result::Result<(), TransportError>,
    {
        if let Some(descriptor) = &frame.descriptor {
            self.set_descriptor(descriptor.clone());
        }

        self.buf.clear();
        let caps = self.pending_caps.take();
        if let Some(descriptor) = &caps {
            encode_varint(descriptor.len() + 1, &mut self.buf);
            self.buf.put_slice(descriptor.as_str().as_bytes());
            self.buf.put_u8(0);
        }

        let mut event_type = 0;
        if let Some(event) = &frame.event {
            event_type = event.kind.to_wire();
            encode_varint(event.body.len(), &mut self.buf);
            self.buf.put_slice(event.body.as_bytes());
            if !frame.payload.is_empty() {
                debug!(
                    dropped = frame.payload.len(),
                    "frame carries an event, payload not sent"
                );
            }
        } else {
            self.buf.put_slice(&frame.payload);
        }

        let total = self.buf.len();
        if total == 0 {
            trace!("empty frame, nothing to send");
            return Ok(0);
        }
        if u32::try_from(total).is_err() {
            self.pending_caps = caps;
            return Err(FrameError::FrameTooLarge {
                size: total,
                max: u32::MAX as usize,
            });
        }

        let header = PacketHeader {
            caps_inline: caps.is_some(),
            version: self.current_version,
            flags: frame.flags,
            event_type,
            offset: 0,
        };
        let data = self.buf.split().freeze();
        let chunk_size = self.mtu - HEADER_SIZE;

        let mut offset = 0usize;
        let mut sent = 0usize;
        while offset < total {
            let end = total.min(offset + chunk_size);
            let packet = TransportPacket {
                header: PacketHeader {
                    offset: offset as u32,
                    ..header
                },
                marker: end == total,
                discont: false,
                timestamp: frame.timestamp,
                payload: data.slice(offset..end),
            };

            debug!(
                offset,
                len = end - offset,
                marker = packet.marker,
                "new packet"
            );

            if let Err(source) = push(packet) {
                debug!(sent, error = %source, "push failed, dropping remaining fragments");
                self.pending_caps = caps;
                return Err(FrameError::TransportPushFailed { sent, source });
            }

            sent += 1;
            offset = end;
        }

        Ok(sent)
    }

    /// Fragment one frame into a packet list.
    pub fn encode(&mut self, frame: &LogicalFrame) -> Result<Vec<TransportPacket>> {
        let mut packets = Vec::new();
        self.payload_with(frame, |packet| {
            packets.push(packet);
            Ok(())
        })?;
        Ok(packets)
    }

    /// Maximum packet size, header included.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Largest fragment carried by one packet.
    pub fn max_fragment(&self) -> usize {
        self.mtu - HEADER_SIZE
    }

    /// Version stamped on the next frame.
    pub fn current_version(&self) -> FormatVersion {
        self.current_version
    }

    /// Sender-side view of the version cache.
    pub fn cache(&self) -> &FormatCache {
        &self.cache
    }
}

impl std::fmt::Debug for Payloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payloader")
            .field("mtu", &self.mtu)
            .field("current_version", &self.current_version)
            .field("pending_caps", &self.pending_caps.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, TypedEvent};
    use crate::header::FrameFlags;
    use crate::varint::decode_varint;

    fn payloader(mtu: usize) -> Payloader {
        Payloader::new(PayloaderConfig {
            mtu,
            ..PayloaderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_mtu_without_room_for_payload() {
        let err = Payloader::new(PayloaderConfig {
            mtu: HEADER_SIZE,
            ..PayloaderConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, FrameError::MtuTooSmall { mtu: 8, header: 8 }));
        assert!(Payloader::new(PayloaderConfig {
            mtu: HEADER_SIZE + 1,
            ..PayloaderConfig::default()
        })
        .is_ok());
    }

    #[test]
    fn small_frame_fits_one_packet() {
        let mut pay = payloader(100);
        let packets = pay.encode(&LogicalFrame::new(vec![7u8; 10])).unwrap();

        assert_eq!(packets.len(), 1);
        assert!(packets[0].marker);
        assert_eq!(packets[0].header.offset, 0);
        assert!(!packets[0].header.caps_inline);
        assert_eq!(packets[0].payload.len(), 10);
    }

    #[test]
    fn large_frame_is_split_at_mtu() {
        let mut pay = payloader(100);
        let packets = pay.encode(&LogicalFrame::new(vec![1u8; 300])).unwrap();

        let offsets: Vec<u32> = packets.iter().map(|p| p.header.offset).collect();
        assert_eq!(offsets, vec![0, 92, 184, 276]);
        let markers: Vec<bool> = packets.iter().map(|p| p.marker).collect();
        assert_eq!(markers, vec![false, false, false, true]);
        assert_eq!(packets[3].payload.len(), 24);
    }

    #[test]
    fn first_descriptor_is_inlined_as_version_one() {
        let mut pay = payloader(1400);
        let descriptor = "x".repeat(20);
        let frame = LogicalFrame::new(&b"payload"[..]).with_descriptor(descriptor.as_str());
        let packets = pay.encode(&frame).unwrap();

        assert_eq!(packets.len(), 1);
        let header = packets[0].header;
        assert!(header.caps_inline);
        assert_eq!(header.version.get(), 1);

        let body = packets[0].payload.as_ref();
        assert_eq!(body[0], 21);
        assert_eq!(&body[1..21], descriptor.as_bytes());
        assert_eq!(body[21], 0);
        assert_eq!(&body[22..], b"payload");
    }

    #[test]
    fn unchanged_descriptor_is_not_reinlined() {
        let mut pay = payloader(1400);
        let first = LogicalFrame::new(&b"a"[..]).with_descriptor("fmt-a");
        pay.encode(&first).unwrap();

        let packets = pay.encode(&first).unwrap();
        assert!(!packets[0].header.caps_inline);
        assert_eq!(packets[0].header.version.get(), 1);
        assert_eq!(packets[0].payload.as_ref(), b"a");
    }

    #[test]
    fn initial_descriptor_uses_version_zero() {
        let mut pay = Payloader::new(PayloaderConfig {
            mtu: 1400,
            initial_descriptor: Some("session-fmt".into()),
        })
        .unwrap();

        let packets = pay
            .encode(&LogicalFrame::new(&b"a"[..]).with_descriptor("session-fmt"))
            .unwrap();
        assert!(!packets[0].header.caps_inline);
        assert_eq!(packets[0].header.version.get(), 0);
        assert_eq!(pay.cache().lookup(FormatVersion::OUT_OF_BAND).unwrap().as_str(), "session-fmt");
    }

    #[test]
    fn versions_rotate_and_skip_zero() {
        let mut pay = payloader(1400);
        let mut versions = Vec::new();
        for i in 0..9 {
            let frame = LogicalFrame::new(&b"p"[..]).with_descriptor(format!("fmt-{i}"));
            versions.push(pay.encode(&frame).unwrap()[0].header.version.get());
        }
        assert_eq!(versions, vec![1, 2, 3, 4, 5, 6, 7, 1, 2]);
    }

    #[test]
    fn flags_do_not_leak_into_next_frame() {
        let mut pay = payloader(1400);
        let flagged = LogicalFrame::new(&b"a"[..]).with_flags(FrameFlags::DELTA_UNIT | FrameFlags::MEDIA2);
        let packets = pay.encode(&flagged).unwrap();
        assert_eq!(packets[0].header.flags, FrameFlags::DELTA_UNIT | FrameFlags::MEDIA2);

        let plain = pay.encode(&LogicalFrame::new(&b"b"[..])).unwrap();
        assert!(plain[0].header.flags.is_empty());
    }

    #[test]
    fn event_replaces_payload() {
        let mut pay = payloader(1400);
        let mut frame = LogicalFrame::event(TypedEvent::new(EventKind::Tag, "taglist, artist=x"));
        frame.payload = bytes::Bytes::from_static(b"ignored");
        let packets = pay.encode(&frame).unwrap();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].header.event_type, EventKind::Tag.to_wire());
        let body = packets[0].payload.as_ref();
        let (len, prefix) = decode_varint(body).unwrap();
        assert_eq!(&body[prefix..prefix + len], b"taglist, artist=x");
        assert_eq!(body.len(), prefix + len);
    }

    #[test]
    fn empty_frame_sends_nothing() {
        let mut pay = payloader(1400);
        assert!(pay.encode(&LogicalFrame::default()).unwrap().is_empty());
    }

    #[test]
    fn descriptor_only_frame_sends_caps() {
        let mut pay = payloader(1400);
        let packets = pay
            .encode(&LogicalFrame::default().with_descriptor("fmt"))
            .unwrap();
        assert_eq!(packets.len(), 1);
        assert!(packets[0].header.caps_inline);
    }

    #[test]
    fn timestamp_copied_to_every_packet() {
        let mut pay = payloader(20);
        let frame = LogicalFrame::new(vec![0u8; 50]).with_timestamp(1234);
        let packets = pay.encode(&frame).unwrap();
        assert!(packets.len() > 1);
        assert!(packets.iter().all(|p| p.timestamp == 1234));
    }

    #[test]
    fn push_failure_aborts_and_rearms_caps() {
        let mut pay = payloader(20);
        let frame = LogicalFrame::new(vec![0u8; 50]).with_descriptor("fmt");

        let mut pushed = 0;
        let err = pay
            .payload_with(&frame, |_| {
                if pushed == 1 {
                    return Err(TransportError::Closed);
                }
                pushed += 1;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::TransportPushFailed {
                sent: 1,
                source: TransportError::Closed
            }
        ));

        let retry = pay.encode(&LogicalFrame::new(&b"next"[..])).unwrap();
        assert!(retry[0].header.caps_inline);
        assert_eq!(retry[0].header.version.get(), 1);
    }
}
