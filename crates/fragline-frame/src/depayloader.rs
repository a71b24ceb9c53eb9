use bytes::{Bytes, BytesMut};
use fragline_transport::Datagram;
use tracing::{debug, trace, warn};

use crate::cache::{FormatCache, FormatDescriptor, FormatVersion};
use crate::error::{FrameError, Result};
use crate::event::TypedEvent;
use crate::frame::{Reassembled, ReassembledFrame};
use crate::header::{PacketHeader, TransportPacket};
use crate::varint::read_prefixed;

/// Default bound on a frame being reassembled: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Configuration for a [`Depayloader`].
#[derive(Debug, Clone)]
pub struct DepayloaderConfig {
    /// Descriptor agreed at session setup (version 0), if any.
    pub initial_descriptor: Option<FormatDescriptor>,
    /// Largest frame accepted; a frame growing past it is discarded.
    pub max_frame_size: usize,
}

impl Default for DepayloaderConfig {
    fn default() -> Self {
        Self {
            initial_descriptor: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Rebuilds frames and events from transport packets.
///
/// Packets are consumed in arrival order. Fragments accumulate until a
/// packet with the marker set completes the frame. Any error discards
/// only the frame in progress; the depayloader is ready for the next
/// offset-0 fragment straight away.
pub struct Depayloader {
    config: DepayloaderConfig,
    buf: BytesMut,
    cache: FormatCache,
    active: Option<FormatVersion>,
}

impl Depayloader {
    pub fn new(config: DepayloaderConfig) -> Self {
        let mut depay = Self {
            config,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            cache: FormatCache::new(),
            active: None,
        };
        depay.seed_session();
        depay
    }

    fn seed_session(&mut self) {
        if let Some(descriptor) = &self.config.initial_descriptor {
            self.cache
                .store(FormatVersion::OUT_OF_BAND, descriptor.clone());
            self.active = Some(FormatVersion::OUT_OF_BAND);
        }
    }

    /// Drop the frame in progress after a transport-level gap.
    pub fn on_discontinuity(&mut self) {
        if !self.buf.is_empty() {
            warn!(pending = self.buf.len(), "discontinuity, discarding partial frame");
        }
        self.buf.clear();
    }

    /// Return to the freshly-configured state: no partial frame, all
    /// inlined versions forgotten, only the session descriptor known.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.cache.clear();
        self.active = None;
        self.seed_session();
    }

    /// Feed one received datagram.
    pub fn on_datagram(&mut self, datagram: Datagram) -> Result<Option<Reassembled>> {
        if datagram.discont {
            self.on_discontinuity();
        }
        match TransportPacket::from_datagram(datagram) {
            Ok(packet) => self.on_packet(packet),
            Err(err) => {
                warn!(error = %err, "unparsable packet, discarding partial frame");
                self.buf.clear();
                Err(err)
            }
        }
    }

    /// Feed one packet.
    ///
    /// Returns `Ok(None)` while a frame is still accumulating or when a
    /// completed frame has nothing to deliver.
    pub fn on_packet(&mut self, packet: TransportPacket) -> Result<Option<Reassembled>> {
        if packet.discont {
            self.on_discontinuity();
        }

        if packet.payload.is_empty() {
            warn!("empty payload, skipping packet");
            return Ok(None);
        }

        let expected = self.buf.len();
        if packet.header.offset as usize != expected {
            self.buf.clear();
            debug!(
                expected,
                got = packet.header.offset,
                "wrong fragment, skipping"
            );
            return Err(FrameError::FragmentMismatch {
                expected: u32::try_from(expected).unwrap_or(u32::MAX),
                got: packet.header.offset,
            });
        }

        let size = expected + packet.payload.len();
        if size > self.config.max_frame_size {
            self.buf.clear();
            warn!(size, max = self.config.max_frame_size, "frame too large, discarding");
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.config.max_frame_size,
            });
        }

        self.buf.extend_from_slice(&packet.payload);
        trace!(offset = packet.header.offset, len = packet.payload.len(), "fragment accepted");

        if !packet.marker {
            return Ok(None);
        }

        let data = self.buf.split().freeze();
        self.complete(&packet.header, packet.timestamp, data)
    }

    fn complete(
        &mut self,
        header: &PacketHeader,
        timestamp: u32,
        data: Bytes,
    ) -> Result<Option<Reassembled>> {
        let version = header.version;
        let mut pos = 0;
        let mut slot_replaced = false;

        if header.caps_inline {
            let (field, consumed) = read_prefixed(&data).map_err(|err| {
                warn!(error = %err, "failed to parse inline format descriptor");
                FrameError::MalformedDescriptor(err.to_string())
            })?;
            let field = field.strip_suffix(b"\0").unwrap_or(field);
            let text = std::str::from_utf8(field).map_err(|err| {
                warn!(error = %err, "inline format descriptor is not utf-8");
                FrameError::MalformedDescriptor(format!("not utf-8: {err}"))
            })?;

            debug!(%version, len = consumed, "inline format descriptor");
            let descriptor = FormatDescriptor::from(text);
            let previous = self.cache.store(version, descriptor.clone());
            slot_replaced = previous.is_some_and(|prev| prev != descriptor);
            pos = consumed;
        }

        if let Some(kind) = header.event_kind().inspect_err(|err| {
            warn!(error = %err, "unknown event type");
        })? {
            let (field, _) = read_prefixed(&data[pos..]).map_err(|err| {
                warn!(error = %err, "failed to parse inline event");
                FrameError::MalformedEvent(err.to_string())
            })?;
            let event = TypedEvent::from_wire(kind, field)?;
            debug!(%kind, len = field.len(), "inline event");
            return Ok(Some(Reassembled::Event(event)));
        }

        let payload = data.slice(pos..);
        if payload.is_empty() {
            return Ok(None);
        }

        let Some(descriptor) = self.cache.lookup(version).cloned() else {
            warn!(%version, "missing format version");
            return Err(FrameError::MissingFormatVersion(version.get()));
        };

        let switched = self.active != Some(version);
        if switched {
            debug!(from = ?self.active.map(FormatVersion::get), to = %version, "format switch");
            self.active = Some(version);
        }

        Ok(Some(Reassembled::Frame(ReassembledFrame {
            payload,
            flags: header.flags,
            version,
            descriptor,
            format_changed: switched || slot_replaced,
            timestamp,
        })))
    }

    /// Version of the format currently applied to emitted frames.
    pub fn active_version(&self) -> Option<FormatVersion> {
        self.active
    }

    /// Descriptor of the active format.
    pub fn active_descriptor(&self) -> Option<&FormatDescriptor> {
        self.active.and_then(|version| self.cache.lookup(version))
    }

    /// Receiver-side view of the version cache.
    pub fn cache(&self) -> &FormatCache {
        &self.cache
    }

    /// Bytes accumulated for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Current depayloader configuration.
    pub fn config(&self) -> &DepayloaderConfig {
        &self.config
    }
}

impl Default for Depayloader {
    fn default() -> Self {
        Self::new(DepayloaderConfig::default())
    }
}

impl std::fmt::Debug for Depayloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Depayloader")
            .field("pending", &self.buf.len())
            .field("active", &self.active)
            .field("cached_versions", &self.cache.len())
            .finish()
    }
}
