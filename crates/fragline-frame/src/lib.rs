//! Fragmentation and reassembly of self-describing media frames.
//!
//! Every packet carries an 8-byte header:
//! - Byte 0: caps-inline bit, 3-bit format version, 4 media flag bits
//! - Byte 1: inline event type (0 for none)
//! - Bytes 2-3: reserved, zero
//! - Bytes 4-7: big-endian byte offset of the fragment within its frame
//!
//! Format descriptors are inlined only when they change and are then
//! referenced by a 3-bit version, so steady-state packets stay small.
//! Loss costs at most the frame in progress.

pub mod cache;
pub mod depayloader;
pub mod error;
pub mod event;
pub mod frame;
pub mod header;
pub mod payloader;
pub mod reader;
pub mod session;
pub mod varint;
pub mod writer;

pub use cache::{FormatCache, FormatDescriptor, FormatVersion, VERSION_SLOTS};
pub use depayloader::{Depayloader, DepayloaderConfig, DEFAULT_MAX_FRAME_SIZE};
pub use error::{FrameError, Result};
pub use event::{EventKind, TypedEvent};
pub use frame::{LogicalFrame, Reassembled, ReassembledFrame};
pub use header::{decode_header, encode_header, FrameFlags, PacketHeader, TransportPacket, HEADER_SIZE};
pub use payloader::{Payloader, PayloaderConfig, DEFAULT_MTU};
pub use reader::{FrameReader, ReassemblyStats};
pub use session::SessionDescription;
pub use varint::{decode_varint, encode_varint};
pub use writer::FrameWriter;
