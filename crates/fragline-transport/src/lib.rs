//! Datagram carrier for fragmented media frames.
//!
//! The fragmentation core assumes a transport that preserves packet
//! boundaries and can signal discontinuities. This crate provides it:
//! - A 12-byte carrier header (marker, sequence, timestamp, stream id)
//! - Discontinuity detection from sequence number gaps
//! - UDP endpoints (blocking, and async behind the `async` feature)
//! - An in-memory loopback with loss and failure injection
//!
//! Everything else builds on the [`DatagramSink`] and [`DatagramSource`]
//! traits provided here.

pub mod carrier;
pub mod error;
pub mod loopback;
pub mod traits;
pub mod udp;

#[cfg(feature = "async")]
pub mod udp_async;

pub use carrier::{
    decode_datagram, encode_datagram, CarrierHeader, Datagram, SequenceTracker,
    CARRIER_HEADER_SIZE, DEFAULT_CLOCK_RATE, DEFAULT_PAYLOAD_TYPE,
};
pub use error::{Result, TransportError};
pub use loopback::{loopback, LoopbackSink, LoopbackSource};
pub use traits::{DatagramSink, DatagramSource};
pub use udp::{UdpConfig, UdpTransport};

#[cfg(feature = "async")]
pub use udp_async::AsyncUdpTransport;
