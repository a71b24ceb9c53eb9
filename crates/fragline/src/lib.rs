//! Fragmentation and reassembly of self-describing media frames.
//!
//! fragline splits logical frames (payload plus optional format descriptor
//! or event) into MTU-bounded packets and rebuilds them on the receiving
//! side, inlining format descriptors only when they change.
//!
//! # Crate Structure
//!
//! - [`transport`]: Datagram carrier (UDP, in-memory loopback)
//! - [`frame`]: Payloader, depayloader, packet header and session setup

/// Re-export transport types.
pub mod transport {
    pub use fragline_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fragline_frame::*;
}
