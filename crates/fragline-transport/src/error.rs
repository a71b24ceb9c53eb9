use std::net::SocketAddr;

/// Errors that can occur in datagram transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A received datagram is shorter than the carrier header.
    #[error("datagram too short ({len} bytes, min {min})")]
    DatagramTooShort { len: usize, min: usize },

    /// A received datagram carries an unknown carrier version.
    #[error("unsupported carrier version {0}")]
    UnsupportedVersion(u8),

    /// An outgoing datagram exceeds the configured maximum size.
    #[error("datagram too large ({size} bytes, max {max})")]
    DatagramTooLarge { size: usize, max: usize },

    /// A received datagram did not fit the receive buffer and was cut off.
    #[error("received datagram exceeds {max} bytes")]
    DatagramTruncated { max: usize },

    /// The other end of the transport has gone away.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// True when a single received datagram was unusable but the transport
    /// itself is still healthy.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            TransportError::DatagramTooShort { .. }
                | TransportError::UnsupportedVersion(_)
                | TransportError::DatagramTruncated { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
