use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::carrier::{
    decode_datagram, encode_datagram, CarrierHeader, Datagram, SequenceTracker,
    CARRIER_HEADER_SIZE, DEFAULT_PAYLOAD_TYPE,
};
use crate::error::{Result, TransportError};
use crate::traits::{DatagramSink, DatagramSource};

/// Largest datagram a UDP socket can carry.
pub const MAX_UDP_DATAGRAM: usize = 65_507;

/// Configuration for UDP endpoints.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Read timeout for blocking receives.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking sends.
    pub write_timeout: Option<Duration>,
    /// Maximum datagram size (carrier header included). Default: 65507.
    pub max_datagram_size: usize,
    /// Payload type stamped on outgoing datagrams.
    pub payload_type: u8,
    /// Stream id stamped on outgoing datagrams.
    pub stream_id: u32,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            write_timeout: None,
            max_datagram_size: MAX_UDP_DATAGRAM,
            payload_type: DEFAULT_PAYLOAD_TYPE,
            stream_id: 0,
        }
    }
}

/// UDP datagram transport.
///
/// A bound endpoint receives from anyone; a connected endpoint sends to (and
/// only receives from) its peer.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    config: UdpConfig,
    next_sequence: u16,
    tracker: SequenceTracker,
    send_buf: BytesMut,
    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind a receiving endpoint with default configuration.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_config(addr, UdpConfig::default())
    }

    /// Bind a receiving endpoint with explicit configuration.
    pub fn bind_with_config(addr: SocketAddr, config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|e| TransportError::Bind { addr, source: e })?;
        socket.set_read_timeout(config.read_timeout)?;
        socket.set_write_timeout(config.write_timeout)?;

        let local = socket.local_addr()?;
        info!(%local, "listening on udp socket");

        Ok(Self::from_socket(socket, None, config))
    }

    /// Bind to `local` and connect to `peer` for sending.
    pub fn connect(local: SocketAddr, peer: SocketAddr, config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|e| TransportError::Bind {
            addr: local,
            source: e,
        })?;
        socket
            .connect(peer)
            .map_err(|e| TransportError::Connect {
                addr: peer,
                source: e,
            })?;
        socket.set_read_timeout(config.read_timeout)?;
        socket.set_write_timeout(config.write_timeout)?;

        debug!(%peer, "connected udp socket");

        Ok(Self::from_socket(socket, Some(peer), config))
    }

    fn from_socket(socket: UdpSocket, peer: Option<SocketAddr>, config: UdpConfig) -> Self {
        let capacity = config.max_datagram_size.max(CARRIER_HEADER_SIZE);
        Self {
            socket,
            peer,
            next_sequence: 0,
            tracker: SequenceTracker::new(),
            send_buf: BytesMut::with_capacity(capacity),
            // One spare byte tells a full datagram from a cut-off one.
            recv_buf: vec![0u8; capacity + 1],
            config,
        }
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    /// Connected peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Current endpoint configuration.
    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// Forget sequence history, so the next datagram counts as a discontinuity.
    pub fn reset_sequence_tracking(&mut self) {
        self.tracker.reset();
    }
}

impl DatagramSink for UdpTransport {
    fn send_datagram(&mut self, datagram: &Datagram) -> Result<()> {
        let size = datagram.wire_size();
        if size > self.config.max_datagram_size {
            return Err(TransportError::DatagramTooLarge {
                size,
                max: self.config.max_datagram_size,
            });
        }

        let header = CarrierHeader {
            marker: datagram.marker,
            payload_type: self.config.payload_type,
            sequence: self.next_sequence,
            timestamp: datagram.timestamp,
            stream_id: self.config.stream_id,
        };
        self.send_buf.clear();
        encode_datagram(&header, &datagram.payload, &mut self.send_buf);

        loop {
            match self.socket.send(&self.send_buf) {
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        trace!(sequence = header.sequence, size, marker = header.marker, "sent datagram");
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Ok(())
    }
}

impl DatagramSource for UdpTransport {
    fn recv_datagram(&mut self) -> Result<Datagram> {
        let read = loop {
            match self.socket.recv_from(&mut self.recv_buf) {
                Ok((n, from)) => {
                    if self.peer.is_some_and(|peer| peer != from) {
                        debug!(%from, "ignoring datagram from unexpected sender");
                        continue;
                    }
                    break n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        };
        if read > self.config.max_datagram_size {
            warn!(max = self.config.max_datagram_size, "dropping oversized datagram");
            return Err(TransportError::DatagramTruncated {
                max: self.config.max_datagram_size,
            });
        }

        let raw = Bytes::copy_from_slice(&self.recv_buf[..read]);
        let (header, payload) = decode_datagram(raw)?;
        let discont = self.tracker.observe(header.sequence);
        if discont {
            debug!(sequence = header.sequence, "sequence discontinuity");
        }

        Ok(Datagram {
            marker: header.marker,
            timestamp: header.timestamp,
            discont,
            payload,
        })
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local", &self.socket.local_addr().ok())
            .field("peer", &self.peer)
            .finish()
    }
}
