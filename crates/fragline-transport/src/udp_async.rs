use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::carrier::{
    decode_datagram, encode_datagram, CarrierHeader, Datagram, SequenceTracker,
};
use crate::error::{Result, TransportError};
use crate::udp::UdpConfig;

/// Async counterpart of [`crate::UdpTransport`], backed by tokio.
pub struct AsyncUdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    config: UdpConfig,
    next_sequence: u16,
    tracker: SequenceTracker,
    send_buf: BytesMut,
    recv_buf: Vec<u8>,
}

impl AsyncUdpTransport {
    /// Bind a receiving endpoint.
    pub async fn bind(addr: SocketAddr, config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TransportError::Bind { addr, source: e })?;
        let local = socket.local_addr()?;
        info!(%local, "listening on udp socket (async)");
        Ok(Self::from_socket(socket, None, config))
    }

    /// Bind to `local` and connect to `peer` for sending.
    pub async fn connect(local: SocketAddr, peer: SocketAddr, config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(local).await.map_err(|e| TransportError::Bind {
            addr: local,
            source: e,
        })?;
        socket
            .connect(peer)
            .await
            .map_err(|e| TransportError::Connect {
                addr: peer,
                source: e,
            })?;
        debug!(%peer, "connected udp socket (async)");
        Ok(Self::from_socket(socket, Some(peer), config))
    }

    fn from_socket(socket: UdpSocket, peer: Option<SocketAddr>, config: UdpConfig) -> Self {
        Self {
            socket,
            peer,
            next_sequence: 0,
            tracker: SequenceTracker::new(),
            send_buf: BytesMut::with_capacity(config.max_datagram_size),
            recv_buf: vec![0u8; config.max_datagram_size + 1],
            config,
        }
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    /// Push one datagram towards the connected peer.
    pub async fn send_datagram(&mut self, datagram: &Datagram) -> Result<()> {
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
        self.socket.send(&self.send_buf).await?;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Ok(())
    }

    /// Pull the next datagram.
    pub async fn recv_datagram(&mut self) -> Result<Datagram> {
        let read = loop {
            let (n, from) = self.socket.recv_from(&mut self.recv_buf).await?;
            if self.peer.is_some_and(|peer| peer != from) {
                continue;
            }
            break n;
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
        Ok(Datagram {
            marker: header.marker,
            timestamp: header.timestamp,
            discont,
            payload,
        })
    }
}
