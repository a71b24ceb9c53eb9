//! In-memory datagram transport.
//!
//! Datagrams go through the real carrier encoding so sequence tracking and
//! marker handling behave exactly as on a socket. Loss and push failures can
//! be injected for testing.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::carrier::{
    decode_datagram, encode_datagram, CarrierHeader, Datagram, SequenceTracker,
    DEFAULT_PAYLOAD_TYPE,
};
use crate::error::{Result, TransportError};
use crate::traits::{DatagramSink, DatagramSource};

/// Create a connected sink/source pair.
pub fn loopback() -> (LoopbackSink, LoopbackSource) {
    let (tx, rx) = mpsc::channel();
    let sink = LoopbackSink {
        tx,
        next_sequence: 0,
        dropped: HashSet::new(),
        fail_after: None,
        sent: 0,
    };
    let source = LoopbackSource {
        rx,
        tracker: SequenceTracker::new(),
    };
    (sink, source)
}

/// Sending half of a loopback pair.
pub struct LoopbackSink {
    tx: Sender<Bytes>,
    next_sequence: u16,
    dropped: HashSet<u16>,
    fail_after: Option<usize>,
    sent: usize,
}

impl LoopbackSink {
    /// Silently discard the datagrams carrying these sequence numbers.
    ///
    /// Sequence numbers start at 0 and advance by one per send attempt.
    pub fn drop_sequences(&mut self, sequences: impl IntoIterator<Item = u16>) {
        self.dropped.extend(sequences);
    }

    /// Fail every send after `count` successful ones with a broken pipe.
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(count);
    }

    /// Number of datagrams accepted so far (including dropped ones).
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl DatagramSink for LoopbackSink {
    fn send_datagram(&mut self, datagram: &Datagram) -> Result<()> {
        if self.fail_after.is_some_and(|limit| self.sent >= limit) {
            return Err(TransportError::Io(std::io::Error::from(
                ErrorKind::BrokenPipe,
            )));
        }

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.sent += 1;

        if self.dropped.contains(&sequence) {
            debug!(sequence, "loopback dropping datagram");
            return Ok(());
        }

        let header = CarrierHeader {
            marker: datagram.marker,
            payload_type: DEFAULT_PAYLOAD_TYPE,
            sequence,
            timestamp: datagram.timestamp,
            stream_id: 0,
        };
        let mut buf = BytesMut::with_capacity(datagram.wire_size());
        encode_datagram(&header, &datagram.payload, &mut buf);
        self.tx
            .send(buf.freeze())
            .map_err(|_| TransportError::Closed)
    }
}

/// Receiving half of a loopback pair.
pub struct LoopbackSource {
    rx: Receiver<Bytes>,
    tracker: SequenceTracker,
}

impl DatagramSource for LoopbackSource {
    /// Returns `Io(WouldBlock)` when nothing is queued and `Closed` once the
    /// sink is gone and the queue is drained.
    fn recv_datagram(&mut self) -> Result<Datagram> {
        let raw = match self.rx.try_recv() {
            Ok(raw) => raw,
            Err(TryRecvError::Empty) => {
                return Err(TransportError::Io(std::io::Error::from(
                    ErrorKind::WouldBlock,
                )))
            }
            Err(TryRecvError::Disconnected) => return Err(TransportError::Closed),
        };

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
