use fragline_transport::DatagramSource;
use serde::Serialize;
use tracing::warn;

use crate::depayloader::{Depayloader, DepayloaderConfig};
use crate::error::{FrameError, Result};
use crate::frame::Reassembled;

/// Counters kept by a [`FrameReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReassemblyStats {
    /// Datagrams received from the source.
    pub packets: u64,
    /// Frames delivered.
    pub frames: u64,
    /// Events delivered.
    pub events: u64,
    /// Sequence gaps reported by the transport.
    pub discontinuities: u64,
    pub fragment_mismatches: u64,
    pub missing_versions: u64,
    /// Datagrams or frames that failed to parse.
    pub malformed: u64,
    pub oversized: u64,
}

impl ReassemblyStats {
    /// Frames lost to reassembly errors.
    pub fn dropped(&self) -> u64 {
        self.fragment_mismatches + self.missing_versions + self.malformed + self.oversized
    }

    fn record(&mut self, err: &FrameError) {
        match err {
            FrameError::FragmentMismatch { .. } => self.fragment_mismatches += 1,
            FrameError::MissingFormatVersion(_) => self.missing_versions += 1,
            FrameError::FrameTooLarge { .. } => self.oversized += 1,
            _ => self.malformed += 1,
        }
    }
}

/// Reads reassembled frames and events from any [`DatagramSource`].
///
/// Recoverable reassembly errors are logged, counted and skipped; callers
/// only see complete frames, events, or a transport failure.
pub struct FrameReader<S> {
    inner: S,
    depayloader: Depayloader,
    stats: ReassemblyStats,
}

impl<S: DatagramSource> FrameReader<S> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, DepayloaderConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: S, config: DepayloaderConfig) -> Self {
        Self {
            inner,
            depayloader: Depayloader::new(config),
            stats: ReassemblyStats::default(),
        }
    }

    /// Read the next frame or event (blocking).
    ///
    /// Transport errors, including read timeouts, are returned as
    /// [`FrameError::Transport`]. A partial frame survives a timeout.
    pub fn read(&mut self) -> Result<Reassembled> {
        loop {
            let datagram = match self.inner.recv_datagram() {
                Ok(datagram) => datagram,
                Err(err) if err.is_malformed() => {
                    warn!(error = %err, "skipping malformed datagram");
                    self.stats.malformed += 1;
                    self.depayloader.on_discontinuity();
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if datagram.discont && self.stats.packets > 0 {
                self.stats.discontinuities += 1;
            }
            self.stats.packets += 1;

            match self.depayloader.on_datagram(datagram) {
                Ok(Some(out)) => {
                    match &out {
                        Reassembled::Frame(_) => self.stats.frames += 1,
                        Reassembled::Event(_) => self.stats.events += 1,
                    }
                    return Ok(out);
                }
                Ok(None) => {}
                Err(err) if err.is_recoverable() => self.stats.record(&err),
                Err(err) => return Err(err),
            }
        }
    }

    /// Counters since creation or the last [`FrameReader::reset`].
    pub fn stats(&self) -> &ReassemblyStats {
        &self.stats
    }

    /// Forget partial frames, inlined formats and counters.
    pub fn reset(&mut self) {
        self.depayloader.reset();
        self.stats = ReassemblyStats::default();
    }

    /// Borrow the depayloader.
    pub fn depayloader(&self) -> &Depayloader {
        &self.depayloader
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use fragline_transport::{loopback, TransportError};

    use super::*;
    use crate::event::{EventKind, TypedEvent};
    use crate::frame::LogicalFrame;
    use crate::payloader::PayloaderConfig;
    use crate::writer::FrameWriter;

    fn pair(mtu: usize) -> (FrameWriter<fragline_transport::LoopbackSink>, FrameReader<fragline_transport::LoopbackSource>) {
        let (sink, source) = loopback();
        let writer = FrameWriter::with_config(
            sink,
            PayloaderConfig {
                mtu,
                initial_descriptor: Some("session".into()),
            },
        )
        .unwrap();
        let reader = FrameReader::with_config(
            source,
            DepayloaderConfig {
                initial_descriptor: Some("session".into()),
                ..DepayloaderConfig::default()
            },
        );
        (writer, reader)
    }

    fn would_block(err: &FrameError) -> bool {
        matches!(err, FrameError::Transport(TransportError::Io(io)) if io.kind() == ErrorKind::WouldBlock)
    }

    #[test]
    fn reads_frames_and_events_in_order() {
        let (mut writer, mut reader) = pair(64);
        writer.write_frame(&LogicalFrame::new(vec![1u8; 200])).unwrap();
        writer
            .write_frame(&LogicalFrame::event(TypedEvent::new(EventKind::Tag, "title=x")))
            .unwrap();

        let frame = reader.read().unwrap().into_frame().unwrap();
        assert_eq!(frame.payload.len(), 200);
        assert_eq!(frame.descriptor.as_str(), "session");
        let event = reader.read().unwrap().into_event().unwrap();
        assert_eq!(event.body, "title=x");

        assert!(would_block(&reader.read().unwrap_err()));
        let stats = reader.stats();
        assert_eq!((stats.frames, stats.events), (1, 1));
        assert_eq!(stats.packets, 5);
    }

    #[test]
    fn lost_fragment_drops_only_that_frame() {
        let (mut writer, mut reader) = pair(40);
        // Frame one is 100 bytes: four datagrams, sequences 0..=3.
        writer.get_mut().drop_sequences([1]);
        writer.write_frame(&LogicalFrame::new(vec![1u8; 100])).unwrap();
        writer.write_frame(&LogicalFrame::new(&b"second"[..])).unwrap();

        let frame = reader.read().unwrap().into_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"second");
        let stats = reader.stats();
        assert_eq!(stats.discontinuities, 1);
        assert_eq!(stats.fragment_mismatches, 2);
        assert_eq!(stats.dropped(), 2);
    }

    #[test]
    fn closed_source_is_reported() {
        let (writer, mut reader) = pair(64);
        drop(writer);
        assert!(matches!(
            reader.read(),
            Err(FrameError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn reset_clears_counters() {
        let (mut writer, mut reader) = pair(64);
        writer.write_frame(&LogicalFrame::new(&b"a"[..])).unwrap();
        reader.read().unwrap();
        reader.reset();
        assert_eq!(*reader.stats(), ReassemblyStats::default());
    }
}
