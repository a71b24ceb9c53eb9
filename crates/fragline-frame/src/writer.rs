use fragline_transport::DatagramSink;

use crate::cache::{FormatDescriptor, FormatVersion};
use crate::error::Result;
use crate::frame::LogicalFrame;
use crate::payloader::{Payloader, PayloaderConfig};

/// Fragments logical frames onto any [`DatagramSink`].
pub struct FrameWriter<S> {
    inner: S,
    payloader: Payloader,
}

impl<S: DatagramSink> FrameWriter<S> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: S) -> Result<Self> {
        Self::with_config(inner, PayloaderConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: S, config: PayloaderConfig) -> Result<Self> {
        Ok(Self {
            inner,
            payloader: Payloader::new(config)?,
        })
    }

    /// Send one frame (blocking). Returns the number of datagrams sent.
    pub fn write_frame(&mut self, frame: &LogicalFrame) -> Result<usize> {
        let inner = &mut self.inner;
        self.payloader
            .payload_with(frame, |packet| inner.send_datagram(&packet.to_datagram()))
    }

    /// Announce a format ahead of the next frame.
    pub fn set_descriptor(&mut self, descriptor: impl Into<FormatDescriptor>) -> FormatVersion {
        self.payloader.set_descriptor(descriptor.into())
    }

    /// Borrow the payloader.
    pub fn payloader(&self) -> &Payloader {
        &self.payloader
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}
