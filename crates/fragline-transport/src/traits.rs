use crate::carrier::Datagram;
use crate::error::Result;

/// Outgoing half of a datagram transport.
///
/// Implementations preserve datagram boundaries: one call, one datagram on
/// the wire. Sequence numbering is the implementation's business.
pub trait DatagramSink {
    /// Push one datagram towards the peer (blocking).
    fn send_datagram(&mut self, datagram: &Datagram) -> Result<()>;
}

/// Incoming half of a datagram transport.
pub trait DatagramSource {
    /// Pull the next datagram (blocking).
    ///
    /// `Datagram::discont` is set when datagrams before this one may have
    /// been lost or reordered.
    fn recv_datagram(&mut self) -> Result<Datagram>;
}

impl<T: DatagramSink + ?Sized> DatagramSink for &mut T {
    fn send_datagram(&mut self, datagram: &Datagram) -> Result<()> {
        (**self).send_datagram(datagram)
    }
}

impl<T: DatagramSource + ?Sized> DatagramSource for &mut T {
    fn recv_datagram(&mut self) -> Result<Datagram> {
        (**self).recv_datagram()
    }
}
