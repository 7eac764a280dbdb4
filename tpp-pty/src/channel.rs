//! The byte channel contract shared by PTY master and slave
//!
//! Both ends of a pseudoterminal move raw bytes; the framed-send helpers in
//! [`ChannelExt`] put t++ sequences on the same wire. Receivers take
//! `&self` so one thread can block in `receive` while another sends.
//! Concurrent `send` calls on the same channel must be serialised by the
//! caller: interleaving the frames of two sequences corrupts the protocol.

use tpp_protocol::{emit, Encode, Response, Sequence};

use crate::error::Result;

/// A bidirectional byte channel
pub trait Channel {
    /// Write all bytes or fail. Partial writes are not exposed; a failure
    /// leaves the channel terminated.
    fn send(&self, bytes: &[u8]) -> Result<()>;

    /// Block until at least one byte is available and return the count.
    /// Returns `0` immediately once the channel is terminated.
    fn receive(&self, buf: &mut [u8]) -> Result<usize>;
}

/// Framed-send conveniences, available on every [`Channel`]
pub trait ChannelExt: Channel {
    /// Wrap `sequence` in the outer t++ framing and send it.
    fn send_sequence(&self, sequence: &Sequence) -> Result<()> {
        self.send(&emit(sequence))
    }

    /// Send whichever alternative the response holds.
    fn send_response<T: Encode>(&self, response: &Response<T>) -> Result<()> {
        self.send(&emit(response))
    }
}

impl<C: Channel + ?Sized> ChannelExt for C {}
