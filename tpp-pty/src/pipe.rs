//! In-memory byte pipe implementing the channel contract
//!
//! A pair of cross-connected ends over mutex/condvar byte queues, so
//! protocol round-trips can be exercised without a kernel PTY. Dropping an
//! end terminates the peer: its `receive` drains what is buffered and then
//! returns `0`.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::channel::Channel;
use crate::error::Result;

#[derive(Default)]
struct Shared {
    state: Mutex<PipeState>,
    readable: Condvar,
}

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// One end of an in-memory byte pipe
pub struct PipeEnd {
    incoming: Arc<Shared>,
    outgoing: Arc<Shared>,
}

/// Create a connected pair of pipe ends.
pub fn pair() -> (PipeEnd, PipeEnd) {
    let a = Arc::new(Shared::default());
    let b = Arc::new(Shared::default());
    (
        PipeEnd {
            incoming: Arc::clone(&a),
            outgoing: Arc::clone(&b),
        },
        PipeEnd {
            incoming: b,
            outgoing: a,
        },
    )
}

impl Channel for PipeEnd {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.outgoing.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed").into());
        }
        state.buf.extend(bytes.iter().copied());
        drop(state);
        self.outgoing.readable.notify_all();
        Ok(())
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.incoming.lock();
        while state.buf.is_empty() && !state.closed {
            state = match self.incoming.readable.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        let n = buf.len().min(state.buf.len());
        for (slot, byte) in buf.iter_mut().zip(state.buf.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Drop for PipeEnd {
    fn drop(&mut self) {
        for shared in [&self.incoming, &self.outgoing] {
            shared.lock().closed = true;
            shared.readable.notify_all();
        }
    }
}
