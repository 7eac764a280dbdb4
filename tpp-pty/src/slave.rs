//! PTY slave: the child-process side of the channel
//!
//! A process running inside the terminal opens the slave over its standard
//! descriptors to talk t++ with the terminal that spawned it. Resize
//! notifications ride on SIGWINCH: the handler only flips a flag, a
//! watcher thread reads the new size and runs the subscribers.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::size::WindowSize;

type ResizeCallback = Box<dyn FnMut(u16, u16) + Send>;

static WINCH_SEEN: AtomicBool = AtomicBool::new(false);
static WINCH_INSTALL: Once = Once::new();

extern "C" fn on_sigwinch(_: libc::c_int) {
    WINCH_SEEN.store(true, Ordering::SeqCst);
}

/// The slave end of a pseudoterminal, bound to the calling process's
/// controlling terminal
pub struct PtySlave {
    subscribers: Arc<Mutex<Vec<ResizeCallback>>>,
    watcher_run: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl PtySlave {
    /// Open the slave side of the terminal the process is attached to.
    ///
    /// Fails with [`Error::NotATerminal`] when stdin is not a tty (for
    /// example under a plain pipe).
    pub fn open() -> Result<Self> {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
            return Err(Error::NotATerminal);
        }

        WINCH_INSTALL.call_once(|| {
            let action = SigAction::new(
                SigHandler::Handler(on_sigwinch),
                SaFlags::SA_RESTART,
                SigSet::empty(),
            );
            // failure leaves resize events undelivered; size() still works
            let _ = unsafe { sigaction(Signal::SIGWINCH, &action) };
        });

        let subscribers: Arc<Mutex<Vec<ResizeCallback>>> = Arc::new(Mutex::new(Vec::new()));
        let watcher_run = Arc::new(AtomicBool::new(true));
        let watcher = {
            let subscribers = Arc::clone(&subscribers);
            let run = Arc::clone(&watcher_run);
            thread::spawn(move || watch_resizes(&run, &subscribers))
        };

        Ok(Self {
            subscribers,
            watcher_run,
            watcher: Some(watcher),
        })
    }

    /// Current terminal dimensions as `(cols, rows)`
    pub fn size(&self) -> Result<(u16, u16)> {
        let size = WindowSize::from_fd(libc::STDIN_FILENO)?;
        Ok((size.cols, size.rows))
    }

    /// Subscribe to resize notifications.
    ///
    /// Callbacks receive `(cols, rows)` in the order resizes are observed.
    /// Delivery is best-effort and not ordered with respect to inbound
    /// bytes.
    pub fn on_resize<F>(&self, callback: F)
    where
        F: FnMut(u16, u16) + Send + 'static,
    {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(callback));
    }
}

fn watch_resizes(run: &AtomicBool, subscribers: &Mutex<Vec<ResizeCallback>>) {
    while run.load(Ordering::Acquire) {
        if WINCH_SEEN.swap(false, Ordering::SeqCst) {
            match WindowSize::from_fd(libc::STDIN_FILENO) {
                Ok(size) => {
                    let mut subscribers = subscribers
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    for callback in subscribers.iter_mut() {
                        callback(size.cols, size.rows);
                    }
                }
                Err(err) => tracing::debug!("window size read failed after SIGWINCH: {}", err),
            }
        }
        thread::sleep(Duration::from_millis(25));
    }
}

impl Channel for PtySlave {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let result = unsafe {
                libc::write(
                    libc::STDOUT_FILENO,
                    bytes[written..].as_ptr() as *const libc::c_void,
                    bytes.len() - written,
                )
            };
            if result < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }
            written += result as usize;
        }
        Ok(())
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let result = unsafe {
                libc::read(
                    libc::STDIN_FILENO,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if result >= 0 {
                return Ok(result as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
    }
}

impl Drop for PtySlave {
    fn drop(&mut self) {
        self.watcher_run.store(false, Ordering::Release);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}
