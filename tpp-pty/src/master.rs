//! PTY master: spawns a child on the slave side and owns its lifecycle
//!
//! The master is built for the two-thread model: one thread blocks in
//! `receive` feeding the demultiplexer, another writes via `send`. All I/O
//! goes through the raw master descriptor, so both take `&self`.
//! Termination state is written once by whichever call observes the child
//! exit and is readable from any thread.

use std::ffi::{CString, OsStr};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use nix::pty::openpty;
use nix::sys::signal::{kill, Signal};
use nix::sys::termios::{self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{dup2, execvp, fork, setsid, ForkResult, Pid};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::size::WindowSize;

/// A pseudoterminal master with the child process attached to its slave
pub struct PtyMaster {
    master: OwnedFd,
    child: Pid,
    terminated: AtomicBool,
    exit_code: AtomicI32,
    // serialises the waitpid so the exit code is written exactly once
    reap: Mutex<()>,
}

impl PtyMaster {
    /// Spawn `program` on the slave side of a fresh pseudoterminal.
    ///
    /// # Arguments
    /// * `program` - the program to execute
    /// * `args` - arguments, not including the program name
    /// * `env` - replacement environment; `None` inherits the parent's
    /// * `size` - initial window size
    pub fn spawn<S, I, E, K, V>(
        program: S,
        args: I,
        env: Option<E>,
        size: WindowSize,
    ) -> Result<Self>
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        let ws = size.to_winsize();
        let pty = openpty(Some(&ws), None).map_err(|e| Error::PtyCreation(e.to_string()))?;
        let master = pty.master;
        let slave = pty.slave;

        let program_cstr = CString::new(program.as_ref().as_bytes())
            .map_err(|e| Error::SpawnFailed(e.to_string()))?;

        let mut args_cstr: Vec<CString> = vec![program_cstr.clone()];
        for arg in args {
            let arg_cstr = CString::new(arg.as_ref().as_bytes())
                .map_err(|e| Error::SpawnFailed(e.to_string()))?;
            args_cstr.push(arg_cstr);
        }

        let env_cstr: Option<Vec<CString>> = env.map(|e| {
            e.into_iter()
                .filter_map(|(k, v)| {
                    let key = k.as_ref().as_bytes();
                    let value = v.as_ref().as_bytes();
                    let mut combined = Vec::with_capacity(key.len() + 1 + value.len());
                    combined.extend_from_slice(key);
                    combined.push(b'=');
                    combined.extend_from_slice(value);
                    CString::new(combined).ok()
                })
                .collect()
        });

        match unsafe { fork() }? {
            ForkResult::Parent { child } => {
                drop(slave);
                Ok(Self {
                    master,
                    child,
                    terminated: AtomicBool::new(false),
                    exit_code: AtomicI32::new(0),
                    reap: Mutex::new(()),
                })
            }
            ForkResult::Child => {
                // child side: only async-signal-safe work until execvp
                drop(master);

                if setsid().is_err() {
                    std::process::exit(1);
                }

                // become the controlling terminal
                unsafe {
                    if libc::ioctl(slave.as_raw_fd(), libc::TIOCSCTTY as libc::c_ulong, 0) < 0 {
                        std::process::exit(1);
                    }
                }

                if configure_slave(&slave).is_err() {
                    std::process::exit(1);
                }

                if dup2(slave.as_raw_fd(), libc::STDIN_FILENO).is_err() {
                    std::process::exit(1);
                }
                if dup2(slave.as_raw_fd(), libc::STDOUT_FILENO).is_err() {
                    std::process::exit(1);
                }
                if dup2(slave.as_raw_fd(), libc::STDERR_FILENO).is_err() {
                    std::process::exit(1);
                }
                if slave.as_raw_fd() > 2 {
                    drop(slave);
                }

                if let Some(env_vars) = env_cstr {
                    #[cfg(target_os = "linux")]
                    unsafe {
                        libc::clearenv();
                    }
                    #[cfg(not(target_os = "linux"))]
                    for (key, _) in std::env::vars_os() {
                        std::env::remove_var(&key);
                    }
                    for var in env_vars {
                        unsafe {
                            libc::putenv(var.into_raw());
                        }
                    }
                }

                let _ = execvp(&program_cstr, &args_cstr);
                std::process::exit(127);
            }
        }
    }

    /// Request child exit. Idempotent; a child that is already gone is not
    /// an error.
    pub fn terminate(&self) {
        if self.terminated() {
            return;
        }
        let _ = kill(self.child, Signal::SIGHUP);
    }

    /// Whether the child has exited
    pub fn terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Exit code of the terminated child.
    ///
    /// A child killed by a signal reports `128 + signo`. Fails with
    /// [`Error::NotTerminated`] while the child is still running.
    pub fn exit_code(&self) -> Result<i32> {
        if self.terminated() {
            Ok(self.exit_code.load(Ordering::Acquire))
        } else {
            Err(Error::NotTerminated)
        }
    }

    /// Block until the child exits and return its exit code.
    pub fn wait(&self) -> Result<i32> {
        self.reap();
        self.exit_code()
    }

    /// Update the terminal dimensions and notify the child (SIGWINCH).
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let ws = WindowSize::new(cols, rows).to_winsize();
        let result = unsafe {
            libc::ioctl(
                self.master.as_raw_fd(),
                libc::TIOCSWINSZ as libc::c_ulong,
                &ws,
            )
        };
        if result == -1 {
            return Err(Error::WindowSize(io::Error::last_os_error().to_string()));
        }
        let _ = kill(self.child, Signal::SIGWINCH);
        Ok(())
    }

    /// Current window size read back from the master
    pub fn window_size(&self) -> Result<WindowSize> {
        WindowSize::from_fd(self.master.as_raw_fd())
    }

    /// Child process id
    pub fn child_pid(&self) -> i32 {
        self.child.as_raw()
    }

    /// Raw master descriptor, for callers that poll
    pub fn as_raw_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Reap the child and freeze the exit code. Blocks until the child is
    /// gone; a no-op once terminated.
    fn reap(&self) {
        let _guard = match self.reap.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        let code = match waitpid(self.child, None) {
            Ok(WaitStatus::Exited(_, code)) => code,
            Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
            Ok(_) => 0,
            // ECHILD: reaped elsewhere, exit code lost
            Err(_) => 0,
        };
        self.exit_code.store(code, Ordering::Release);
        self.terminated.store(true, Ordering::Release);
        tracing::debug!("child {} terminated with exit code {}", self.child, code);
    }
}

impl Channel for PtyMaster {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        let fd = self.master.as_raw_fd();
        let mut written = 0;
        while written < bytes.len() {
            let result = unsafe {
                libc::write(
                    fd,
                    bytes[written..].as_ptr() as *const libc::c_void,
                    bytes.len() - written,
                )
            };
            if result < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                self.reap();
                return Err(err.into());
            }
            written += result as usize;
        }
        Ok(())
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.terminated() {
            return Ok(0);
        }
        let fd = self.master.as_raw_fd();
        loop {
            let result =
                unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if result > 0 {
                return Ok(result as usize);
            }
            if result == 0 {
                self.reap();
                return Ok(0);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                // Linux masters raise EIO once the slave side is gone
                Some(libc::EIO) => {
                    self.reap();
                    return Ok(0);
                }
                _ => {
                    self.reap();
                    return Err(err.into());
                }
            }
        }
    }
}

impl Drop for PtyMaster {
    fn drop(&mut self) {
        if !self.terminated() {
            let _ = kill(self.child, Signal::SIGHUP);
            let _ = waitpid(self.child, Some(WaitPidFlag::WNOHANG));
        }
    }
}

/// Raw line discipline for the slave: 8-bit clean input with no echo, no
/// flow control and no signal bytes, so control bytes inside t++ frames
/// pass through untouched. Output post-processing stays on for `\n`.
fn configure_slave(slave: &OwnedFd) -> Result<()> {
    let mut t = termios::tcgetattr(slave)?;
    t.input_flags &= !(InputFlags::IGNBRK
        | InputFlags::BRKINT
        | InputFlags::PARMRK
        | InputFlags::ISTRIP
        | InputFlags::INLCR
        | InputFlags::IGNCR
        | InputFlags::ICRNL
        | InputFlags::IXON);
    t.output_flags |= OutputFlags::OPOST | OutputFlags::ONLCR;
    t.local_flags &= !(LocalFlags::ECHO
        | LocalFlags::ECHONL
        | LocalFlags::ICANON
        | LocalFlags::ISIG
        | LocalFlags::IEXTEN);
    t.control_flags &= !(ControlFlags::CSIZE | ControlFlags::PARENB);
    t.control_flags |= ControlFlags::CS8;
    t.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 1;
    t.control_chars[termios::SpecialCharacterIndices::VTIME as usize] = 0;
    termios::tcsetattr(slave, SetArg::TCSANOW, &t)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failure_on_bad_program() {
        // execvp fails in the child, which exits 127
        let master = PtyMaster::spawn(
            "/nonexistent/program",
            Vec::<&str>::new(),
            None::<Vec<(String, String)>>,
            WindowSize::default(),
        )
        .unwrap();
        assert_eq!(master.wait().unwrap(), 127);
    }

    #[test]
    fn test_exit_code_before_termination() {
        let master = PtyMaster::spawn(
            "/bin/cat",
            Vec::<&str>::new(),
            None::<Vec<(String, String)>>,
            WindowSize::default(),
        )
        .unwrap();
        assert!(!master.terminated());
        assert!(matches!(master.exit_code(), Err(Error::NotTerminated)));
        master.terminate();
        let _ = master.wait();
        assert!(master.terminated());
        assert!(master.exit_code().is_ok());
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let master = PtyMaster::spawn(
            "/bin/cat",
            Vec::<&str>::new(),
            None::<Vec<(String, String)>>,
            WindowSize::default(),
        )
        .unwrap();
        master.terminate();
        master.terminate();
        let _ = master.wait();
        master.terminate();
        assert!(master.terminated());
    }

    #[test]
    fn test_window_size_readback() {
        let master = PtyMaster::spawn(
            "/bin/cat",
            Vec::<&str>::new(),
            None::<Vec<(String, String)>>,
            WindowSize::new(100, 30),
        )
        .unwrap();
        let size = master.window_size().unwrap();
        assert_eq!((size.cols, size.rows), (100, 30));
        master.resize(120, 40).unwrap();
        let size = master.window_size().unwrap();
        assert_eq!((size.cols, size.rows), (120, 40));
        master.terminate();
        let _ = master.wait();
    }
}
