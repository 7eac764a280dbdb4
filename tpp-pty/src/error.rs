//! Error types for PTY operations

use std::io;
use thiserror::Error;

/// PTY error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on the underlying channel
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PTY creation failed
    #[error("failed to create PTY: {0}")]
    PtyCreation(String),

    /// Failed to spawn the child process
    #[error("failed to spawn child: {0}")]
    SpawnFailed(String),

    /// Failed to read or set the window size
    #[error("window size operation failed: {0}")]
    WindowSize(String),

    /// Exit code requested before the child terminated
    #[error("child process has not terminated")]
    NotTerminated,

    /// The calling process is not attached to a terminal
    #[error("not attached to a terminal")]
    NotATerminal,

    /// System call error
    #[error("system error: {0}")]
    Nix(#[from] nix::Error),
}

/// Result type for PTY operations
pub type Result<T> = std::result::Result<T, Error>;
