//! PTY transport carrying raw terminal data and t++ frames
//!
//! This crate provides the byte-oriented channel under the t++ protocol:
//! - the [`Channel`] contract shared by both ends, with framed-send
//!   conveniences in [`ChannelExt`]
//! - [`PtyMaster`]: spawn a child on a fresh pseudoterminal, resize it,
//!   observe termination and the exit code
//! - [`PtySlave`]: the child-process side, with resize notifications
//! - [`pipe`]: an in-memory substitute for tests
//!
//! Reference: https://www.man7.org/linux/man-pages/man7/pty.7.html

mod channel;
mod error;
mod master;
pub mod pipe;
mod size;
mod slave;

pub use channel::{Channel, ChannelExt};
pub use error::{Error, Result};
pub use master::PtyMaster;
pub use size::WindowSize;
pub use slave::PtySlave;
