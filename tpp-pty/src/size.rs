//! Terminal window size

use std::io;
use std::os::fd::RawFd;

use crate::error::{Error, Result};

/// Window size in character cells, with optional pixel dimensions for
/// `TIOCSWINSZ`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns
    pub cols: u16,
    /// Number of rows
    pub rows: u16,
    /// Width in pixels (0 when unknown)
    pub pixel_width: u16,
    /// Height in pixels (0 when unknown)
    pub pixel_height: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            pixel_width: 0,
            pixel_height: 0,
        }
    }

    /// Read the current size of the terminal behind `fd` (TIOCGWINSZ).
    pub fn from_fd(fd: RawFd) -> Result<Self> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ as libc::c_ulong, &mut ws) };
        if result == -1 {
            return Err(Error::WindowSize(io::Error::last_os_error().to_string()));
        }
        Ok(Self::from(ws))
    }

    /// Convert to the libc winsize structure
    pub fn to_winsize(&self) -> libc::winsize {
        libc::winsize {
            ws_row: self.rows,
            ws_col: self.cols,
            ws_xpixel: self.pixel_width,
            ws_ypixel: self.pixel_height,
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl From<libc::winsize> for WindowSize {
    fn from(ws: libc::winsize) -> Self {
        Self {
            cols: ws.ws_col,
            rows: ws.ws_row,
            pixel_width: ws.ws_xpixel,
            pixel_height: ws.ws_ypixel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_size() {
        let size = WindowSize::default();
        assert_eq!(size.cols, 80);
        assert_eq!(size.rows, 24);
    }

    #[test]
    fn test_winsize_round_trip() {
        let size = WindowSize::new(120, 40);
        let ws = size.to_winsize();
        assert_eq!(ws.ws_col, 120);
        assert_eq!(ws.ws_row, 40);
        assert_eq!(WindowSize::from(ws), size);
    }
}
