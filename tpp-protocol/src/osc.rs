//! OSC (Operating System Command) sequence parser
//!
//! OSC sequences share the byte stream with t++ frames and raw output:
//!
//! ```text
//! ESC ] [<number> ;] <arg0> [; <arg1> ...] (BEL | ESC \)
//! ```
//!
//! The parser is a pure function over a byte slice; incomplete input
//! consumes nothing so the caller can buffer and retry.

use crate::codec::BEL;

/// Lead-in bytes of an OSC sequence
pub const OSC_LEAD_IN: &[u8] = b"\x1b]";

const ESC: u8 = 0x1B;

/// A parsed OSC sequence: command number and `;`-separated values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscSequence {
    /// The command number, when one was parsed. A digit run not followed by
    /// `;` leaves this unset but the values are still parsed.
    pub number: Option<u32>,
    /// Interior of the sequence, split on `;`. Always at least one entry,
    /// possibly empty. Semicolons inside values are not escaped; senders
    /// must avoid the byte.
    pub values: Vec<String>,
}

/// Outcome of [`OscSequence::parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscParse {
    /// A full sequence was consumed
    Complete {
        sequence: OscSequence,
        consumed: usize,
    },
    /// No terminator yet; read more bytes and retry
    Incomplete,
}

impl OscSequence {
    /// Parse one OSC sequence from the start of `buf`.
    ///
    /// The buffer must begin at `ESC ]`.
    pub fn parse(buf: &[u8]) -> OscParse {
        let mut x = OSC_LEAD_IN.len();
        if buf.len() < x {
            return OscParse::Incomplete;
        }
        debug_assert!(buf.starts_with(OSC_LEAD_IN));

        let mut number = None;
        if buf.get(x).is_some_and(|b| b.is_ascii_digit()) {
            let mut arg: u64 = 0;
            while let Some(&b) = buf.get(x) {
                if !b.is_ascii_digit() {
                    break;
                }
                arg = arg.saturating_mul(10).saturating_add(u64::from(b - b'0'));
                x += 1;
            }
            // no semicolon leaves the number unset, but the values still parse
            if buf.get(x) == Some(&b';') {
                x += 1;
                number = u32::try_from(arg).ok();
            }
        }

        let mut values = Vec::new();
        let mut value_start = x;
        loop {
            let Some(&b) = buf.get(x) else {
                return OscParse::Incomplete;
            };
            match b {
                BEL => {
                    values.push(String::from_utf8_lossy(&buf[value_start..x]).into_owned());
                    x += 1;
                    break;
                }
                ESC if buf.get(x + 1) == Some(&b'\\') => {
                    values.push(String::from_utf8_lossy(&buf[value_start..x]).into_owned());
                    x += 2;
                    break;
                }
                b';' => {
                    values.push(String::from_utf8_lossy(&buf[value_start..x]).into_owned());
                    x += 1;
                    value_start = x;
                }
                // a lone ESC (including one the buffer ends on) stays in
                // the value; the next iteration decides
                _ => x += 1,
            }
        }

        OscParse::Complete {
            sequence: OscSequence { number, values },
            consumed: x,
        }
    }
}
