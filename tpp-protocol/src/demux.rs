//! Stream demultiplexer
//!
//! A PTY byte stream interleaves three kinds of content: classical terminal
//! output, OSC escape sequences (`ESC ]`), and t++ frames (`ESC P +`). The
//! demultiplexer scans for the two lead-ins and routes complete frames to
//! the matching parser; everything else is forwarded as raw bytes for the
//! terminal renderer, including ordinary DCS and CSI sequences.
//!
//! Incomplete frames are retained across `feed` calls, so frames may be
//! split at arbitrary chunk boundaries.

use crate::osc::{OscParse, OscSequence};
use crate::sequence::{Sequence, SequenceParse};

const ESC: u8 = 0x1B;

/// Longest frame retained while waiting for a terminator. A frame past
/// this is flushed as raw bytes so a missing terminator cannot buffer the
/// stream forever.
pub const MAX_FRAME_LEN: usize = 65536;

/// One demultiplexed piece of the inbound stream
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Classical terminal output, to be rendered
    Raw(Vec<u8>),
    /// A complete OSC sequence
    Osc(OscSequence),
    /// A complete t++ sequence; may be [`Sequence::Invalid`] for a frame
    /// that was located but could not be decoded
    Tpp(Sequence),
}

/// Streaming demultiplexer over the inbound PTY byte stream
#[derive(Debug, Default)]
pub struct Demuxer {
    pending: Vec<u8>,
}

impl Demuxer {
    pub fn new() -> Demuxer {
        Demuxer::default()
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Feed a chunk of inbound bytes, returning the events it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<InputEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        let mut raw_start = 0;
        let mut i = 0;
        // offset of an incomplete frame (or lone trailing ESC) to keep
        let mut hold = None;

        while i < self.pending.len() {
            if self.pending[i] != ESC {
                i += 1;
                continue;
            }
            match self.pending.get(i + 1) {
                None => {
                    hold = Some(i);
                    break;
                }
                Some(b']') => match OscSequence::parse(&self.pending[i..]) {
                    OscParse::Complete { sequence, consumed } => {
                        flush_raw(&mut events, &self.pending[raw_start..i]);
                        events.push(InputEvent::Osc(sequence));
                        i += consumed;
                        raw_start = i;
                    }
                    OscParse::Incomplete => {
                        hold = Some(i);
                        break;
                    }
                },
                Some(b'P') => match self.pending.get(i + 2) {
                    None => {
                        hold = Some(i);
                        break;
                    }
                    Some(b'+') => match Sequence::parse(&self.pending[i..]) {
                        SequenceParse::Complete { sequence, consumed } => {
                            flush_raw(&mut events, &self.pending[raw_start..i]);
                            events.push(InputEvent::Tpp(sequence));
                            i += consumed;
                            raw_start = i;
                        }
                        SequenceParse::Incomplete => {
                            hold = Some(i);
                            break;
                        }
                    },
                    // ordinary DCS; the terminal renderer owns it
                    Some(_) => i += 1,
                },
                Some(_) => i += 1,
            }
        }

        match hold {
            Some(start) if self.pending.len() - start > MAX_FRAME_LEN => {
                tracing::warn!(
                    "frame exceeded {} bytes without a terminator, flushing as raw",
                    MAX_FRAME_LEN
                );
                flush_raw(&mut events, &self.pending[raw_start..]);
                self.pending.clear();
            }
            Some(start) => {
                flush_raw(&mut events, &self.pending[raw_start..start]);
                self.pending.drain(..start);
            }
            None => {
                flush_raw(&mut events, &self.pending[raw_start..]);
                self.pending.clear();
            }
        }
        events
    }
}

fn flush_raw(events: &mut Vec<InputEvent>, bytes: &[u8]) {
    if !bytes.is_empty() {
        events.push(InputEvent::Raw(bytes.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{emit, Capabilities};

    #[test]
    fn test_raw_only() {
        let mut demux = Demuxer::new();
        let events = demux.feed(b"plain output\r\n");
        assert_eq!(events, vec![InputEvent::Raw(b"plain output\r\n".to_vec())]);
        assert!(demux.pending().is_empty());
    }

    #[test]
    fn test_mixed_stream() {
        let mut demux = Demuxer::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(b"ls\r\n");
        stream.extend_from_slice(b"\x1b]0;title\x07");
        stream.extend_from_slice(&emit(&Capabilities { version: 1 }));
        stream.extend_from_slice(b"done");

        let events = demux.feed(&stream);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], InputEvent::Raw(b"ls\r\n".to_vec()));
        assert!(matches!(events[1], InputEvent::Osc(_)));
        assert_eq!(
            events[2],
            InputEvent::Tpp(Sequence::Capabilities(Capabilities { version: 1 }))
        );
        assert_eq!(events[3], InputEvent::Raw(b"done".to_vec()));
    }

    #[test]
    fn test_frame_split_across_feeds() {
        let mut demux = Demuxer::new();
        let frame = emit(&Capabilities { version: 3 });
        let (head, tail) = frame.split_at(4);

        assert_eq!(demux.feed(head), vec![]);
        assert_eq!(demux.pending(), head);
        let events = demux.feed(tail);
        assert_eq!(
            events,
            vec![InputEvent::Tpp(Sequence::Capabilities(Capabilities {
                version: 3
            }))]
        );
        assert!(demux.pending().is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut stream = b"hi\x1b]2;t\x07".to_vec();
        stream.extend_from_slice(&emit(&Capabilities { version: 1 }));

        let mut demux = Demuxer::new();
        let mut events = Vec::new();
        for &b in &stream {
            events.extend(demux.feed(&[b]));
        }
        let raw: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Raw(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(raw, b"hi");
        assert!(events.iter().any(|e| matches!(e, InputEvent::Osc(_))));
        assert!(events.iter().any(|e| matches!(e, InputEvent::Tpp(_))));
    }

    #[test]
    fn test_ordinary_dcs_is_raw() {
        let mut demux = Demuxer::new();
        let events = demux.feed(b"\x1bPqsixel data\x1b\\after");
        assert_eq!(
            events,
            vec![InputEvent::Raw(b"\x1bPqsixel data\x1b\\after".to_vec())]
        );
    }

    #[test]
    fn test_csi_is_raw() {
        let mut demux = Demuxer::new();
        let events = demux.feed(b"\x1b[1;31mred\x1b[0m");
        assert_eq!(events, vec![InputEvent::Raw(b"\x1b[1;31mred\x1b[0m".to_vec())]);
    }

    #[test]
    fn test_malformed_frame_yields_invalid() {
        let mut demux = Demuxer::new();
        let events = demux.feed(b"\x1bP+4;1;0;5;ab\x07next");
        assert_eq!(
            events,
            vec![
                InputEvent::Tpp(Sequence::Invalid),
                InputEvent::Raw(b"next".to_vec()),
            ]
        );
    }

    #[test]
    fn test_trailing_esc_held_back() {
        let mut demux = Demuxer::new();
        let events = demux.feed(b"text\x1b");
        assert_eq!(events, vec![InputEvent::Raw(b"text".to_vec())]);
        assert_eq!(demux.pending(), b"\x1b");

        // the ESC turns out to start an OSC sequence
        let events = demux.feed(b"]0;t\x07");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], InputEvent::Osc(_)));
    }

    #[test]
    fn test_runaway_frame_flushed() {
        let mut demux = Demuxer::new();
        let mut runaway = b"\x1b]0;".to_vec();
        runaway.resize(MAX_FRAME_LEN + 8, b'x');
        let events = demux.feed(&runaway);
        assert_eq!(events, vec![InputEvent::Raw(runaway.clone())]);
        assert!(demux.pending().is_empty());
    }
}
