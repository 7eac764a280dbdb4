//! t++ protocol - sequence codec, OSC parser and stream demultiplexer
//!
//! This crate implements the wire side of the t++ extension protocol: a
//! side-channel for structured messages (capability negotiation, file
//! transfer, remote-file viewing) embedded in a terminal byte stream that
//! also carries classical escape sequences and raw output.
//!
//! The building blocks:
//! - frame codec primitives (unsigned integers, length-prefixed strings,
//!   escape-encoded byte buffers)
//! - typed sequences with serialisation and a streaming parser
//! - an OSC parser sharing the same byte stream
//! - a demultiplexer that splits an inbound stream into raw output, OSC
//!   sequences and t++ frames
//!
//! All parsers are pure functions over byte slices returning the parsed
//! value plus the bytes consumed, or an incomplete indication. Buffering
//! lives in [`Demuxer`]; the transport is out of scope here.

mod codec;
mod demux;
mod error;
mod osc;
mod response;
mod sequence;

pub use codec::{Reader, BEL, QUOTE};
pub use demux::{Demuxer, InputEvent, MAX_FRAME_LEN};
pub use error::{Error, Result};
pub use osc::{OscParse, OscSequence, OSC_LEAD_IN};
pub use response::Response;
pub use sequence::{
    emit, find_sequence_end, find_sequence_start, payload_text, pretty_print, Ack, Capabilities,
    Data, Encode, GetTransferStatus, Kind, Nack, OpenFileTransfer, Sequence, SequenceParse,
    TransferStatus, ViewRemoteFile, LEAD_IN, PROTOCOL_VERSION,
};
