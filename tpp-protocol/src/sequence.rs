//! t++ sequence layer
//!
//! A t++ sequence rides inside a DCS frame with a `+` discriminator:
//!
//! ```text
//! ESC P + <kind> [; <fields>] BEL
//! ```
//!
//! The kind is a zero-based ordinal in decimal ASCII. Fields follow the
//! frame codec primitives. Extra payload after the known fields of a kind
//! is ignored so newer senders can add fields without breaking older
//! receivers.

use crate::codec::{self, Reader, BEL};
use crate::error::{Error, Result};

/// Lead-in bytes of a t++ frame (DCS with the `+` discriminator)
pub const LEAD_IN: &[u8] = b"\x1bP+";

/// Protocol version reported in [`Capabilities`] responses
pub const PROTOCOL_VERSION: u64 = 1;

/// Sequence kinds and their wire ordinals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Kind {
    Ack = 0,
    Nack,
    GetCapabilities,
    Capabilities,
    Data,
    OpenFileTransfer,
    GetTransferStatus,
    TransferStatus,
    ViewRemoteFile,
    /// Sentinel for unknown or malformed frames
    Invalid,
}

impl Kind {
    /// Map a wire ordinal to a kind. Ordinals past the last known kind map
    /// to `Invalid`.
    pub fn from_ordinal(ordinal: u64) -> Kind {
        match ordinal {
            0 => Kind::Ack,
            1 => Kind::Nack,
            2 => Kind::GetCapabilities,
            3 => Kind::Capabilities,
            4 => Kind::Data,
            5 => Kind::OpenFileTransfer,
            6 => Kind::GetTransferStatus,
            7 => Kind::TransferStatus,
            8 => Kind::ViewRemoteFile,
            _ => Kind::Invalid,
        }
    }

    fn write(self, out: &mut Vec<u8>) {
        codec::write_unsigned(out, self as u64);
    }
}

/// Payload serialisation for sequences and responses.
///
/// `encode_payload` writes the kind ordinal and the fields, without the
/// outer framing. [`emit`] adds the lead-in and terminator.
pub trait Encode {
    fn encode_payload(&self, out: &mut Vec<u8>);
}

/// Serialise a value into a complete on-wire frame.
pub fn emit<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(32);
    out.extend_from_slice(LEAD_IN);
    value.encode_payload(&mut out);
    out.push(BEL);
    out
}

/// The payload rendering of a value, as text.
///
/// This is what `Ack` and `Nack` carry to identify the request they answer.
pub fn payload_text<T: Encode + ?Sized>(value: &T) -> String {
    let mut out = Vec::new();
    value.encode_payload(&mut out);
    String::from_utf8_lossy(&out).into_owned()
}

/// Positive acknowledgement of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Serialised payload of the acknowledged request
    pub request: String,
    /// Application-assigned id, opaque to the protocol
    pub id: u64,
}

impl Ack {
    /// Acknowledge `request` with the given id.
    pub fn response_to<R: Encode + ?Sized>(request: &R, id: u64) -> Ack {
        Ack {
            request: payload_text(request),
            id,
        }
    }

    fn parse(r: &mut Reader) -> Result<Ack> {
        Ok(Ack {
            request: r.read_string()?,
            id: r.read_unsigned()?,
        })
    }
}

impl Encode for Ack {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::Ack.write(out);
        out.push(b';');
        codec::write_string(out, &self.request);
        codec::write_unsigned(out, self.id);
    }
}

/// Negative acknowledgement of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nack {
    /// Serialised payload of the rejected request
    pub request: String,
    /// Human-readable reason for the rejection
    pub reason: String,
}

impl Nack {
    /// Reject `request` with a reason.
    pub fn response_to<R: Encode + ?Sized>(request: &R, reason: impl Into<String>) -> Nack {
        Nack {
            request: payload_text(request),
            reason: reason.into(),
        }
    }

    fn parse(r: &mut Reader) -> Result<Nack> {
        Ok(Nack {
            request: r.read_string()?,
            reason: r.read_string()?,
        })
    }
}

impl Encode for Nack {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::Nack.write(out);
        out.push(b';');
        codec::write_string(out, &self.request);
        codec::write_string(out, &self.reason);
    }
}

/// Terminal capability information: protocol version for now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub version: u64,
}

impl Capabilities {
    fn parse(r: &mut Reader) -> Result<Capabilities> {
        Ok(Capabilities {
            version: r.read_unsigned()?,
        })
    }
}

impl Encode for Capabilities {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::Capabilities.write(out);
        out.push(b';');
        codec::write_unsigned(out, self.version);
    }
}

/// One packet of a data transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    /// Stream the packet belongs to
    pub stream_id: u64,
    /// Packet number within the stream; interpretation is up to the transfer
    pub packet: u64,
    /// Raw payload bytes; escaped on the wire
    pub payload: Vec<u8>,
}

impl Data {
    /// Payload size. The wire carries this redundantly ahead of the payload
    /// so receivers can pre-allocate; a mismatch on decode invalidates the
    /// frame.
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    fn parse(r: &mut Reader) -> Result<Data> {
        let stream_id = r.read_unsigned()?;
        let packet = r.read_unsigned()?;
        let size = r.read_unsigned()?;
        let payload = r.read_encoded_to_end()?;
        if size != payload.len() as u64 {
            return Err(Error::SizeMismatch {
                reported: size,
                actual: payload.len() as u64,
            });
        }
        Ok(Data {
            stream_id,
            packet,
            payload,
        })
    }
}

impl Encode for Data {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::Data.write(out);
        out.push(b';');
        codec::write_unsigned(out, self.stream_id);
        out.push(b';');
        codec::write_unsigned(out, self.packet);
        out.push(b';');
        codec::write_unsigned(out, self.size());
        out.push(b';');
        codec::encode_bytes(out, &self.payload);
    }
}

/// Request to open a file transfer from a remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFileTransfer {
    pub remote_host: String,
    pub remote_path: String,
    /// Total file size in bytes
    pub size: u64,
}

impl OpenFileTransfer {
    fn parse(r: &mut Reader) -> Result<OpenFileTransfer> {
        Ok(OpenFileTransfer {
            remote_host: r.read_string()?,
            remote_path: r.read_string()?,
            size: r.read_unsigned()?,
        })
    }
}

impl Encode for OpenFileTransfer {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::OpenFileTransfer.write(out);
        out.push(b';');
        codec::write_string(out, &self.remote_host);
        codec::write_string(out, &self.remote_path);
        codec::write_unsigned(out, self.size);
    }
}

/// Query the progress of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTransferStatus {
    pub id: u64,
}

impl GetTransferStatus {
    fn parse(r: &mut Reader) -> Result<GetTransferStatus> {
        Ok(GetTransferStatus {
            id: r.read_unsigned()?,
        })
    }
}

impl Encode for GetTransferStatus {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::GetTransferStatus.write(out);
        out.push(b';');
        codec::write_unsigned(out, self.id);
    }
}

/// Progress of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub id: u64,
    /// Total expected size in bytes
    pub size: u64,
    /// Bytes received so far
    pub received: u64,
}

impl TransferStatus {
    fn parse(r: &mut Reader) -> Result<TransferStatus> {
        Ok(TransferStatus {
            id: r.read_unsigned()?,
            size: r.read_unsigned()?,
            received: r.read_unsigned()?,
        })
    }
}

impl Encode for TransferStatus {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::TransferStatus.write(out);
        out.push(b';');
        codec::write_unsigned(out, self.id);
        out.push(b';');
        codec::write_unsigned(out, self.size);
        out.push(b';');
        codec::write_unsigned(out, self.received);
    }
}

/// Ask the terminal to open a transferred file in view mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRemoteFile {
    pub id: u64,
}

impl ViewRemoteFile {
    fn parse(r: &mut Reader) -> Result<ViewRemoteFile> {
        Ok(ViewRemoteFile {
            id: r.read_unsigned()?,
        })
    }
}

impl Encode for ViewRemoteFile {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        Kind::ViewRemoteFile.write(out);
        out.push(b';');
        codec::write_unsigned(out, self.id);
    }
}

/// A t++ message, one variant per wire kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sequence {
    Ack(Ack),
    Nack(Nack),
    GetCapabilities,
    Capabilities(Capabilities),
    Data(Data),
    OpenFileTransfer(OpenFileTransfer),
    GetTransferStatus(GetTransferStatus),
    TransferStatus(TransferStatus),
    ViewRemoteFile(ViewRemoteFile),
    /// A frame that was located but could not be decoded: unknown kind,
    /// field decode failure, or a Data size mismatch. The stream continues
    /// past it.
    Invalid,
}

impl Sequence {
    pub fn kind(&self) -> Kind {
        match self {
            Sequence::Ack(_) => Kind::Ack,
            Sequence::Nack(_) => Kind::Nack,
            Sequence::GetCapabilities => Kind::GetCapabilities,
            Sequence::Capabilities(_) => Kind::Capabilities,
            Sequence::Data(_) => Kind::Data,
            Sequence::OpenFileTransfer(_) => Kind::OpenFileTransfer,
            Sequence::GetTransferStatus(_) => Kind::GetTransferStatus,
            Sequence::TransferStatus(_) => Kind::TransferStatus,
            Sequence::ViewRemoteFile(_) => Kind::ViewRemoteFile,
            Sequence::Invalid => Kind::Invalid,
        }
    }

    /// Parse one frame from the start of `buf`.
    ///
    /// The buffer must begin at the lead-in; use [`find_sequence_start`] to
    /// locate it first. Incomplete input is reported, never an error: the
    /// caller buffers more bytes and retries with the same slice.
    pub fn parse(buf: &[u8]) -> SequenceParse {
        if buf.len() < LEAD_IN.len() {
            if LEAD_IN.starts_with(buf) {
                return SequenceParse::Incomplete;
            }
            return SequenceParse::Complete {
                sequence: Sequence::Invalid,
                consumed: 1,
            };
        }
        if !buf.starts_with(LEAD_IN) {
            return SequenceParse::Complete {
                sequence: Sequence::Invalid,
                consumed: 1,
            };
        }
        let body = &buf[LEAD_IN.len()..];
        let Some(end) = body.iter().position(|&b| b == BEL) else {
            return SequenceParse::Incomplete;
        };
        let consumed = LEAD_IN.len() + end + 1;
        match parse_payload(&body[..end]) {
            Ok(sequence) => SequenceParse::Complete { sequence, consumed },
            Err(err) => {
                tracing::debug!(
                    "skipping malformed t++ sequence ({}): {}",
                    err,
                    pretty_print(&buf[..consumed])
                );
                SequenceParse::Complete {
                    sequence: Sequence::Invalid,
                    consumed,
                }
            }
        }
    }
}

impl Encode for Sequence {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Sequence::Ack(s) => s.encode_payload(out),
            Sequence::Nack(s) => s.encode_payload(out),
            Sequence::GetCapabilities => Kind::GetCapabilities.write(out),
            Sequence::Capabilities(s) => s.encode_payload(out),
            Sequence::Data(s) => s.encode_payload(out),
            Sequence::OpenFileTransfer(s) => s.encode_payload(out),
            Sequence::GetTransferStatus(s) => s.encode_payload(out),
            Sequence::TransferStatus(s) => s.encode_payload(out),
            Sequence::ViewRemoteFile(s) => s.encode_payload(out),
            // Invalid has no fields; the peer discards the frame
            Sequence::Invalid => Kind::Invalid.write(out),
        }
    }
}

/// Outcome of [`Sequence::parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceParse {
    /// A full frame was consumed
    Complete { sequence: Sequence, consumed: usize },
    /// The buffer ended mid-frame; read more bytes and retry
    Incomplete,
}

fn parse_payload(payload: &[u8]) -> Result<Sequence> {
    let mut r = Reader::new(payload);
    let ordinal = r.read_unsigned()?;
    let sequence = match Kind::from_ordinal(ordinal) {
        Kind::Ack => Sequence::Ack(Ack::parse(&mut r)?),
        Kind::Nack => Sequence::Nack(Nack::parse(&mut r)?),
        Kind::GetCapabilities => Sequence::GetCapabilities,
        Kind::Capabilities => Sequence::Capabilities(Capabilities::parse(&mut r)?),
        Kind::Data => Sequence::Data(Data::parse(&mut r)?),
        Kind::OpenFileTransfer => Sequence::OpenFileTransfer(OpenFileTransfer::parse(&mut r)?),
        Kind::GetTransferStatus => Sequence::GetTransferStatus(GetTransferStatus::parse(&mut r)?),
        Kind::TransferStatus => Sequence::TransferStatus(TransferStatus::parse(&mut r)?),
        Kind::ViewRemoteFile => Sequence::ViewRemoteFile(ViewRemoteFile::parse(&mut r)?),
        Kind::Invalid => return Err(Error::UnknownKind(ordinal)),
    };
    // trailing bytes are a newer sender's extra fields
    Ok(sequence)
}

/// Offset of the earliest t++ lead-in, or `buf.len()` when absent.
pub fn find_sequence_start(buf: &[u8]) -> usize {
    if buf.len() < LEAD_IN.len() {
        return buf.len();
    }
    buf.windows(LEAD_IN.len())
        .position(|w| w == LEAD_IN)
        .unwrap_or(buf.len())
}

/// Offset of the earliest BEL terminator, or `buf.len()` when the frame is
/// still incomplete.
pub fn find_sequence_end(buf: &[u8]) -> usize {
    buf.iter().position(|&b| b == BEL).unwrap_or(buf.len())
}

/// Render a raw byte range for diagnostics: printable bytes as themselves,
/// everything else in escape notation.
pub fn pretty_print(buf: &[u8]) -> String {
    let mut out = String::with_capacity(buf.len());
    for &b in buf {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02X}")),
        }
    }
    out
}
