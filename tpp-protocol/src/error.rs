//! Error types for frame decoding

use thiserror::Error;

/// Frame decode error
///
/// These never escape a successfully located frame: the sequence parser
/// catches them and degrades the frame to [`Sequence::Invalid`].
///
/// [`Sequence::Invalid`]: crate::Sequence::Invalid
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Payload ended in the middle of a field
    #[error("truncated input")]
    TruncatedInput,

    /// A quote escape was not followed by two hexadecimal digits
    #[error("malformed hex escape")]
    BadHex,

    /// An unsigned field does not fit in 64 bits
    #[error("integer field overflow")]
    Overflow,

    /// A field was terminated by something other than `;` or payload end
    #[error("missing field separator")]
    MissingSeparator,

    /// A Data frame's size field disagrees with its decoded payload
    #[error("payload size mismatch: reported {reported}, actual {actual}")]
    SizeMismatch { reported: u64, actual: u64 },

    /// The kind ordinal is past the highest known kind
    #[error("unknown sequence kind {0}")]
    UnknownKind(u64),
}

/// Result type for frame decoding
pub type Result<T> = std::result::Result<T, Error>;
