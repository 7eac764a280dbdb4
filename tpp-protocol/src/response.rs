//! Response envelope for request/response pairs
//!
//! The wire does not distinguish a bare sequence from one sent as a
//! response; the envelope exists in memory so an API can say "this request
//! yields a `TransferStatus` or a `Nack`" in one type.

use crate::sequence::{Encode, Nack};

/// Either a positive result or a [`Nack`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<T> {
    Accepted(T),
    Denied(Nack),
}

impl<T> Response<T> {
    /// Accept with a positive result.
    pub fn accept(value: T) -> Response<T> {
        Response::Accepted(value)
    }

    /// Deny `request` with a reason.
    pub fn deny<R: Encode + ?Sized>(request: &R, reason: impl Into<String>) -> Response<T> {
        Response::Denied(Nack::response_to(request, reason))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Response::Accepted(_))
    }

    /// The positive result, when there is one.
    pub fn result(&self) -> Option<&T> {
        match self {
            Response::Accepted(value) => Some(value),
            Response::Denied(_) => None,
        }
    }

    /// The rejection, when there is one.
    pub fn nack(&self) -> Option<&Nack> {
        match self {
            Response::Accepted(_) => None,
            Response::Denied(nack) => Some(nack),
        }
    }
}

impl<T: Encode> Encode for Response<T> {
    fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Response::Accepted(value) => value.encode_payload(out),
            Response::Denied(nack) => nack.encode_payload(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{emit, Capabilities, Sequence, SequenceParse, PROTOCOL_VERSION};

    #[test]
    fn test_accepted_serialises_as_result() {
        let response = Response::accept(Capabilities {
            version: PROTOCOL_VERSION,
        });
        assert!(response.is_accepted());
        assert_eq!(
            emit(&response),
            emit(&Capabilities {
                version: PROTOCOL_VERSION
            })
        );
    }

    #[test]
    fn test_denied_serialises_as_nack() {
        let response: Response<Capabilities> =
            Response::deny(&Sequence::GetCapabilities, "unsupported");
        assert!(!response.is_accepted());
        assert_eq!(response.nack().map(|n| n.reason.as_str()), Some("unsupported"));

        let bytes = emit(&response);
        match Sequence::parse(&bytes) {
            SequenceParse::Complete {
                sequence: Sequence::Nack(nack),
                ..
            } => {
                assert_eq!(nack.request, "2");
                assert_eq!(nack.reason, "unsupported");
            }
            other => panic!("expected Nack, got {other:?}"),
        }
    }
}
