//! Wire codec: KRPC bencode envelopes and BEP-5 compact encodings.
//!
//! This is the boundary between the pure domain and raw bytes on the
//! socket. Nothing here owns I/O; adapters call into it.

pub mod compact;
pub mod message;

pub use message::{KrpcError, Message, MessageBody, MessageKind, QueryArgs, ResponseValues};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Malformed(&'static str),
    #[error("bencode encode failed: {0}")]
    Encode(String),
    #[error("bencode decode failed: {0}")]
    Decode(String),
}

/// Encode a [`crate::domain::NodeId`] as the raw 20-byte string KRPC wants.
pub fn encode_id(id: &crate::domain::NodeId) -> serde_bytes::ByteBuf {
    serde_bytes::ByteBuf::from(id.as_bytes().to_vec())
}

pub fn decode_id(bytes: &[u8]) -> Result<crate::domain::NodeId, CodecError> {
    if bytes.len() != 20 {
        return Err(CodecError::Malformed("id must be 20 bytes"));
    }
    let mut arr = [0u8; 20];
    arr.copy_from_slice(bytes);
    Ok(crate::domain::NodeId::new(arr))
}
