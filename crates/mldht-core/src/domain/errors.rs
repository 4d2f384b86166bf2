//! Error taxonomy for the DHT core.
//!
//! Reference: spec.md Section 7 (Error Handling Design).

use thiserror::Error;

/// Errors surfaced by the transaction engine, iterative lookups and the
/// routing table to their callers.
#[derive(Debug, Error)]
pub enum DhtError {
    /// A query's deadline elapsed without a matching response or error.
    #[error("transaction timed out waiting for a reply")]
    Timeout,

    /// The remote peer answered with a KRPC error envelope.
    #[error("remote KRPC error {code}: {message}")]
    RemoteKrpcError { code: i32, message: String },

    /// A datagram or locally-built message failed to decode/encode.
    #[error("malformed KRPC message")]
    MalformedMessage,

    /// The local rate limiter refused to admit this send.
    #[error("rate limited")]
    RateLimited,

    /// An iterative lookup had no seed nodes to start from.
    #[error("no seed nodes available for lookup")]
    NoSeeds,

    /// Every query issued by an iterative lookup failed and no progress
    /// (new nodes) was made.
    #[error("all queries in lookup failed")]
    AllQueriesFailed,

    /// The transaction table could not allocate a fresh transaction id.
    #[error("transaction table exhausted")]
    ResourceExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bencode codec error: {0}")]
    Codec(#[from] crate::wire::CodecError),

    /// A `DatagramSocket` send/receive failed. Converted from
    /// `ports::TransportError` at the boundary (see `ports::outbound`) so
    /// this module stays free of a dependency on the ports layer.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, DhtError>;
