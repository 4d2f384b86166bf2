//! Driven ports (outbound SPI): collaborators the engine requires from its
//! host application.
//!
//! Grounded in the teacher's `NetworkSocket`/`TimeSource`/`ConfigProvider`
//! shape, retargeted from Kademlia-over-IPC to KRPC-over-UDP.

use thiserror::Error;

use crate::config::DhtConfig;
use crate::domain::{Address, DhtError, Timestamp};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Recv(String),
}

impl From<TransportError> for DhtError {
    fn from(err: TransportError) -> Self {
        DhtError::Transport(err.to_string())
    }
}

/// Raw UDP datagram I/O. The engine never touches a socket directly; it
/// only ever goes through this port, so the whole protocol can be driven
/// in tests by an in-memory fake with no real network.
pub trait DatagramSocket: Send + Sync {
    fn send_to(
        &self,
        bytes: &[u8],
        dest: Address,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    fn recv_from(
        &self,
    ) -> impl std::future::Future<Output = Result<(Vec<u8>, Address), TransportError>> + Send;
}

/// Source of wall-clock time. Production wires this to `SystemTime`; tests
/// inject a fixed or steppable clock for deterministic deadline assertions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Configuration and bootstrap seed source.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> DhtConfig;
}
