//! Ports: the hexagonal boundary between the engine and the outside world.
//!
//! - **Driving (inbound):** the API the engine exposes to a host
//!   application — [`DhtApi`].
//! - **Driven (outbound):** the collaborators the engine requires from
//!   its host — [`DatagramSocket`], [`Clock`], [`ConfigProvider`].

pub mod inbound;
pub mod outbound;

pub use inbound::DhtApi;
pub use outbound::{Clock, ConfigProvider, DatagramSocket, TransportError};
