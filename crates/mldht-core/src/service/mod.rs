//! Host-facing service layer: wires the socket-free `KrpcEngine` to a real
//! `DatagramSocket`, exposing the `DhtApi` driving port and the receive/
//! maintenance loops a host application runs.
//!
//! Reference: spec.md Section 5 (Concurrency & Resource Model).

mod api;
mod core;
pub mod events;
pub mod maintenance;

pub use core::DhtNode;
pub use events::DhtEvent;

#[cfg(all(test, feature = "test-utils"))]
mod tests;
