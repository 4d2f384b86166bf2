//! Socket-free KRPC protocol engine: wire codec + domain dispatch.
//!
//! Reference: spec.md Section 4.5 (TransactionTable & KRPCEngine).

mod krpc_engine;

pub use krpc_engine::{error_code, Inbound, KrpcEngine};
