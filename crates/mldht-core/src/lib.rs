//! # Mainline DHT node core
//!
//! A Kademlia-style distributed hash table node implementing the
//! BitTorrent Mainline DHT (BEP-5) KRPC protocol: routing table
//! maintenance, iterative `find_node`/`get_peers` lookups, peer
//! announces, and the admission/rate-limiting defenses that keep an
//! open UDP listener from being trivially abused.
//!
//! ## Architecture
//!
//! Hexagonal, ports-and-adapters:
//! - **`domain`:** pure Kademlia logic — node ids, XOR distance, the
//!   routing table, quarantine admission, rate limiting, announce
//!   tokens, and the iterative lookup state machine. No I/O.
//! - **`engine`:** `KrpcEngine`, the socket-free wire-to-domain bridge.
//!   Encodes outbound queries and decodes/dispatches inbound datagrams
//!   without ever performing I/O itself.
//! - **`ports`:** the driving port ([`DhtApi`]) and driven ports
//!   ([`DatagramSocket`], [`Clock`], [`ConfigProvider`]) at the
//!   boundary between the engine and its host.
//! - **`adapters`:** concrete implementations of the driven ports —
//!   Tokio UDP sockets, a system clock, TOML/static configuration, and
//!   JSON-file state persistence.
//! - **`service`:** [`DhtNode`], the host-facing actor that owns a
//!   socket and an engine and drives the receive loop alongside
//!   `DhtApi` calls.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), mldht_core::domain::DhtError> {
//! use mldht_core::adapters::{SystemClock, TokioUdpSocket};
//! use mldht_core::config::DhtConfig;
//! use mldht_core::domain::NodeId;
//! use mldht_core::ports::DhtApi;
//! use mldht_core::service::DhtNode;
//!
//! let config = DhtConfig::default();
//! let socket = TokioUdpSocket::bind(config.udp_port).await?;
//! let node = DhtNode::new(NodeId::random(), config, socket, SystemClock);
//!
//! tokio::spawn(async move { node.run().await });
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod service;
pub mod wire;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::DhtConfig;
pub use domain::{Address, DhtError, Node, NodeId};
pub use engine::KrpcEngine;
pub use ports::{Clock, DatagramSocket, DhtApi, RoutingTableStats};
pub use service::{DhtEvent, DhtNode};
