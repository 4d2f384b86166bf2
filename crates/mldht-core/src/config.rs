//! Node configuration surface.
//!
//! Reference: spec.md Section 6 (External Interfaces).

use crate::domain::NodeId;
use std::net::SocketAddr;

/// Configuration for a DHT node. Fields mirror the external interface
/// section of the design: each has a documented effect and default.
#[derive(Debug, Clone, PartialEq)]
pub struct DhtConfig {
    /// UDP listener port.
    pub udp_port: u16,
    /// Local node id. Random if left `None`.
    pub node_id: Option<NodeId>,
    /// Bucket capacity (Kademlia `k`). Default 8.
    pub k: usize,
    /// Lookup parallelism (Kademlia `alpha`). Default 3.
    pub alpha: usize,
    /// Per-query deadline, in seconds. Default 15s.
    pub rpc_timeout_secs: u64,
    /// Overall deadline for one iterative lookup (`find_node`/`get_peers`),
    /// in seconds. Default several times `rpc_timeout_secs`.
    pub lookup_deadline_secs: u64,
    /// Peer announce expiry, in seconds. Default 30 minutes.
    pub peer_timeout_secs: u64,
    /// Node freshness window, in seconds. Default 15 minutes.
    pub node_timeout_secs: u64,
    /// How long an issued announce-token remains valid. Default 10 minutes.
    pub token_validity_secs: u64,
    /// How often the token secret is rotated. Default 5 minutes.
    pub secret_rotation_secs: u64,
    /// Global outbound/inbound bandwidth budget, in bytes/sec.
    pub global_bandwidth_rate: u64,
    /// Per-host bandwidth budget, in bytes/sec.
    pub host_bandwidth_rate: u64,
    /// Seed nodes used to bootstrap the routing table.
    pub bootstrap_nodes: Vec<SocketAddr>,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            udp_port: 6881,
            node_id: None,
            k: 8,
            alpha: 3,
            rpc_timeout_secs: 15,
            lookup_deadline_secs: 15 * 8,
            peer_timeout_secs: 30 * 60,
            node_timeout_secs: 15 * 60,
            token_validity_secs: 10 * 60,
            secret_rotation_secs: 5 * 60,
            global_bandwidth_rate: 1 << 20,
            host_bandwidth_rate: 1 << 16,
            bootstrap_nodes: Vec::new(),
        }
    }
}

impl DhtConfig {
    /// A config tuned for fast, deterministic tests: tiny timeouts, tiny
    /// bucket sizes.
    pub fn for_testing() -> Self {
        Self {
            udp_port: 0,
            node_id: Some(NodeId::zero()),
            k: 3,
            alpha: 2,
            rpc_timeout_secs: 1,
            lookup_deadline_secs: 5,
            peer_timeout_secs: 5,
            node_timeout_secs: 10,
            token_validity_secs: 4,
            secret_rotation_secs: 2,
            global_bandwidth_rate: 1 << 20,
            host_bandwidth_rate: 1 << 20,
            bootstrap_nodes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DhtConfig::default();
        assert_eq!(config.k, 8);
        assert_eq!(config.alpha, 3);
        assert_eq!(config.rpc_timeout_secs, 15);
        assert_eq!(config.lookup_deadline_secs, 120);
        assert_eq!(config.peer_timeout_secs, 1800);
        assert_eq!(config.node_timeout_secs, 900);
        assert_eq!(config.token_validity_secs, 600);
        assert_eq!(config.secret_rotation_secs, 300);
    }
}
