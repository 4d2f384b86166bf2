//! Core domain entities shared across the routing table, peer store and
//! transaction engine.
//!
//! Reference: spec.md Section 3 (Data Model)

use std::net::IpAddr;

use super::NodeId;

/// Network endpoint. Equality is structural (ip, port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub ip: IpAddr,
    pub port: u16,
}

impl Address {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Unix timestamp in seconds, as handed out by the injected `Clock` port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds elapsed between `earlier` and `self`, saturating at zero if
    /// `earlier` is actually later (clock went backwards).
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Per-node liveness and quality bookkeeping.
///
/// Freshness follows the node-freshness window: a node is fresh if it has
/// been seen, or has had a query of ours answered, within the window
/// (default 15 minutes, see `DhtConfig::node_timeout`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStats {
    pub last_seen: Timestamp,
    pub successful: u32,
    pub failed: u32,
    /// Cumulative round-trip time across successful queries, in milliseconds.
    pub cumulative_rtt_ms: u64,
}

impl NodeStats {
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_seen: now,
            successful: 0,
            failed: 0,
            cumulative_rtt_ms: 0,
        }
    }

    pub fn record_success(&mut self, now: Timestamp, rtt_ms: u64) {
        self.last_seen = now;
        self.successful += 1;
        self.cumulative_rtt_ms = self.cumulative_rtt_ms.saturating_add(rtt_ms);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn is_fresh(&self, now: Timestamp, freshness_window_secs: u64) -> bool {
        now.since(self.last_seen) < freshness_window_secs
    }
}

/// A DHT participant: its identity, last-known address, and liveness stats.
///
/// `(id, address)` uniquely identifies a Node in the routing table; offering
/// the same id at a new address replaces the old entry (see `RoutingTable::offer`).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub address: Address,
    pub stats: NodeStats,
}

impl Node {
    pub fn new(id: NodeId, address: Address, now: Timestamp) -> Self {
        Self {
            id,
            address,
            stats: NodeStats::new(now),
        }
    }
}
