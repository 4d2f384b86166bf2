//! Optional on-disk state persistence, gated behind the `network` feature
//! (it shares that feature's `serde`-ecosystem dependency, not any actual
//! networking). A JSON snapshot of routing-table entries, quarantine
//! membership, peer entries, and the local node id, round-tripping per
//! spec.md Section 6: loading followed by immediate dumping must yield
//! the same logical state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Address, Node, NodeId, Timestamp};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {path}: {error}")]
    Read { path: String, error: String },
    #[error("failed to write {path}: {error}")]
    Write { path: String, error: String },
    #[error("failed to (de)serialize state: {0}")]
    Serde(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeSnapshot {
    id: [u8; 20],
    ip: String,
    port: u16,
    last_seen_secs: u64,
    successful: u32,
    failed: u32,
    cumulative_rtt_ms: u64,
}

impl From<&Node> for NodeSnapshot {
    fn from(node: &Node) -> Self {
        Self {
            id: *node.id.as_bytes(),
            ip: node.address.ip.to_string(),
            port: node.address.port,
            last_seen_secs: node.stats.last_seen.as_secs(),
            successful: node.stats.successful,
            failed: node.stats.failed,
            cumulative_rtt_ms: node.stats.cumulative_rtt_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeerSnapshot {
    infohash: [u8; 20],
    ip: String,
    port: u16,
    last_announced_secs: u64,
}

/// Everything `spec.md` Section 6 names as persistable: routing-table
/// entries, quarantine membership, peer entries with `last_announced`,
/// and `node_id`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedState {
    local_id: Option<[u8; 20]>,
    nodes: Vec<NodeSnapshot>,
    quarantined: Vec<[u8; 20]>,
    peers: Vec<PeerSnapshot>,
}

impl PersistedState {
    pub fn builder() -> PersistedStateBuilder {
        PersistedStateBuilder::default()
    }

    pub fn local_id(&self) -> Option<NodeId> {
        self.local_id.map(NodeId::new)
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.nodes.iter().filter_map(|snap| {
            let ip = snap.ip.parse().ok()?;
            let mut stats = crate::domain::NodeStats::new(Timestamp::new(snap.last_seen_secs));
            stats.successful = snap.successful;
            stats.failed = snap.failed;
            stats.cumulative_rtt_ms = snap.cumulative_rtt_ms;
            Some(Node {
                id: NodeId::new(snap.id),
                address: Address::new(ip, snap.port),
                stats,
            })
        })
    }

    pub fn quarantined(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.quarantined.iter().copied().map(NodeId::new)
    }

    pub fn peers(&self) -> impl Iterator<Item = (NodeId, Address, Timestamp)> + '_ {
        self.peers.iter().filter_map(|snap| {
            let ip = snap.ip.parse().ok()?;
            Some((
                NodeId::new(snap.infohash),
                Address::new(ip, snap.port),
                Timestamp::new(snap.last_announced_secs),
            ))
        })
    }
}

#[derive(Default)]
pub struct PersistedStateBuilder {
    state: PersistedState,
}

impl PersistedStateBuilder {
    pub fn local_id(mut self, id: NodeId) -> Self {
        self.state.local_id = Some(*id.as_bytes());
        self
    }

    pub fn node(mut self, node: &Node) -> Self {
        self.state.nodes.push(NodeSnapshot::from(node));
        self
    }

    pub fn quarantined(mut self, id: NodeId) -> Self {
        self.state.quarantined.push(*id.as_bytes());
        self
    }

    pub fn peer(mut self, infohash: NodeId, peer: Address, last_announced: Timestamp) -> Self {
        self.state.peers.push(PeerSnapshot {
            infohash: *infohash.as_bytes(),
            ip: peer.ip.to_string(),
            port: peer.port,
            last_announced_secs: last_announced.as_secs(),
        });
        self
    }

    pub fn build(self) -> PersistedState {
        self.state
    }
}

/// JSON-file-backed store for a [`PersistedState`] snapshot.
pub struct JsonStateStore;

impl JsonStateStore {
    pub fn load(path: impl AsRef<Path>) -> Result<PersistedState, PersistenceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PersistenceError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| PersistenceError::Serde(e.to_string()))
    }

    pub fn dump(path: impl AsRef<Path>, state: &PersistedState) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(state).map_err(|e| PersistenceError::Serde(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| PersistenceError::Write {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }
}
