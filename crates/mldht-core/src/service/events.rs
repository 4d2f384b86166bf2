//! Optional event feed for host applications that want to observe node
//! lifecycle transitions without polling `stats()`.
//!
//! Grounded in the teacher's `PeerDiscoveryEventPublisher`/`EventBuilder`
//! split, reduced to the one mechanism this crate actually needs: an
//! unbounded channel a caller can subscribe to via `DhtNode::subscribe`.
//! A node with no subscriber pays only the cost of an `Option` check per
//! emission.

use crate::domain::{Address, NodeId};

#[derive(Debug, Clone)]
pub enum DhtEvent {
    /// A node was admitted to the routing table, either directly or after
    /// passing quarantine.
    NodeAdmitted { id: NodeId, address: Address },
    /// A previously-unknown node was placed on probation.
    NodeQuarantined { id: NodeId, address: Address },
    /// A quarantined node failed both probationary pings and was dropped.
    NodeDiscarded { id: NodeId },
    /// A remote peer announced itself for an infohash.
    PeerAnnounced { infohash: NodeId, peer: Address },
}
