//! Infohash → peers datastore with announce-timeout expiry.
//!
//! Reference: spec.md Section 4.3 (PeerStore)
//! Grounded in `dhtbot/datastore.py`'s `MemoryDataStore` (torrents map of
//! address -> last_announced, age-checked-tolerant-of-reannounce cleanup).

use std::collections::HashMap;

use super::entities::{Address, Timestamp};
use super::node_id::NodeId;

/// Per-infohash cap on stored peers; overflow tail-drops the oldest entry.
/// Implementation-defined per Section 5's resource bounds.
const MAX_PEERS_PER_INFOHASH: usize = 128;

#[derive(Debug, Clone, Copy)]
struct PeerEntry {
    peer: Address,
    last_announced: Timestamp,
}

/// Maps infohashes to the set of peers that announced them, each entry
/// expiring after `peer_timeout` seconds unless refreshed.
#[derive(Debug, Default)]
pub struct PeerStore {
    torrents: HashMap<NodeId, Vec<PeerEntry>>,
}

impl PeerStore {
    pub fn new() -> Self {
        Self {
            torrents: HashMap::new(),
        }
    }

    /// Record `peer` as a holder of `infohash`, refreshing `last_announced`
    /// if already present. Over the per-infohash cap, the oldest entry is
    /// tail-dropped to make room.
    pub fn put(&mut self, infohash: NodeId, peer: Address, now: Timestamp) {
        let entries = self.torrents.entry(infohash).or_default();
        if let Some(existing) = entries.iter_mut().find(|e| e.peer == peer) {
            existing.last_announced = now;
            return;
        }
        if entries.len() >= MAX_PEERS_PER_INFOHASH {
            // Oldest by last_announced is dropped to bound memory.
            if let Some((idx, _)) = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.last_announced)
            {
                entries.remove(idx);
            }
        }
        entries.push(PeerEntry {
            peer,
            last_announced: now,
        });
    }

    /// The current set of peers for `infohash`, possibly empty.
    pub fn get(&self, infohash: &NodeId) -> Vec<Address> {
        self.torrents
            .get(infohash)
            .map(|entries| entries.iter().map(|e| e.peer).collect())
            .unwrap_or_default()
    }

    /// Expire entries older than `peer_timeout_secs`. When the last peer
    /// for an infohash expires, the infohash's bucket is removed entirely.
    pub fn expire(&mut self, now: Timestamp, peer_timeout_secs: u64) {
        self.torrents.retain(|_, entries| {
            entries.retain(|e| now.since(e.last_announced) < peer_timeout_secs);
            !entries.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn infohash() -> NodeId {
        NodeId::new([77u8; 20])
    }

    fn addr(n: u8) -> Address {
        Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, n)), 55)
    }

    #[test]
    fn repeated_put_keeps_single_entry_and_extends_expiry() {
        let mut store = PeerStore::new();
        store.put(infohash(), addr(1), Timestamp::new(0));
        store.put(infohash(), addr(1), Timestamp::new(100));

        assert_eq!(store.get(&infohash()).len(), 1);
        store.expire(Timestamp::new(100 + 29), 30);
        assert_eq!(store.get(&infohash()).len(), 1);
    }

    #[test]
    fn expiry_tolerant_of_reannounce() {
        let mut store = PeerStore::new();
        store.put(infohash(), addr(1), Timestamp::new(0));
        store.put(infohash(), addr(1), Timestamp::new(20));
        // Original timeout window (from t=0) would have expired by t=30;
        // the reannounce at t=20 must have reset it.
        store.expire(Timestamp::new(30), 30);
        assert_eq!(store.get(&infohash()).len(), 1);
    }

    #[test]
    fn last_peer_expiring_removes_infohash_bucket() {
        let mut store = PeerStore::new();
        store.put(infohash(), addr(1), Timestamp::new(0));
        store.expire(Timestamp::new(31), 30);
        assert!(store.get(&infohash()).is_empty());
        assert!(!store.torrents.contains_key(&infohash()));
    }

    #[test]
    fn overflow_tail_drops_oldest_entry() {
        let mut store = PeerStore::new();
        for i in 0..MAX_PEERS_PER_INFOHASH {
            store.put(infohash(), addr((i % 255) as u8), Timestamp::new(i as u64));
        }
        assert_eq!(store.get(&infohash()).len(), MAX_PEERS_PER_INFOHASH);
        store.put(infohash(), addr(250), Timestamp::new(9999));
        assert_eq!(store.get(&infohash()).len(), MAX_PEERS_PER_INFOHASH);
    }
}
