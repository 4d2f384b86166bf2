//! The Kademlia routing table: a binary tree of k-buckets, splitting only
//! along the path that covers the local node's id.
//!
//! Reference: spec.md Section 4.2 (RoutingTable)

use super::bucket::KBucket;
use crate::domain::{Address, Node, NodeId, Timestamp};

enum Tree {
    Leaf(KBucket),
    Split {
        bit: u32,
        zero: Box<Tree>,
        one: Box<Tree>,
    },
}

/// Binary tree of KBuckets. Initially a single bucket covering the whole
/// id space `[0, 2^160)`; a bucket on the path to the local id may split
/// when full, bounding the tree to depth 160.
pub struct RoutingTable {
    local_id: NodeId,
    k: usize,
    root: Tree,
}

impl RoutingTable {
    pub fn new(local_id: NodeId, k: usize) -> Self {
        Self {
            local_id,
            k,
            root: Tree::Leaf(KBucket::new()),
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Attempt to admit a node. Returns `true` if the node ends up present
    /// (newly inserted or already there, stats refreshed).
    ///
    /// Rules (Section 4.2):
    /// 1. If already present, refresh stats and address; return true.
    /// 2. Locate the covering bucket.
    /// 3. If it has room, insert.
    /// 4. If it covers the local id, split along the highest differing bit
    ///    and retry.
    /// 5. Otherwise, return false; the caller may ping the stalest node and
    ///    evict on timeout.
    pub fn offer(&mut self, node: Node, now: Timestamp) -> bool {
        let local_id = self.local_id;
        let k = self.k;
        Self::offer_at(&mut self.root, 0, &local_id, k, true, node, now)
    }

    fn offer_at(
        slot: &mut Tree,
        depth: u32,
        local_id: &NodeId,
        k: usize,
        covers_local: bool,
        node: Node,
        now: Timestamp,
    ) -> bool {
        match slot {
            Tree::Split { bit, zero, one } => {
                let goes_one = node.id.bit(*bit);
                let child = if goes_one { one.as_mut() } else { zero.as_mut() };
                let child_covers = covers_local && (local_id.bit(*bit) == goes_one);
                Self::offer_at(child, depth + 1, local_id, k, child_covers, node, now)
            }
            Tree::Leaf(bucket) => {
                if let Some(existing) = bucket.find_mut(&node.id) {
                    existing.address = node.address;
                    existing.stats = node.stats;
                    bucket.touch(&node.id, now);
                    return true;
                }
                if !bucket.is_full(k) {
                    bucket.insert(node);
                    return true;
                }
                if !covers_local || depth >= 160 {
                    return false;
                }
                // Split along this depth and retry in the newly-split slot.
                let mut zero_bucket = KBucket::new();
                let mut one_bucket = KBucket::new();
                for existing in bucket.drain() {
                    if existing.id.bit(depth) {
                        one_bucket.insert(existing);
                    } else {
                        zero_bucket.insert(existing);
                    }
                }
                *slot = Tree::Split {
                    bit: depth,
                    zero: Box::new(Tree::Leaf(zero_bucket)),
                    one: Box::new(Tree::Leaf(one_bucket)),
                };
                Self::offer_at(slot, depth, local_id, k, covers_local, node, now)
            }
        }
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        Self::remove_at(&mut self.root, id)
    }

    fn remove_at(slot: &mut Tree, id: &NodeId) -> Option<Node> {
        match slot {
            Tree::Split { bit, zero, one } => {
                if id.bit(*bit) {
                    Self::remove_at(one, id)
                } else {
                    Self::remove_at(zero, id)
                }
            }
            Tree::Leaf(bucket) => bucket.remove(id),
        }
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        Self::find_at(&self.root, id).cloned()
    }

    fn find_at<'a>(slot: &'a Tree, id: &NodeId) -> Option<&'a Node> {
        match slot {
            Tree::Split { bit, zero, one } => {
                if id.bit(*bit) {
                    Self::find_at(one, id)
                } else {
                    Self::find_at(zero, id)
                }
            }
            Tree::Leaf(bucket) => bucket.find(id),
        }
    }

    pub fn get_by_address(&self, addr: &Address) -> Option<Node> {
        let mut found = None;
        Self::walk(&self.root, &mut |node| {
            if found.is_none() && &node.address == addr {
                found = Some(node.clone());
            }
        });
        found
    }

    /// The stalest node in the bucket that would cover `id`, usable by the
    /// caller to run an eviction-on-timeout ping before retrying `offer`.
    pub fn stalest_in_covering_bucket(&self, id: &NodeId) -> Option<Node> {
        Self::stalest_at(&self.root, id)
    }

    fn stalest_at(slot: &Tree, id: &NodeId) -> Option<Node> {
        match slot {
            Tree::Split { bit, zero, one } => {
                if id.bit(*bit) {
                    Self::stalest_at(one, id)
                } else {
                    Self::stalest_at(zero, id)
                }
            }
            Tree::Leaf(bucket) => bucket.stalest().cloned(),
        }
    }

    /// The `count` nodes closest to `target` by XOR distance, nearest
    /// first. Ties break on the numerically smaller id. Deterministic and
    /// duplicate-free.
    pub fn closest(&self, target: &NodeId, count: usize) -> Vec<Node> {
        let mut all = Vec::new();
        Self::walk(&self.root, &mut |node| all.push(node.clone()));
        all.sort_by(|a, b| {
            let da = crate::domain::Distance::between(&a.id, target);
            let db = crate::domain::Distance::between(&b.id, target);
            da.cmp(&db).then_with(|| a.id.cmp(&b.id))
        });
        all.truncate(count);
        all
    }

    fn walk(slot: &Tree, f: &mut impl FnMut(&Node)) {
        match slot {
            Tree::Split { zero, one, .. } => {
                Self::walk(zero, f);
                Self::walk(one, f);
            }
            Tree::Leaf(bucket) => {
                for node in bucket.nodes() {
                    f(node);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        Self::walk(&self.root, &mut |_| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leaf buckets the tree currently holds; 1 until the first
    /// split, growing by one per split thereafter.
    pub fn bucket_count(&self) -> usize {
        fn count(slot: &Tree) -> usize {
            match slot {
                Tree::Split { zero, one, .. } => count(zero) + count(one),
                Tree::Leaf(_) => 1,
            }
        }
        count(&self.root)
    }
}
