//! Kademlia routing table: buckets and the splitting binary tree.
//!
//! Reference: spec.md Section 4.2 (RoutingTable)

mod bucket;
mod tree;

pub use bucket::KBucket;
pub use tree::RoutingTable;
