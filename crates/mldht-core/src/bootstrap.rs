//! Routing-table bootstrap: resolve `DhtConfig::bootstrap_nodes` and seed
//! the table with `find_node(local_id)` queries against them.
//!
//! Independent of process startup mechanics (the "Bootstrap" external
//! collaborator named in spec.md Section 1 scope and SPEC_FULL.md
//! Section 1); a host application calls this once after constructing a
//! `DhtNode` and before relying on the routing table being populated.

use std::net::SocketAddr;

use crate::domain::{Address, DhtError};
use crate::service::DhtNode;

/// Resolve each configured bootstrap host and issue a `find_node` for our
/// own id against it, seeding the routing table with whatever nodes
/// those replies carry. A single unreachable or unresolvable seed does
/// not fail the whole bootstrap; only a complete wipeout is reported.
pub async fn bootstrap<S, C>(node: &DhtNode<S, C>, seeds: &[SocketAddr]) -> Result<usize, DhtError>
where
    S: crate::ports::DatagramSocket,
    C: crate::ports::Clock,
{
    if seeds.is_empty() {
        return Err(DhtError::NoSeeds);
    }

    let target = node.local_id();
    let mut reached = 0usize;
    for seed in seeds {
        let addr = Address::new(seed.ip(), seed.port());
        match node.ping(addr).await {
            Ok(_) => reached += 1,
            Err(e) => tracing::debug!(%addr, error = %e, "bootstrap seed unreachable"),
        }
    }

    if reached == 0 {
        return Err(DhtError::AllQueriesFailed);
    }

    // A find_node for our own id against whatever the table now holds
    // (freshly admitted seeds plus anything quarantine already promoted)
    // fans the table out beyond the immediate seed list.
    let _ = node.find_node(target).await;
    Ok(reached)
}
