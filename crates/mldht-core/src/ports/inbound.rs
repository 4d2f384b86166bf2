//! Driving port (inbound API): what a host application can ask the DHT
//! node to do.

use crate::domain::{Address, DhtError, LookupResult, Node, NodeId};

#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingTableStats {
    pub total_nodes: usize,
    pub total_buckets: usize,
    pub outstanding_transactions: usize,
}

/// Primary API surface of a running DHT node.
pub trait DhtApi: Send + Sync {
    /// Ping a single address; resolves with the responder's id on success.
    fn ping(
        &self,
        target: Address,
    ) -> impl std::future::Future<Output = Result<Node, DhtError>> + Send;

    /// Iteratively locate the nodes closest to `target`.
    fn find_node(
        &self,
        target: NodeId,
    ) -> impl std::future::Future<Output = Result<LookupResult, DhtError>> + Send;

    /// Iteratively locate peers announced for `info_hash`, collecting
    /// announce tokens from responders along the way.
    fn get_peers(
        &self,
        info_hash: NodeId,
    ) -> impl std::future::Future<Output = Result<LookupResult, DhtError>> + Send;

    /// Announce this node as a peer for `info_hash` on `port` (or the
    /// query's source port, if `port` is `None` and the remote honours
    /// `implied_port`), using tokens collected by a prior `get_peers`.
    fn announce(
        &self,
        info_hash: NodeId,
        port: Option<u16>,
    ) -> impl std::future::Future<Output = Result<(), DhtError>> + Send;

    fn stats(&self) -> RoutingTableStats;
}
