//! Iterative `find_node`/`get_peers` lookup state machine, shared by both
//! flavours and parameterised by the per-hop query kind.
//!
//! Reference: spec.md Section 4.7 (IterativeLookup)
//! Grounded in `dhtbot/protocols/krpc_iterator.py`'s `KRPC_Iterator`
//! (the source left `find_iterate`/`get_iterate`/`_iterate` as stubs;
//! the state machine below is this module's own realization of the
//! documented contract).

use std::collections::HashSet;

use super::entities::Address;
use super::errors::DhtError;
use super::node_id::{Distance, NodeId};
use super::token::Token;
use super::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    FindNode,
    GetPeers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unqueried,
    InFlight,
    Responded,
    Failed,
}

struct ShortlistEntry {
    node: Node,
    status: Status,
}

/// Result of a completed lookup. `nodes` is always populated; `peers`/
/// `tokens` are only meaningful for `LookupKind::GetPeers`.
#[derive(Debug, Default)]
pub struct LookupResult {
    pub nodes: Vec<Node>,
    pub peers: Vec<Address>,
    pub tokens: Vec<(NodeId, Token)>,
}

/// Per-lookup state: target id, parallelism, and the shortlist of
/// candidates ordered by distance to the target.
pub struct LookupState {
    target: NodeId,
    kind: LookupKind,
    k: usize,
    alpha: usize,
    shortlist: Vec<ShortlistEntry>,
    in_flight: usize,
    seen_ids: HashSet<NodeId>,
    new_peers: Vec<Address>,
    seen_peers: HashSet<Address>,
    tokens: Vec<(NodeId, Token)>,
    cancelled: bool,
}

impl LookupState {
    /// Seed the lookup from `seeds` (caller-provided or
    /// `RoutingTable::closest(target, k)`). Fails with `NoSeeds` if empty.
    pub fn seed(
        kind: LookupKind,
        target: NodeId,
        seeds: Vec<Node>,
        k: usize,
        alpha: usize,
    ) -> Result<Self, DhtError> {
        if seeds.is_empty() {
            return Err(DhtError::NoSeeds);
        }
        let mut state = Self {
            target,
            kind,
            k,
            alpha,
            shortlist: Vec::new(),
            in_flight: 0,
            seen_ids: HashSet::new(),
            new_peers: Vec::new(),
            seen_peers: HashSet::new(),
            tokens: Vec::new(),
            cancelled: false,
        };
        for node in seeds {
            state.insert_candidate(node);
        }
        Ok(state)
    }

    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    fn insert_candidate(&mut self, node: Node) {
        if !self.seen_ids.insert(node.id) {
            return;
        }
        self.shortlist.push(ShortlistEntry {
            node,
            status: Status::Unqueried,
        });
        let target = self.target;
        self.shortlist.sort_by(|a, b| {
            Distance::between(&a.node.id, &target).cmp(&Distance::between(&b.node.id, &target))
        });
    }

    /// External cancellation: stop issuing new hop queries. In-flight
    /// sub-queries still complete and update state but no longer feed
    /// further hops.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Pull as many unqueried candidates from the α·K-nearest window as
    /// fit under the `alpha` in-flight budget. Marks them `InFlight` and
    /// returns them for the caller to actually dispatch.
    pub fn next_batch(&mut self) -> Vec<Node> {
        if self.cancelled {
            return Vec::new();
        }
        let window = self.alpha.saturating_mul(self.k);
        let mut batch = Vec::new();
        for entry in self.shortlist.iter_mut().take(window) {
            if self.in_flight + batch.len() >= self.alpha {
                break;
            }
            if entry.status == Status::Unqueried {
                entry.status = Status::InFlight;
                batch.push(entry.node.clone());
            }
        }
        self.in_flight += batch.len();
        batch
    }

    /// Fold in a response from `responder`: newly-seen nodes extend the
    /// shortlist, `values` contribute to discovered peers (get_iterate
    /// only), and a `token` is remembered against its source node.
    pub fn on_response(
        &mut self,
        responder: NodeId,
        nodes: Vec<Node>,
        values: Option<Vec<Address>>,
        token: Option<Token>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.mark(responder, Status::Responded);

        for node in nodes {
            self.insert_candidate(node);
        }
        if let Some(values) = values {
            for addr in values {
                if self.seen_peers.insert(addr) {
                    self.new_peers.push(addr);
                }
            }
        }
        if let Some(token) = token {
            self.tokens.push((responder, token));
        }
    }

    /// Fold in a timeout or remote KRPC error for `responder`: decrement
    /// in-flight and mark it failed; it is never re-queried.
    pub fn on_failure(&mut self, responder: NodeId) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.mark(responder, Status::Failed);
    }

    fn mark(&mut self, id: NodeId, status: Status) {
        if let Some(entry) = self.shortlist.iter_mut().find(|e| e.node.id == id) {
            // Responses/failures for entries already marked Failed (e.g. a
            // late timeout firing after cancellation) are ignored.
            if entry.status == Status::InFlight {
                entry.status = status;
            }
        }
    }

    /// True once no unqueried candidate remains in the K nearest known and
    /// no query is in flight. The overall lookup deadline (termination
    /// condition (b)) is enforced by the caller — see
    /// `service::api::DhtNode::run_lookup`'s `tokio::time::sleep_until`
    /// race against this state's in-flight futures.
    pub fn is_done(&self) -> bool {
        if self.in_flight != 0 {
            return false;
        }
        !self
            .shortlist
            .iter()
            .take(self.k)
            .any(|e| e.status == Status::Unqueried)
    }

    /// Finalize the lookup. Fails with `AllQueriesFailed` if every issued
    /// query failed and no new nodes were ever discovered.
    pub fn finish(self) -> Result<LookupResult, DhtError> {
        let any_responded = self
            .shortlist
            .iter()
            .any(|e| e.status == Status::Responded);
        let any_queried = self
            .shortlist
            .iter()
            .any(|e| matches!(e.status, Status::Responded | Status::Failed));

        if any_queried && !any_responded {
            return Err(DhtError::AllQueriesFailed);
        }

        let mut nodes: Vec<Node> = self.shortlist.into_iter().map(|e| e.node).collect();
        nodes.truncate(self.k);

        Ok(LookupResult {
            nodes,
            peers: self.new_peers,
            tokens: self.tokens,
        })
    }
}
