//! `DhtApi` implementation: the four driving operations a host calls,
//! each driving the iterative lookup state machine with `alpha` queries
//! concurrently in flight via `FuturesUnordered`.

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;

use crate::domain::{
    Address, DhtError, LookupKind, LookupResult, LookupState, Node, NodeId, TransactionOutcome,
};
use crate::ports::{Clock, DatagramSocket, DhtApi, RoutingTableStats};
use crate::wire::{self, QueryArgs};

use super::core::DhtNode;

impl<S, C> DhtApi for DhtNode<S, C>
where
    S: DatagramSocket,
    C: Clock,
{
    async fn ping(&self, target: Address) -> Result<Node, DhtError> {
        let outcome = self.send_query_raw("ping", QueryArgs::default(), target).await?;
        match outcome {
            TransactionOutcome::Response { responder_id, .. } => {
                let engine = self.engine.lock().expect("engine mutex poisoned");
                // The response datagram was already admitted via
                // `KrpcEngine::on_datagram`, which updates `NodeStats` in
                // place; re-offering a freshly-zeroed `Node` here would
                // wipe out the success count and RTT it just recorded.
                let now = engine.now();
                let node = engine
                    .routing_table
                    .get_node(&responder_id)
                    .unwrap_or_else(|| Node::new(responder_id, target, now));
                Ok(node)
            }
            TransactionOutcome::RemoteError { code, message } => {
                Err(DhtError::RemoteKrpcError { code, message })
            }
            TransactionOutcome::Timeout => Err(DhtError::Timeout),
        }
    }

    async fn find_node(&self, target: NodeId) -> Result<LookupResult, DhtError> {
        self.run_lookup(LookupKind::FindNode, target).await
    }

    async fn get_peers(&self, info_hash: NodeId) -> Result<LookupResult, DhtError> {
        let result = self.run_lookup(LookupKind::GetPeers, info_hash).await?;
        let mut engine = self.engine.lock().expect("engine mutex poisoned");
        let now = engine.now();
        for (responder, token) in &result.tokens {
            if let Some(node) = engine.routing_table.get_node(responder) {
                engine
                    .token_cache
                    .remember(info_hash, node.address, token.clone(), now);
            }
        }
        Ok(result)
    }

    async fn announce(&self, info_hash: NodeId, port: Option<u16>) -> Result<(), DhtError> {
        let targets: Vec<(NodeId, Address, crate::domain::Token)> = {
            let engine = self.engine.lock().expect("engine mutex poisoned");
            let now = engine.now();
            engine
                .routing_table
                .closest(&info_hash, engine.config.k)
                .into_iter()
                .filter_map(|node| {
                    engine
                        .token_cache
                        .get(&info_hash, &node.address, now, engine.config.token_validity_secs)
                        .map(|token| (node.id, node.address, token.clone()))
                })
                .collect()
        };

        if targets.is_empty() {
            return Err(DhtError::NoSeeds);
        }

        let mut in_flight = FuturesUnordered::new();
        for (_, addr, token) in targets {
            let args = QueryArgs {
                info_hash: Some(wire::encode_id(&info_hash)),
                token: Some(serde_bytes::ByteBuf::from(token.0)),
                port: port.map(|p| p as i64),
                implied_port: if port.is_none() { Some(1) } else { None },
                ..Default::default()
            };
            in_flight.push(self.send_query_raw("announce_peer", args, addr));
        }

        let mut any_ok = false;
        while let Some(result) = in_flight.next().await {
            if matches!(result, Ok(TransactionOutcome::Response { .. })) {
                any_ok = true;
            }
        }

        if any_ok {
            Ok(())
        } else {
            Err(DhtError::AllQueriesFailed)
        }
    }

    fn stats(&self) -> RoutingTableStats {
        let engine = self.engine.lock().expect("engine mutex poisoned");
        RoutingTableStats {
            total_nodes: engine.routing_table.len(),
            total_buckets: engine.routing_table.bucket_count(),
            outstanding_transactions: engine.transactions.len(),
        }
    }
}

impl<S, C> DhtNode<S, C>
where
    S: DatagramSocket,
    C: Clock,
{
    /// Drive a `find_node`/`get_peers` lookup to completion, keeping up to
    /// `alpha` sub-queries in flight concurrently (spec.md Section 4.7
    /// (IterativeLookup)).
    ///
    /// Enforces the overall lookup deadline from spec.md Section 4.7
    /// termination condition (b)/Section 5: once `lookup_deadline_secs`
    /// elapses, no further hops are issued (mirroring external
    /// cancellation) and the lookup finishes with whatever was collected
    /// so far, rather than hanging on a slow or unresponsive shortlist.
    pub(super) async fn run_lookup(
        &self,
        kind: LookupKind,
        target: NodeId,
    ) -> Result<LookupResult, DhtError> {
        let (seeds, k, alpha, lookup_deadline_secs) = {
            let engine = self.engine.lock().expect("engine mutex poisoned");
            (
                engine.routing_table.closest(&target, engine.config.k),
                engine.config.k,
                engine.config.alpha,
                engine.config.lookup_deadline_secs,
            )
        };
        let mut state = LookupState::seed(kind, target, seeds, k, alpha)?;
        let mut in_flight = FuturesUnordered::new();
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(lookup_deadline_secs);

        loop {
            for node in state.next_batch() {
                let args = match kind {
                    LookupKind::FindNode => QueryArgs {
                        target: Some(wire::encode_id(&target)),
                        ..Default::default()
                    },
                    LookupKind::GetPeers => QueryArgs {
                        info_hash: Some(wire::encode_id(&target)),
                        ..Default::default()
                    },
                };
                let method = match kind {
                    LookupKind::FindNode => "find_node",
                    LookupKind::GetPeers => "get_peers",
                };
                let responder = node.id;
                let addr = node.address;
                in_flight.push(async move {
                    (responder, self.send_query_raw(method, args, addr).await)
                });
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    state.cancel();
                    break;
                }
                Some((responder, result)) = in_flight.next() => {
                    match result {
                        Ok(TransactionOutcome::Response { nodes, values, token, .. }) => {
                            let now = self.engine.lock().expect("engine mutex poisoned").now();
                            let node_list: Vec<Node> = nodes
                                .into_iter()
                                .map(|(id, addr)| Node::new(id, addr, now))
                                .collect();
                            let peers = if values.is_empty() { None } else { Some(values) };
                            state.on_response(responder, node_list, peers, token);
                        }
                        Ok(TransactionOutcome::RemoteError { .. }) | Ok(TransactionOutcome::Timeout) | Err(_) => {
                            state.on_failure(responder);
                        }
                    }
                }
            }
        }

        state.finish()
    }
}
