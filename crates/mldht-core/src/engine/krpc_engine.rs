//! Wires the pure domain types to the wire codec and a clock: encodes
//! outgoing queries and registers their transactions, decodes and
//! dispatches incoming datagrams, and applies transaction-completion
//! effects to the routing table.
//!
//! Deliberately socket-free: `start_query` returns the bytes to transmit
//! rather than sending them itself, and `on_datagram` never performs I/O.
//! This keeps the engine synchronous and lets its host (`service::DhtNode`)
//! hold it behind a single mutex without ever awaiting while holding the
//! lock, matching the single-executor model of spec.md Section 5.
//!
//! Reference: spec.md Section 4.5 (TransactionTable & KRPCEngine).

use tokio::sync::oneshot;

use crate::config::DhtConfig;
use crate::domain::{
    Address, DhtError, Node, NodeId, PeerStore, Quarantine, RateLimiter, RoutingTable, Timestamp,
    Token, TokenCache, TokenIssuer, TransactionOutcome, TransactionTable,
};
use crate::ports::Clock;
use crate::wire::{self, Message, MessageBody, QueryArgs, ResponseValues};

/// Bencode KRPC error codes (Section 6).
pub mod error_code {
    pub const GENERIC: i64 = 201;
    pub const SERVER: i64 = 202;
    pub const PROTOCOL: i64 = 203;
    pub const METHOD_UNKNOWN: i64 = 204;
}

/// The effects of processing one inbound datagram. `reply` and
/// `probe_ping` are independent: a query from a still-unknown node both
/// gets answered *and* triggers a probation ping, so both may be set at
/// once. Both require I/O the engine itself never performs: the caller
/// transmits `reply` and, if `probe_ping` is set, drives the quarantine
/// ping via `start_query`.
#[derive(Debug, Default)]
pub struct Inbound {
    pub reply: Option<(Address, Vec<u8>)>,
    pub probe_ping: Option<(NodeId, Address)>,
    pub announced: Option<(NodeId, Address)>,
}

pub struct KrpcEngine<C> {
    pub local_id: NodeId,
    pub config: DhtConfig,
    pub routing_table: RoutingTable,
    pub peer_store: PeerStore,
    pub token_issuer: TokenIssuer,
    pub quarantine: Quarantine,
    pub outbound_limiter: RateLimiter,
    pub inbound_limiter: RateLimiter,
    pub transactions: TransactionTable,
    /// Tokens this node has received as a client, for announces issued
    /// outside the `get_peers` lookup that discovered them.
    pub token_cache: TokenCache,
    clock: C,
}

impl<C: Clock> KrpcEngine<C> {
    pub fn new(local_id: NodeId, config: DhtConfig, clock: C) -> Self {
        let now = clock.now();
        let outbound_limiter = RateLimiter::new(
            config.global_bandwidth_rate,
            config.global_bandwidth_rate,
            config.host_bandwidth_rate,
            config.host_bandwidth_rate,
            now,
        );
        let inbound_limiter = RateLimiter::new(
            config.global_bandwidth_rate,
            config.global_bandwidth_rate,
            config.host_bandwidth_rate,
            config.host_bandwidth_rate,
            now,
        );
        Self {
            local_id,
            routing_table: RoutingTable::new(local_id, config.k),
            token_issuer: TokenIssuer::new(now, config.secret_rotation_secs, rand_secret()),
            peer_store: PeerStore::new(),
            quarantine: Quarantine::new(),
            outbound_limiter,
            inbound_limiter,
            transactions: TransactionTable::new(),
            token_cache: TokenCache::new(),
            config,
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Begin sending a query, following Section 4.5's first four steps:
    /// fill in the local id and a fresh tid, encode, rate-limit, register
    /// the transaction. Returns the encoded bytes for the caller to
    /// transmit and a receiver that resolves when the transaction
    /// completes (response, remote error, or timeout).
    pub fn start_query(
        &mut self,
        method: &str,
        mut args: QueryArgs,
        addr: Address,
    ) -> Result<(Vec<u8>, oneshot::Receiver<TransactionOutcome>), DhtError> {
        args.id = wire::encode_id(&self.local_id);

        let now = self.clock.now();
        if !self.outbound_limiter.consume(addr, 1, now) {
            tracing::debug!(%addr, "outbound rate limit denied query");
            return Err(DhtError::RateLimited);
        }

        let deadline = now.add_secs(self.config.rpc_timeout_secs);
        let (tid, rx) = self.transactions.insert(addr, now, deadline)?;
        let message = Message::query(tid.to_be_bytes().to_vec(), method, args);
        let bytes = message.encode()?;

        Ok((bytes, rx))
    }

    /// Process one inbound datagram. Synchronous: dispatching a reply or
    /// applying transaction-completion effects never itself performs I/O;
    /// the caller transmits `Inbound::reply` and, if `Inbound::probe_ping`
    /// is set, issues a `ping` via `start_query`.
    pub fn on_datagram(&mut self, bytes: &[u8], from: Address) -> Inbound {
        let now = self.clock.now();
        if !self.inbound_limiter.consume(from, 1, now) {
            tracing::debug!(%from, "inbound rate limit dropped datagram");
            return Inbound::default();
        }

        let message = match Message::decode(bytes) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(%from, error = %e, "dropping malformed datagram");
                return Inbound::default();
            }
        };

        match message.body {
            MessageBody::Query { method, args } => {
                self.dispatch_query(message.transaction_id, method, args, from)
            }
            MessageBody::Response(values) => {
                self.complete_response(message.transaction_id, values, from)
            }
            MessageBody::Error { code, message: msg } => {
                self.complete_error(message.transaction_id, code, msg, from)
            }
        }
    }

    fn dispatch_query(
        &mut self,
        tid: Vec<u8>,
        method: String,
        args: QueryArgs,
        from: Address,
    ) -> Inbound {
        let querier_id = match wire::decode_id(&args.id) {
            Ok(id) => id,
            Err(_) => return Inbound::default(),
        };
        let now = self.clock.now();
        let mut announced = None;

        let reply = match method.as_str() {
            "ping" => Some(ResponseValues {
                id: wire::encode_id(&self.local_id),
                ..Default::default()
            }),
            "find_node" => {
                let target = args
                    .target
                    .as_ref()
                    .and_then(|t| wire::decode_id(t).ok())
                    .unwrap_or(querier_id);
                let nodes = self.routing_table.closest(&target, self.config.k);
                Some(ResponseValues {
                    id: wire::encode_id(&self.local_id),
                    nodes: Some(serde_bytes::ByteBuf::from(encode_node_list(&nodes))),
                    ..Default::default()
                })
            }
            "get_peers" => {
                let info_hash = match args.info_hash.as_ref().and_then(|h| wire::decode_id(h).ok()) {
                    Some(h) => h,
                    None => return Inbound::default(),
                };
                let peers = self.peer_store.get(&info_hash);
                let token = self.token_issuer.generate(&info_hash, &from, now);
                let token_buf = serde_bytes::ByteBuf::from(token.0);
                Some(if peers.is_empty() {
                    let nodes = self.routing_table.closest(&info_hash, self.config.k);
                    ResponseValues {
                        id: wire::encode_id(&self.local_id),
                        token: Some(token_buf),
                        nodes: Some(serde_bytes::ByteBuf::from(encode_node_list(&nodes))),
                        ..Default::default()
                    }
                } else {
                    let values = crate::wire::compact::encode_peers(&peers)
                        .into_iter()
                        .map(serde_bytes::ByteBuf::from)
                        .collect();
                    ResponseValues {
                        id: wire::encode_id(&self.local_id),
                        token: Some(token_buf),
                        values: Some(values),
                        ..Default::default()
                    }
                })
            }
            "announce_peer" => {
                let info_hash = match args.info_hash.as_ref().and_then(|h| wire::decode_id(h).ok()) {
                    Some(h) => h,
                    None => return Inbound::default(),
                };
                let token = match args.token.as_ref() {
                    Some(t) => Token(t.to_vec()),
                    None => return Inbound::default(),
                };
                if !self.token_issuer.verify(&token, &info_hash, &from, now, self.config.token_validity_secs) {
                    // Invalid or expired token: silently drop. Never an oracle for probing.
                    tracing::debug!(%from, "dropping announce_peer with invalid or expired token");
                    return Inbound::default();
                }
                let port = if args.implied_port == Some(1) {
                    from.port
                } else {
                    args.port.unwrap_or(from.port as i64) as u16
                };
                let announced_at = Address::new(from.ip, port);
                self.peer_store.put(info_hash, announced_at, now);
                announced = Some((info_hash, announced_at));
                Some(ResponseValues {
                    id: wire::encode_id(&self.local_id),
                    ..Default::default()
                })
            }
            _ => {
                tracing::debug!(%from, method, "unknown rpctype, replying MethodUnknown");
                let err = Message::error(tid, error_code::METHOD_UNKNOWN, "Method Unknown".to_string());
                return match err.encode() {
                    Ok(bytes) => Inbound {
                        reply: Some((from, bytes)),
                        probe_ping: None,
                        announced: None,
                    },
                    Err(_) => Inbound::default(),
                };
            }
        };

        let probe = self.admit_or_probe(querier_id, from, None);

        let reply_effect = reply.and_then(|values| {
            let response = Message::response(tid, values);
            response.encode().ok().map(|bytes| (from, bytes))
        });

        Inbound {
            reply: reply_effect,
            probe_ping: probe.map(|addr| (querier_id, addr)),
            announced,
        }
    }

    fn complete_response(&mut self, tid_bytes: Vec<u8>, values: ResponseValues, from: Address) -> Inbound {
        let Some(tid) = decode_tid(&tid_bytes) else {
            return Inbound::default();
        };
        let Ok(id) = wire::decode_id(&values.id) else {
            return Inbound::default();
        };

        let nodes = values
            .nodes
            .as_ref()
            .map(|b| wire::compact::decode_nodes(b).unwrap_or_default())
            .unwrap_or_default();
        let peer_values = values
            .values
            .as_ref()
            .map(|v| {
                let raw: Vec<Vec<u8>> = v.iter().map(|b| b.to_vec()).collect();
                wire::compact::decode_peers(&raw).unwrap_or_default()
            })
            .unwrap_or_default();
        let token = values.token.as_ref().map(|t| Token(t.to_vec()));
        let sent_at = self.transactions.sent_at(tid);

        let completed = self.transactions.complete(
            tid,
            from,
            TransactionOutcome::Response {
                responder_id: id,
                nodes,
                values: peer_values,
                token,
            },
        );

        if completed {
            // A valid response is itself evidence of liveness: it satisfies
            // the probationary ping requirement just as a dedicated `ping`
            // would (spec.md Section 4.5's completion effects), and updates
            // the responder's success count and cumulative RTT.
            let now = self.clock.now();
            let rtt_ms = sent_at.map(|sent| now.since(sent).saturating_mul(1000)).unwrap_or(0);
            self.admit_or_probe(id, from, Some(rtt_ms));
        }

        Inbound::default()
    }

    fn complete_error(&mut self, tid_bytes: Vec<u8>, code: i64, message: String, from: Address) -> Inbound {
        if let Some(tid) = decode_tid(&tid_bytes) {
            if let Some(remote) = self.transactions.remote_of(tid) {
                if remote == from {
                    self.transactions.complete(
                        tid,
                        from,
                        TransactionOutcome::RemoteError {
                            code: code as i32,
                            message,
                        },
                    );
                    if let Some(mut node) = self.routing_table.get_by_address(&remote) {
                        node.stats.record_failure();
                        let now = self.clock.now();
                        self.routing_table.offer(node, now);
                    }
                }
            }
        }
        Inbound::default()
    }

    /// If `id` is already routed, refresh it, merging in a success record
    /// when `success_rtt_ms` carries one rather than overwriting its
    /// accumulated stats. If this is a response to our own query
    /// (`success_rtt_ms` is `Some`), treat it as a successful probation
    /// ping and admit immediately. Otherwise, if unknown and not already on
    /// probation, enqueue it in Quarantine and ask the caller to ping it.
    fn admit_or_probe(&mut self, id: NodeId, addr: Address, success_rtt_ms: Option<u64>) -> Option<Address> {
        let now = self.clock.now();
        if let Some(mut node) = self.routing_table.get_node(&id) {
            node.address = addr;
            match success_rtt_ms {
                Some(rtt_ms) => node.stats.record_success(now, rtt_ms),
                None => node.stats.last_seen = now,
            }
            self.routing_table.offer(node, now);
            return None;
        }
        if let Some(rtt_ms) = success_rtt_ms {
            self.quarantine.on_ping_result(&id, true);
            let mut node = Node::new(id, addr, now);
            node.stats.record_success(now, rtt_ms);
            self.routing_table.offer(node, now);
            return None;
        }
        if self.quarantine.is_quarantined(&id) {
            return None;
        }
        tracing::debug!(?id, %addr, "jailing previously-unknown node in quarantine");
        self.quarantine.jail(id);
        Some(addr)
    }
}

fn encode_node_list(nodes: &[Node]) -> Vec<u8> {
    let pairs: Vec<(NodeId, Address)> = nodes.iter().map(|n| (n.id, n.address)).collect();
    crate::wire::compact::encode_nodes(&pairs)
}

fn decode_tid(bytes: &[u8]) -> Option<u16> {
    if bytes.len() != 2 {
        return None;
    }
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn rand_secret() -> [u8; 32] {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
