//! `DhtNode`: the host-facing actor that owns a `KrpcEngine` and a socket
//! and drives both the receive loop and outbound queries.
//!
//! Grounded in the teacher's `PeerDiscoveryService` (a thin wrapper around
//! the domain layer exposing a driving port), generalized here to also own
//! the socket and run the event loop, since a DHT node is a network
//! service rather than a library called synchronously by a host.
//!
//! The engine is held behind a plain `std::sync::Mutex`, not
//! `tokio::sync::Mutex`: every critical section below is synchronous start
//! to finish (no `.await` while the lock is held), so the lock is never a
//! suspension point. That keeps the single-owner mutation model of
//! SPEC_FULL.md Section 5 intact — exactly one logical actor mutates
//! engine state at a time — while still letting `DhtApi`'s `&self` methods
//! be called concurrently by multiple callers (the receive loop and
//! however many in-flight lookups a host has started).

use std::sync::Mutex;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::config::DhtConfig;
use crate::domain::{Address, Admit, DhtError, Node, NodeId, TransactionOutcome};
use crate::engine::KrpcEngine;
use crate::ports::{Clock, DatagramSocket};
use crate::wire::QueryArgs;

use super::events::DhtEvent;

pub struct DhtNode<S, C> {
    pub(super) engine: Mutex<KrpcEngine<C>>,
    pub(super) socket: S,
    pub(super) events: Mutex<Option<mpsc::UnboundedSender<DhtEvent>>>,
}

impl<S, C> DhtNode<S, C>
where
    S: DatagramSocket,
    C: Clock,
{
    pub fn new(local_id: NodeId, config: DhtConfig, socket: S, clock: C) -> Self {
        Self {
            engine: Mutex::new(KrpcEngine::new(local_id, config, clock)),
            socket,
            events: Mutex::new(None),
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.engine.lock().expect("engine mutex poisoned").local_id
    }

    /// Subscribe to node lifecycle events. Only the most recent subscriber
    /// is kept; dropping the receiver silently stops delivery.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DhtEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().expect("events mutex poisoned") = Some(tx);
        rx
    }

    fn emit(&self, event: DhtEvent) {
        let guard = self.events.lock().expect("events mutex poisoned");
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Encode and register a query, transmit it, then await its outcome.
    /// The lock is held only across `start_query`, which never awaits.
    pub(super) async fn send_query_raw(
        &self,
        method: &str,
        args: QueryArgs,
        addr: Address,
    ) -> Result<TransactionOutcome, DhtError> {
        let (bytes, rx) = {
            let mut engine = self.engine.lock().expect("engine mutex poisoned");
            engine.start_query(method, args, addr)?
        };
        self.socket.send_to(&bytes, addr).await?;
        Ok(rx.await.unwrap_or(TransactionOutcome::Timeout))
    }

    /// Run the `alpha`-wide concurrent ping loop that resolves a
    /// quarantined node's probation, applying `Quarantine::on_ping_result`
    /// after each attempt until the node is promoted or discarded.
    pub(super) async fn drive_quarantine_probe(&self, id: NodeId, addr: Address) {
        loop {
            let outcome = self.send_query_raw("ping", QueryArgs::default(), addr).await;
            let succeeded = matches!(outcome, Ok(TransactionOutcome::Response { .. }));
            let decision = {
                let mut engine = self.engine.lock().expect("engine mutex poisoned");
                engine.quarantine.on_ping_result(&id, succeeded)
            };
            match decision {
                Admit::Promote => {
                    let mut engine = self.engine.lock().expect("engine mutex poisoned");
                    let now = engine.now();
                    engine.routing_table.offer(Node::new(id, addr, now), now);
                    drop(engine);
                    self.emit(DhtEvent::NodeAdmitted { id, address: addr });
                    break;
                }
                Admit::PingAgain => continue,
                Admit::Discard => {
                    self.emit(DhtEvent::NodeDiscarded { id });
                    break;
                }
            }
        }
    }

    /// Receive loop: read datagrams, dispatch them through the engine,
    /// transmit replies, and drive any resulting quarantine probe
    /// concurrently with continuing to receive. Runs until the socket
    /// itself errors (e.g. closed).
    ///
    /// `in_flight_probes` bounds concurrent probation pings so a burst of
    /// unknown senders cannot spawn unbounded work within this loop.
    pub async fn run(&self) -> Result<(), DhtError> {
        let mut probes = FuturesUnordered::new();
        loop {
            tokio::select! {
                biased;
                datagram = self.socket.recv_from() => {
                    let (bytes, from) = datagram?;
                    let inbound = {
                        let mut engine = self.engine.lock().expect("engine mutex poisoned");
                        engine.on_datagram(&bytes, from)
                    };
                    if let Some((to, reply)) = inbound.reply {
                        self.socket.send_to(&reply, to).await?;
                    }
                    if let Some((id, addr)) = inbound.probe_ping {
                        self.emit(DhtEvent::NodeQuarantined { id, address: addr });
                        probes.push(self.drive_quarantine_probe(id, addr));
                    }
                    if let Some((infohash, peer)) = inbound.announced {
                        self.emit(DhtEvent::PeerAnnounced { infohash, peer });
                    }
                }
                Some(()) = probes.next(), if !probes.is_empty() => {}
            }
        }
    }
}
