//! Periodic sweeps: transaction deadlines, peer/token expiry, and secret
//! rotation. Grounded in the teacher's `PeerDiscoveryService::gc`/
//! `check_expired_challenges` timer-driven cleanup, retargeted at this
//! engine's own expiring state.
//!
//! `RateLimiter`'s idle-bucket eviction is deliberately not swept here: per
//! SPEC_FULL.md Section 4.1 it happens opportunistically inside `consume`,
//! not on a separate timer.

use rand::RngCore;

use crate::ports::{Clock, DatagramSocket};

use super::core::DhtNode;

/// Run one maintenance pass: expire timed-out transactions, expire stale
/// peer/token entries, and rotate the token secret if due. Intended to be
/// called from a `tokio::time::interval` loop by the host application.
pub fn run_once<S, C>(node: &DhtNode<S, C>)
where
    S: DatagramSocket,
    C: Clock,
{
    let mut engine = node.engine.lock().expect("engine mutex poisoned");
    let now = engine.now();

    let node_timeout = engine.config.node_timeout_secs;
    let timed_out = engine.transactions.expire_deadlines(now);
    for addr in timed_out {
        if let Some(mut stale) = engine.routing_table.get_by_address(&addr) {
            if !stale.stats.is_fresh(now, node_timeout) {
                engine.routing_table.remove(&stale.id);
            } else {
                stale.stats.record_failure();
                engine.routing_table.offer(stale, now);
            }
        }
    }

    let peer_timeout = engine.config.peer_timeout_secs;
    engine.peer_store.expire(now, peer_timeout);

    let token_validity = engine.config.token_validity_secs;
    engine.token_cache.expire(now, token_validity);

    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    engine.token_issuer.maybe_rotate(now, secret);
}

/// Drive `run_once` on a fixed interval until the process ends. Intended
/// to run alongside `DhtNode::run` in the host's event loop.
pub async fn run_forever<S, C>(node: &DhtNode<S, C>, interval_secs: u64)
where
    S: DatagramSocket,
    C: Clock,
{
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        run_once(node);
    }
}
