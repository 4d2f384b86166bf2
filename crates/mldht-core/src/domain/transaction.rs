//! Outstanding-query bookkeeping: unique transaction ids, deadlines, and
//! exactly-once completion.
//!
//! Reference: spec.md Section 4.5 (TransactionTable & KRPCEngine)
//! Grounded in `dhtbot/protocols/krpc_sender.py`'s `KRPC_Sender`
//! (`_generate_transaction_id` rejection sampling, `Transaction`/deferred
//! pairing, `_remove_transaction_bothback` exactly-once removal).

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::oneshot;

use super::entities::{Address, Timestamp};
use super::errors::DhtError;
use super::node_id::NodeId;
use super::token::Token;

/// A transaction id. Mainline uses short variable-length byte strings; a
/// 16-bit value (as in the source this is distilled from) is sufficient
/// and is what is used here (open decision, recorded in DESIGN.md).
pub type Tid = u16;

/// Outcome handed to the waiter when a transaction completes.
#[derive(Debug)]
pub enum TransactionOutcome {
    Response {
        /// The `id` every KRPC response carries, regardless of method.
        responder_id: NodeId,
        /// Compact nodes from the `nodes` field, if present (`find_node`,
        /// and `get_peers` when the target has no stored peers).
        nodes: Vec<(NodeId, Address)>,
        /// Compact peer values from the `values` field, if present
        /// (`get_peers` when the target has stored peers).
        values: Vec<Address>,
        /// The announce token, if present (`get_peers` only).
        token: Option<Token>,
    },
    RemoteError {
        code: i32,
        message: String,
    },
    Timeout,
}

struct Transaction {
    remote: Address,
    sent_at: Timestamp,
    deadline: Timestamp,
    completion: oneshot::Sender<TransactionOutcome>,
}

/// Tracks outstanding queries keyed by transaction id. Ids are drawn
/// uniformly from the 16-bit space by rejection sampling against the
/// currently-outstanding set.
#[derive(Default)]
pub struct TransactionTable {
    outstanding: HashMap<Tid, Transaction>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self {
            outstanding: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Allocate a fresh tid and register a pending transaction sent at
    /// `sent_at` with the given deadline. Returns the tid and a receiver
    /// that resolves when the transaction completes (response, remote
    /// error, or timeout).
    pub fn insert(
        &mut self,
        remote: Address,
        sent_at: Timestamp,
        deadline: Timestamp,
    ) -> Result<(Tid, oneshot::Receiver<TransactionOutcome>), DhtError> {
        if self.outstanding.len() >= u16::MAX as usize {
            return Err(DhtError::ResourceExhausted);
        }
        let mut rng = rand::thread_rng();
        let tid = loop {
            let candidate: Tid = rng.gen();
            if !self.outstanding.contains_key(&candidate) {
                break candidate;
            }
        };
        let (tx, rx) = oneshot::channel();
        self.outstanding.insert(
            tid,
            Transaction {
                remote,
                sent_at,
                deadline,
                completion: tx,
            },
        );
        Ok((tid, rx))
    }

    pub fn remote_of(&self, tid: Tid) -> Option<Address> {
        self.outstanding.get(&tid).map(|t| t.remote)
    }

    /// When the query behind `tid` was sent, if still outstanding. Used to
    /// compute round-trip time on a matching response.
    pub fn sent_at(&self, tid: Tid) -> Option<Timestamp> {
        self.outstanding.get(&tid).map(|t| t.sent_at)
    }

    /// Complete a transaction exactly once, removing it from the table.
    /// Returns `false` if `tid` was unknown (orphan reply) or the remote
    /// address does not match (late/spoofed reply dropped).
    pub fn complete(&mut self, tid: Tid, from: Address, outcome: TransactionOutcome) -> bool {
        match self.outstanding.remove(&tid) {
            Some(txn) if txn.remote == from => {
                let _ = txn.completion.send(outcome);
                true
            }
            Some(txn) => {
                // Remote mismatch: put it back, this wasn't the reply.
                self.outstanding.insert(tid, txn);
                false
            }
            None => false,
        }
    }

    /// Remove and fail every transaction whose deadline has passed.
    /// Intended to be driven by the injected `Scheduler`/timer wheel.
    pub fn expire_deadlines(&mut self, now: Timestamp) -> Vec<Address> {
        let expired: Vec<Tid> = self
            .outstanding
            .iter()
            .filter(|(_, txn)| now >= txn.deadline)
            .map(|(tid, _)| *tid)
            .collect();

        let mut remotes = Vec::with_capacity(expired.len());
        for tid in expired {
            if let Some(txn) = self.outstanding.remove(&tid) {
                remotes.push(txn.remote);
                let _ = txn.completion.send(TransactionOutcome::Timeout);
            }
        }
        remotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> Address {
        Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 6881)
    }

    #[tokio::test]
    async fn complete_resolves_the_receiver_exactly_once() {
        let mut table = TransactionTable::new();
        let (tid, rx) = table.insert(addr(), Timestamp::new(0), Timestamp::new(100)).unwrap();
        assert!(table.complete(
            tid,
            addr(),
            TransactionOutcome::Response {
                responder_id: NodeId::new([9u8; 20]),
                nodes: vec![],
                values: vec![],
                token: None,
            }
        ));
        assert!(table.is_empty());
        assert!(matches!(
            rx.await.unwrap(),
            TransactionOutcome::Response { .. }
        ));
    }

    #[test]
    fn unknown_tid_is_dropped_as_orphan() {
        let mut table = TransactionTable::new();
        assert!(!table.complete(42, addr(), TransactionOutcome::Timeout));
    }

    #[test]
    fn mismatched_remote_address_is_not_completed() {
        let mut table = TransactionTable::new();
        let (tid, _rx) = table.insert(addr(), Timestamp::new(0), Timestamp::new(100)).unwrap();
        let other = Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)), 1);
        assert!(!table.complete(tid, other, TransactionOutcome::Timeout));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn expire_deadlines_times_out_past_due_transactions() {
        let mut table = TransactionTable::new();
        let (_tid, rx) = table.insert(addr(), Timestamp::new(0), Timestamp::new(10)).unwrap();
        let expired = table.expire_deadlines(Timestamp::new(10));
        assert_eq!(expired, vec![addr()]);
        assert!(matches!(rx.await.unwrap(), TransactionOutcome::Timeout));
    }

    #[test]
    fn distinct_outstanding_transactions_get_distinct_tids() {
        let mut table = TransactionTable::new();
        let (tid1, _r1) = table.insert(addr(), Timestamp::new(0), Timestamp::new(100)).unwrap();
        let (tid2, _r2) = table.insert(addr(), Timestamp::new(0), Timestamp::new(100)).unwrap();
        assert_ne!(tid1, tid2);
    }
}
