//! Probationary admission filter for previously-unknown nodes.
//!
//! Reference: spec.md Section 4.6 (Quarantine)
//! Grounded in `dhtbot/extensions/quarantine.py`'s `Quarantine` (prison
//! set, jail/free/execute, "one more chance" before discarding).

use std::collections::HashMap;

use super::node_id::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Awaiting the result of the first probationary ping.
    AwaitingFirstPing,
    /// First ping failed or timed out; one more chance remains.
    AwaitingSecondPing,
}

/// A probationary set: nodes enqueued here must answer at least one of
/// two successive pings before being admitted to the routing table.
///
/// A node already in Quarantine is not re-enqueued (duplicates are
/// ignored per the open-question decision recorded in DESIGN.md).
#[derive(Debug, Default)]
pub struct Quarantine {
    prisoners: HashMap<NodeId, Stage>,
}

pub enum Admit {
    /// The node should be promoted to the routing table.
    Promote,
    /// The node should be pinged again; it remains in Quarantine.
    PingAgain,
    /// The node failed definitively and must be discarded.
    Discard,
}

impl Quarantine {
    pub fn new() -> Self {
        Self {
            prisoners: HashMap::new(),
        }
    }

    /// Enqueue a newly-contacted, previously-unknown node. No-op if
    /// already quarantined (the caller is expected to also check the
    /// routing table before calling this).
    pub fn jail(&mut self, id: NodeId) {
        self.prisoners.entry(id).or_insert(Stage::AwaitingFirstPing);
    }

    pub fn is_quarantined(&self, id: &NodeId) -> bool {
        self.prisoners.contains_key(id)
    }

    /// Record the result of a probationary ping. Returns the admission
    /// decision; `Promote` and `Discard` both remove the node from
    /// Quarantine, `PingAgain` leaves it queued for the second chance.
    pub fn on_ping_result(&mut self, id: &NodeId, succeeded: bool) -> Admit {
        if succeeded {
            self.prisoners.remove(id);
            return Admit::Promote;
        }
        match self.prisoners.get(id).copied() {
            Some(Stage::AwaitingFirstPing) => {
                self.prisoners.insert(*id, Stage::AwaitingSecondPing);
                Admit::PingAgain
            }
            Some(Stage::AwaitingSecondPing) | None => {
                self.prisoners.remove(id);
                Admit::Discard
            }
        }
    }

    pub fn len(&self) -> usize {
        self.prisoners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prisoners.is_empty()
    }
}
