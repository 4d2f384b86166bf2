//! Domain layer: pure Kademlia/KRPC logic with no I/O.
//!
//! Node identity and XOR distance, the splitting routing table, the peer
//! datastore, the announce-token scheme, the transaction table, the
//! admission filter, and the iterative lookup state machine.

pub mod entities;
pub mod errors;
pub mod lookup;
pub mod node_id;
pub mod peer_store;
pub mod quarantine;
pub mod rate_limiter;
pub mod routing_table;
pub mod token;
pub mod token_cache;
pub mod transaction;

pub use entities::{Address, Node, NodeStats, Timestamp};
pub use errors::{DhtError, Result};
pub use lookup::{LookupKind, LookupResult, LookupState};
pub use node_id::{Distance, NodeId};
pub use peer_store::PeerStore;
pub use quarantine::{Admit, Quarantine};
pub use rate_limiter::RateLimiter;
pub use routing_table::{KBucket, RoutingTable};
pub use token::{Token, TokenIssuer};
pub use token_cache::TokenCache;
pub use transaction::{Tid, TransactionOutcome, TransactionTable};
