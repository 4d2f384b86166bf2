//! Client-side cache of tokens received from remote responders, so a later
//! `announce_peer` issued outside the lookup that discovered the token can
//! still find one to echo.
//!
//! Grounded in `dhtbot/token_cacher.py`'s `TokenCacher` (reactor-scheduled
//! pruning of remembered tokens); supplemental feature, see SPEC_FULL.md
//! Section 10.

use std::collections::HashMap;

use super::entities::{Address, Timestamp};
use super::node_id::NodeId;
use super::token::Token;

struct CachedToken {
    token: Token,
    received_at: Timestamp,
}

/// Keyed by (infohash, source address), mirroring `PeerStore`'s
/// timeout-reset-on-reinsert behavior.
#[derive(Default)]
pub struct TokenCache {
    entries: HashMap<(NodeId, Address), CachedToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn remember(&mut self, infohash: NodeId, from: Address, token: Token, now: Timestamp) {
        self.entries.insert(
            (infohash, from),
            CachedToken {
                token,
                received_at: now,
            },
        );
    }

    pub fn get(&self, infohash: &NodeId, from: &Address, now: Timestamp, validity_secs: u64) -> Option<&Token> {
        self.entries.get(&(*infohash, *from)).and_then(|cached| {
            if now.since(cached.received_at) < validity_secs {
                Some(&cached.token)
            } else {
                None
            }
        })
    }

    pub fn expire(&mut self, now: Timestamp, validity_secs: u64) {
        self.entries
            .retain(|_, cached| now.since(cached.received_at) < validity_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> Address {
        Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 6881)
    }

    #[test]
    fn cached_token_retrievable_until_validity_window_closes() {
        let mut cache = TokenCache::new();
        let ih = NodeId::new([1u8; 20]);
        cache.remember(ih, addr(), Token(vec![9, 9]), Timestamp::new(0));

        assert!(cache.get(&ih, &addr(), Timestamp::new(9), 10).is_some());
        assert!(cache.get(&ih, &addr(), Timestamp::new(10), 10).is_none());
    }
}
