//! Announce-token generation and verification.
//!
//! Reference: spec.md Section 4.4 (TokenIssuer)

use sha2::{Digest, Sha256};

use super::entities::{Address, Timestamp};
use super::node_id::NodeId;

/// Opaque token handed out with a `get_peers` response and echoed back in
/// a subsequent `announce_peer`. Carries its own issuance time as an 8-byte
/// big-endian prefix ahead of the digest, so `verify` can enforce
/// `token_validity` without the issuer keeping per-token state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(pub Vec<u8>);

/// Holds a current and previous secret, rotating on a timer; verifies a
/// token against either secret so a token issued just before rotation
/// still validates.
///
/// Rationale: binds an announce to prior contact (a `get_peers` from the
/// same address) without per-peer state.
pub struct TokenIssuer {
    secret: [u8; 32],
    previous: [u8; 32],
    last_rotation: Timestamp,
    rotation_interval_secs: u64,
}

impl TokenIssuer {
    pub fn new(now: Timestamp, rotation_interval_secs: u64, seed: [u8; 32]) -> Self {
        Self {
            secret: seed,
            previous: seed,
            last_rotation: now,
            rotation_interval_secs,
        }
    }

    /// Rotate secrets if `secret_rotation` seconds have elapsed since the
    /// last rotation. `new_secret` is supplied by the caller (random bytes
    /// from the injected randomness source).
    pub fn maybe_rotate(&mut self, now: Timestamp, new_secret: [u8; 32]) {
        if now.since(self.last_rotation) >= self.rotation_interval_secs {
            self.previous = self.secret;
            self.secret = new_secret;
            self.last_rotation = now;
        }
    }

    pub fn generate(&self, infohash: &NodeId, requester: &Address, now: Timestamp) -> Token {
        Self::build(&self.secret, infohash, requester, now)
    }

    /// Accepts the token if its embedded issuance time is within
    /// `token_validity_secs` of `now` and it matches either the current or
    /// previous secret's digest.
    pub fn verify(
        &self,
        token: &Token,
        infohash: &NodeId,
        requester: &Address,
        now: Timestamp,
        token_validity_secs: u64,
    ) -> bool {
        let Some((issued_at, digest)) = Self::split(&token.0) else {
            return false;
        };
        if now.since(issued_at) >= token_validity_secs {
            return false;
        }
        digest == Self::digest(&self.secret, infohash, requester, issued_at)
            || digest == Self::digest(&self.previous, infohash, requester, issued_at)
    }

    fn build(secret: &[u8; 32], infohash: &NodeId, requester: &Address, now: Timestamp) -> Token {
        let mut bytes = now.as_secs().to_be_bytes().to_vec();
        bytes.extend_from_slice(&Self::digest(secret, infohash, requester, now));
        Token(bytes)
    }

    fn split(bytes: &[u8]) -> Option<(Timestamp, &[u8])> {
        if bytes.len() < 8 {
            return None;
        }
        let mut secs = [0u8; 8];
        secs.copy_from_slice(&bytes[..8]);
        Some((Timestamp::new(u64::from_be_bytes(secs)), &bytes[8..]))
    }

    fn digest(secret: &[u8; 32], infohash: &NodeId, requester: &Address, issued_at: Timestamp) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        match requester.ip {
            std::net::IpAddr::V4(v4) => hasher.update(v4.octets()),
            std::net::IpAddr::V6(v6) => hasher.update(v6.octets()),
        }
        hasher.update(requester.port.to_be_bytes());
        hasher.update(infohash.as_bytes());
        hasher.update(issued_at.as_secs().to_be_bytes());
        hasher.finalize()[..8].to_vec()
    }
}
