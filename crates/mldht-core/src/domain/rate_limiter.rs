//! Token-bucket bandwidth gate: one global bucket plus a per-host bucket
//! created on first sight.
//!
//! Reference: spec.md Section 4.1 (RateLimiter)

use std::collections::HashMap;

use super::entities::{Address, Timestamp};

/// A single token bucket: capacity `C`, fill rate `R` tokens/sec, one token
/// equals one byte.
#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    capacity: u64,
    fill_rate: u64,
    stored: u64,
    last_refill: Timestamp,
}

impl TokenBucket {
    fn new(capacity: u64, fill_rate: u64, now: Timestamp) -> Self {
        Self {
            capacity,
            fill_rate,
            stored: capacity,
            last_refill: now,
        }
    }

    fn tokens(&mut self, now: Timestamp) -> u64 {
        let elapsed = now.since(self.last_refill);
        let refilled = self.fill_rate.saturating_mul(elapsed);
        self.stored = self.capacity.min(self.stored.saturating_add(refilled));
        self.last_refill = now;
        self.stored
    }

    fn can_consume(&mut self, n: u64, now: Timestamp) -> bool {
        self.tokens(now) >= n
    }

    fn consume(&mut self, n: u64) {
        self.stored = self.stored.saturating_sub(n);
    }

    fn is_idle_and_full(&mut self, now: Timestamp, idle_secs: u64) -> bool {
        let was_idle = now.since(self.last_refill) >= idle_secs;
        was_idle && self.tokens(now) >= self.capacity
    }
}

/// Gates one traffic direction (inbound or outbound): a global bucket plus
/// per-host buckets allocated lazily.
///
/// Decision policy is drop-on-failure: `consume` never queues, since the
/// core is a UDP responder and retry is the remote's responsibility.
#[derive(Debug)]
pub struct RateLimiter {
    global: TokenBucket,
    hosts: HashMap<Address, TokenBucket>,
    host_capacity: u64,
    host_fill_rate: u64,
    /// Per-host buckets idle (full, untouched) longer than this are evicted
    /// on the next `consume` sweep, bounding memory use.
    gc_idle_secs: u64,
}

impl RateLimiter {
    pub fn new(
        global_capacity: u64,
        global_fill_rate: u64,
        host_capacity: u64,
        host_fill_rate: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            global: TokenBucket::new(global_capacity, global_fill_rate, now),
            hosts: HashMap::new(),
            host_capacity,
            host_fill_rate,
            gc_idle_secs: 300,
        }
    }

    /// True iff both the global and the host bucket currently hold at
    /// least `n` tokens. Does not mutate state.
    pub fn can_consume(&mut self, addr: Address, n: u64, now: Timestamp) -> bool {
        let host_ok = self
            .hosts
            .entry(addr)
            .or_insert_with(|| TokenBucket::new(self.host_capacity, self.host_fill_rate, now))
            .can_consume(n, now);
        host_ok && self.global.can_consume(n, now)
    }

    /// Atomically succeeds iff both buckets can consume `n`; on success,
    /// subtracts `n` from each. Opportunistically garbage-collects idle
    /// host buckets.
    pub fn consume(&mut self, addr: Address, n: u64, now: Timestamp) -> bool {
        self.gc_idle(now);
        let host = self
            .hosts
            .entry(addr)
            .or_insert_with(|| TokenBucket::new(self.host_capacity, self.host_fill_rate, now));

        if !host.can_consume(n, now) || !self.global.can_consume(n, now) {
            return false;
        }
        host.consume(n);
        self.global.consume(n);
        true
    }

    fn gc_idle(&mut self, now: Timestamp) {
        self.hosts
            .retain(|_, bucket| !bucket.is_idle_and_full(now, self.gc_idle_secs));
    }

    #[cfg(test)]
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(last_octet: u8) -> Address {
        Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet)), 6881)
    }

    #[test]
    fn four_pings_one_host_one_global_budget() {
        // host_bandwidth_rate = 1 packet, global = 3 packets (scenario 7).
        let mut limiter = RateLimiter::new(3, 0, 1, 0, Timestamp::new(0));
        assert!(limiter.consume(addr(1), 1, Timestamp::new(0)));
        assert!(limiter.consume(addr(2), 1, Timestamp::new(0)));
        assert!(limiter.consume(addr(3), 1, Timestamp::new(0)));
        // fourth distinct address: global bucket is now empty.
        assert!(!limiter.consume(addr(4), 1, Timestamp::new(0)));
    }

    #[test]
    fn refill_after_one_second_admits_again() {
        let mut limiter = RateLimiter::new(3, 3, 1, 1, Timestamp::new(0));
        for i in 1..=3u8 {
            assert!(limiter.consume(addr(i), 1, Timestamp::new(0)));
        }
        assert!(!limiter.consume(addr(4), 1, Timestamp::new(0)));
        assert!(limiter.consume(addr(4), 1, Timestamp::new(1)));
    }

    #[test]
    fn per_host_bucket_limits_independent_of_global_headroom() {
        let mut limiter = RateLimiter::new(100, 0, 1, 0, Timestamp::new(0));
        assert!(limiter.consume(addr(1), 1, Timestamp::new(0)));
        assert!(!limiter.consume(addr(1), 1, Timestamp::new(0)));
    }

    #[test]
    fn idle_full_host_buckets_are_evicted() {
        let mut limiter = RateLimiter::new(100, 100, 10, 10, Timestamp::new(0));
        limiter.consume(addr(1), 1, Timestamp::new(0));
        assert_eq!(limiter.host_count(), 1);
        // Bucket refills to full and stays untouched past the idle window.
        limiter.consume(addr(9), 0, Timestamp::new(400));
        assert_eq!(limiter.host_count(), 1);
    }
}
