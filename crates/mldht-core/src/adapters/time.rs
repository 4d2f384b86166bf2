use crate::domain::Timestamp;
use crate::ports::Clock;

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Timestamp::new(secs)
    }
}

/// A clock that always returns a fixed timestamp; steppable for tests that
/// need to simulate the passage of time without sleeping. Cloning shares
/// the same counter (via `Arc`) rather than snapshotting it, so a test can
/// hand clones to several components and advance time for all of them
/// from one handle.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl FixedClock {
    pub fn new(secs: u64) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(secs)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.now.load(std::sync::atomic::Ordering::SeqCst))
    }
}
