//! Time source abstraction.
//!
//! Every timing decision in the engine (cooldowns, cadence, escalation,
//! inactivity) reads milliseconds from a [`Clock`]. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`] forward explicitly so that
//! hours of session time can be simulated deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic-enough millisecond time source.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Virtual clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the coordinator.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            inner: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.inner.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.inner.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.inner.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.inner.load(Ordering::SeqCst)
    }
}
