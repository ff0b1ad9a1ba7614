//! Global minimum spacing between fired effects.
//!
//! One gate is shared by every path that can fire an effect on its own
//! initiative (scheduler ticks, sub-triggers, coordinated-event requests).
//! Per-kind cooldowns stay in the probability model; this gate only answers
//! "did *anything* fire too recently?".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const NEVER: u64 = u64::MAX;

/// Shared handle; clones observe the same last-fired time.
#[derive(Debug, Clone)]
pub struct SpacingGate {
    last_fired: Arc<AtomicU64>,
    min_spacing_ms: Arc<AtomicU64>,
}

impl SpacingGate {
    pub fn new(min_spacing_ms: u64) -> Self {
        Self {
            last_fired: Arc::new(AtomicU64::new(NEVER)),
            min_spacing_ms: Arc::new(AtomicU64::new(min_spacing_ms)),
        }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self::new(secs_to_ms(secs))
    }

    pub fn min_spacing_ms(&self) -> u64 {
        self.min_spacing_ms.load(Ordering::Relaxed)
    }

    pub fn set_min_spacing_secs(&self, secs: f64) {
        self.min_spacing_ms.store(secs_to_ms(secs), Ordering::Relaxed);
    }

    pub fn last_fired_ms(&self) -> Option<u64> {
        match self.last_fired.load(Ordering::Relaxed) {
            NEVER => None,
            ms => Some(ms),
        }
    }

    /// Time left before the gate opens again (0 when open).
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_fired_ms() {
            Some(last) => self
                .min_spacing_ms()
                .saturating_sub(now_ms.saturating_sub(last)),
            None => 0,
        }
    }

    pub fn is_open(&self, now_ms: u64) -> bool {
        self.remaining_ms(now_ms) == 0
    }

    pub fn mark(&self, now_ms: u64) {
        self.last_fired.store(now_ms, Ordering::Relaxed);
    }

    /// Forget the last fire (new session).
    pub fn reset(&self) {
        self.last_fired.store(NEVER, Ordering::Relaxed);
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_nan() || secs <= 0.0 {
        0
    } else {
        (secs * 1000.0).round() as u64
    }
}
