//! Warm-up phase bookkeeping.
//!
//! At the start of each session the coordinator fires one not-yet-seen kind
//! per warm-up interval until the catalog is covered or the timeout runs out,
//! then hands over to the regular scheduler. Once finished, warm-up stays
//! finished until the next session.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmupStage {
    NotStarted,
    Running,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmupStatus {
    pub stage: WarmupStage,
    pub started_ms: Option<u64>,
    pub fired: u32,
}

#[derive(Debug, Clone)]
pub struct WarmupPhase {
    stage: WarmupStage,
    started_ms: Option<u64>,
    timeout_ms: u64,
    fired: u32,
}

impl WarmupPhase {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            stage: WarmupStage::NotStarted,
            started_ms: None,
            timeout_ms: timeout_secs.saturating_mul(1000),
            fired: 0,
        }
    }

    pub fn begin(&mut self, now_ms: u64) {
        self.stage = WarmupStage::Running;
        self.started_ms = Some(now_ms);
        self.fired = 0;
    }

    pub fn is_running(&self) -> bool {
        self.stage == WarmupStage::Running
    }

    pub fn timed_out(&self, now_ms: u64) -> bool {
        match self.started_ms {
            Some(start) => now_ms.saturating_sub(start) >= self.timeout_ms,
            None => false,
        }
    }

    pub fn note_fired(&mut self) {
        self.fired += 1;
    }

    pub fn finish(&mut self) {
        self.stage = WarmupStage::Finished;
    }

    /// Back to not-started (session torn down before warm-up completed).
    pub fn cancel(&mut self) {
        self.stage = WarmupStage::NotStarted;
        self.started_ms = None;
        self.fired = 0;
    }

    pub fn set_timeout_secs(&mut self, timeout_secs: u64) {
        self.timeout_ms = timeout_secs.saturating_mul(1000);
    }

    pub fn status(&self) -> WarmupStatus {
        WarmupStatus {
            stage: self.stage,
            started_ms: self.started_ms,
            fired: self.fired,
        }
    }
}
