//! Read-only diagnostics: bounded event log, performance counters and the
//! coordinator snapshot.

use crate::bundle::{BundleReport, StepOutcome};
use crate::registry::HandlerStatus;
use crate::safety::SafetySignals;
use crate::scheduler::SchedulerState;
use crate::tasks::TaskInfo;
use crate::warmup::WarmupStatus;
use dread_core::SessionState;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Most recent bundle reports, oldest evicted first.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<BundleReport>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, report: BundleReport) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(report);
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<BundleReport> {
        self.entries.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HandlerMetrics {
    pub calls: u64,
    pub failures: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl HandlerMetrics {
    pub fn mean_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_ms / self.calls as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    pub bundles: u64,
    pub steps: u64,
    pub step_failures: u64,
    pub step_skips: u64,
    pub handler_panics: u64,
    /// Fires refused because the global spacing window had not elapsed
    pub dropped_by_spacing: u64,
    /// Fires refused because the session was inactive
    pub dropped_inactive: u64,
    /// Scheduler selections discarded because a reset happened in between
    pub dropped_stale: u64,
    pub init_failures: u64,
    pub handlers: BTreeMap<String, HandlerMetrics>,
}

impl PerformanceMetrics {
    /// Fold one finished bundle into the counters.
    pub fn absorb(&mut self, report: &BundleReport) {
        self.bundles += 1;
        for step in &report.steps {
            self.steps += 1;
            match &step.outcome {
                StepOutcome::Performed => {}
                StepOutcome::Skipped { .. } => {
                    self.step_skips += 1;
                    continue;
                }
                StepOutcome::Failed { panicked, .. } => {
                    self.step_failures += 1;
                    if *panicked {
                        self.handler_panics += 1;
                    }
                }
            }

            let entry = self.handlers.entry(step.handler.clone()).or_default();
            entry.calls += 1;
            entry.total_ms += step.elapsed_ms;
            entry.max_ms = entry.max_ms.max(step.elapsed_ms);
            if matches!(step.outcome, StepOutcome::Failed { .. }) {
                entry.failures += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    pub enabled: bool,
    pub initialized: bool,
    pub disposed: bool,
    pub session: SessionState,
    pub scheduler: SchedulerState,
    pub warmup: WarmupStatus,
    pub safety: SafetySignals,
    pub safety_engaged: bool,
    pub handlers: Vec<HandlerStatus>,
    pub active_tasks: Vec<TaskInfo>,
    pub in_flight: usize,
    pub spacing_remaining_ms: u64,
}
