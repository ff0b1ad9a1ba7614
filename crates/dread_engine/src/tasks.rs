//! Clock-driven periodic task table.
//!
//! Every periodic concern of the coordinator (escalation, inactivity checks,
//! warm-up, sub-triggers) is a named entry here instead of its own timer, so
//! tests can drive all of them from one [`ManualClock`](dread_core::ManualClock).

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskId {
    Escalation,
    InactivityCheck,
    Warmup,
    SubTrigger(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Escalation => f.write_str("escalation"),
            TaskId::InactivityCheck => f.write_str("inactivity_check"),
            TaskId::Warmup => f.write_str("warmup"),
            TaskId::SubTrigger(name) => write!(f, "sub_trigger:{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    period_ms: u64,
    next_due_ms: u64,
}

/// One row of [`TaskRunner::active`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub id: String,
    pub period_ms: u64,
    pub next_due_ms: u64,
}

#[derive(Debug, Default)]
pub struct TaskRunner {
    entries: BTreeMap<TaskId, Entry>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// First run is one period after `now_ms`. Re-scheduling an id replaces it.
    pub fn schedule_every(&mut self, id: TaskId, period_ms: u64, now_ms: u64) {
        let period_ms = period_ms.max(1);
        tracing::debug!("Task {} scheduled every {}ms", id, period_ms);
        self.entries.insert(
            id,
            Entry {
                period_ms,
                next_due_ms: now_ms + period_ms,
            },
        );
    }

    pub fn cancel(&mut self, id: &TaskId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn cancel_all(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!("Cancelling {} task(s)", self.entries.len());
        }
        self.entries.clear();
    }

    /// Drop every sub-trigger entry, leaving the core tasks alone.
    pub fn cancel_sub_triggers(&mut self) {
        self.entries
            .retain(|id, _| !matches!(id, TaskId::SubTrigger(_)));
    }

    pub fn is_scheduled(&self, id: &TaskId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.values().map(|e| e.next_due_ms).min()
    }

    /// Earliest task due at `now_ms`, advanced by one period.
    ///
    /// A task that fell several periods behind is returned once per missed
    /// period, so escalation counts every elapsed interval.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<TaskId> {
        let (id, entry) = self
            .entries
            .iter_mut()
            .filter(|(_, e)| e.next_due_ms <= now_ms)
            .min_by_key(|(_, e)| e.next_due_ms)?;
        entry.next_due_ms += entry.period_ms;
        Some(id.clone())
    }

    pub fn active(&self) -> Vec<TaskInfo> {
        self.entries
            .iter()
            .map(|(id, e)| TaskInfo {
                id: id.to_string(),
                period_ms: e.period_ms,
                next_due_ms: e.next_due_ms,
            })
            .collect()
    }
}
