//! Session state owned by the coordinator.

use serde::Serialize;
use uuid::Uuid;

pub const MIN_INTENSITY: f64 = 0.0;
pub const MAX_INTENSITY: f64 = 100.0;

/// Clamp to the intensity range; NaN collapses to the minimum.
pub fn clamp_intensity(v: f64) -> f64 {
    if v.is_nan() {
        MIN_INTENSITY
    } else {
        v.clamp(MIN_INTENSITY, MAX_INTENSITY)
    }
}

/// Why a session was reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    Start,
    Inactivity,
    Explicit,
    SafetyCleared,
    ConfigChanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub intensity: f64,
    pub session_start_ms: u64,
    pub last_activity_ms: u64,
    pub last_event_ms: Option<u64>,
    pub is_active: bool,
    pub is_safe_mode: bool,
    /// Bumped on every reset so stale in-flight work can be discarded
    pub generation: u64,
    /// Why the session was last reset (`None` until the first reset)
    pub last_reset: Option<ResetReason>,
}

impl SessionState {
    pub fn new(floor: f64, now_ms: u64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            intensity: clamp_intensity(floor),
            session_start_ms: now_ms,
            last_activity_ms: now_ms,
            last_event_ms: None,
            is_active: false,
            is_safe_mode: false,
            generation: 0,
            last_reset: None,
        }
    }

    /// Back to floor values. Activity flags are left to the caller.
    pub fn reset(&mut self, floor: f64, now_ms: u64, reason: ResetReason) {
        self.session_id = Uuid::new_v4();
        self.intensity = clamp_intensity(floor);
        self.session_start_ms = now_ms;
        self.last_activity_ms = now_ms;
        self.last_event_ms = None;
        self.generation += 1;
        self.last_reset = Some(reason);
    }

    pub fn set_intensity(&mut self, value: f64) -> f64 {
        self.intensity = clamp_intensity(value);
        self.intensity
    }

    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_activity_ms)
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.session_start_ms)
    }
}
