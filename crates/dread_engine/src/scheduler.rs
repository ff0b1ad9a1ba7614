//! Intensity-driven cadence scheduler.
//!
//! Holds a single pending tick. Each tick asks the probability model for a
//! selection, hands any selection to the trigger callback, records it, and
//! schedules the next tick no matter what happened. Delay shrinks as
//! intensity grows, bounded on both ends by `[min_cooldown_ms, max_cooldown_ms]`.
//!
//! ```text
//!   Idle ──start──▶ Running(Waiting: next_tick_ms)
//!    ▲                │
//!    └──stop / cap ───┘        dispose ──▶ Disposed (terminal)
//! ```
//!
//! Time never advances on its own here: the owner calls [`Scheduler::poll`]
//! (the coordinator does it on every tick of its task runner).

use crate::probability::ProbabilityModel;
use crate::spacing::SpacingGate;
use dread_core::{clamp_intensity, clamp_unit, Clock, EventKind, SchedulerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;

/// What the scheduler hands to its trigger callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    pub kind: EventKind,
    pub intensity: f64,
    pub variant: Option<String>,
    /// Fired through `force_trigger`, bypassing timing and cooldowns
    pub forced: bool,
    pub timestamp_ms: u64,
}

/// Invoked for every fired event. Errors are logged and swallowed.
pub type TriggerCallback = Box<dyn FnMut(&ScheduledEvent) -> anyhow::Result<()> + Send>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerState {
    pub is_running: bool,
    /// Mirror of the session intensity, synced through `update_intensity`
    pub current_intensity: f64,
    pub session_event_count: u32,
    pub last_event_ms: u64,
    pub next_tick_ms: Option<u64>,
    /// Stopped because `max_events_per_session` was reached
    pub exhausted: bool,
    pub disposed: bool,
}

pub struct Scheduler {
    config: SchedulerConfig,
    model: ProbabilityModel,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    spacing: Option<SpacingGate>,
    callback: Option<TriggerCallback>,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, model: ProbabilityModel, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(config, model, clock, StdRng::from_entropy())
    }

    pub fn with_seed(
        config: SchedulerConfig,
        model: ProbabilityModel,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        Self::with_rng(config, model, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: SchedulerConfig,
        model: ProbabilityModel,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            config,
            model,
            clock,
            rng,
            spacing: None,
            callback: None,
            state: SchedulerState {
                is_running: false,
                current_intensity: 0.0,
                session_event_count: 0,
                last_event_ms: now,
                next_tick_ms: None,
                exhausted: false,
                disposed: false,
            },
        }
    }

    /// Consult a shared spacing gate before every cadence tick.
    pub fn with_spacing(mut self, gate: SpacingGate) -> Self {
        self.spacing = Some(gate);
        self
    }

    /// Install the callback without starting (used for forced triggers while idle).
    pub fn set_trigger_callback(&mut self, callback: TriggerCallback) {
        if !self.state.disposed {
            self.callback = Some(callback);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the cadence. Calling it while already running changes nothing.
    pub fn start(&mut self, intensity: f64, callback: TriggerCallback) {
        if self.state.disposed {
            tracing::debug!("Scheduler disposed, ignoring start");
            return;
        }
        if self.state.is_running {
            tracing::debug!("Scheduler already running, ignoring start");
            return;
        }

        self.callback = Some(callback);
        self.state.current_intensity = clamp_intensity(intensity);
        self.state.last_event_ms = self.clock.now_ms();
        self.state.session_event_count = 0;
        self.state.exhausted = false;
        self.state.is_running = true;

        tracing::info!(
            "Scheduler started at intensity {:.0}",
            self.state.current_intensity
        );
        self.schedule_next_event();
    }

    /// Cancel the pending tick. Idempotent.
    pub fn stop(&mut self) {
        if self.state.is_running {
            tracing::info!(
                "Scheduler stopped after {} event(s)",
                self.state.session_event_count
            );
        }
        self.state.is_running = false;
        self.state.next_tick_ms = None;
    }

    /// Terminal stop; later `start` calls are ignored.
    pub fn dispose(&mut self) {
        self.stop();
        self.callback = None;
        self.state.disposed = true;
    }

    /// New session: counters back to zero, exhaustion cleared.
    pub fn reset_session(&mut self) {
        self.state.session_event_count = 0;
        self.state.exhausted = false;
        self.state.last_event_ms = self.clock.now_ms();
        if self.state.is_running {
            self.schedule_next_event();
        }
    }

    pub fn set_config(&mut self, config: SchedulerConfig) {
        self.config = config;
    }

    // ------------------------------------------------------------------
    // Cadence
    // ------------------------------------------------------------------

    /// Pre-jitter delay for the current intensity.
    pub fn base_delay_ms(&self) -> u64 {
        let (min, max) = self.window();
        let span = (max - min) as f64;
        let base = max as f64 - span * self.state.current_intensity / 100.0;
        base.round() as u64
    }

    /// Delay until the next tick, always within `[min_cooldown_ms, max_cooldown_ms]`.
    pub fn calculate_next_event_delay(&mut self) -> u64 {
        let (min, max) = self.window();
        if !self.config.intensity_scaling {
            return self.rng.gen_range(min..=max);
        }

        // NaN collapses to no jitter
        let jitter = clamp_unit(self.config.jitter).min(0.9);
        let factor = self.rng.gen_range((1.0 - jitter)..=(1.0 + jitter));
        let jittered = self.base_delay_ms() as f64 * factor;
        (jittered.round() as u64).clamp(min, max)
    }

    fn window(&self) -> (u64, u64) {
        let min = self.config.min_cooldown_ms.min(self.config.max_cooldown_ms);
        let max = self.config.min_cooldown_ms.max(self.config.max_cooldown_ms);
        (min, max)
    }

    fn schedule_next_event(&mut self) {
        if !self.state.is_running {
            return;
        }
        if self.state.session_event_count >= self.config.max_events_per_session {
            tracing::info!(
                "Session event cap ({}) reached, scheduler stopping",
                self.config.max_events_per_session
            );
            self.state.exhausted = true;
            self.stop();
            return;
        }
        let delay = self.calculate_next_event_delay();
        self.state.next_tick_ms = Some(self.clock.now_ms() + delay);
        tracing::trace!("Next tick in {}ms", delay);
    }

    /// Run the pending tick if it is due.
    pub fn poll(&mut self) -> Option<ScheduledEvent> {
        match self.state.next_tick_ms {
            Some(due) if self.state.is_running && due <= self.clock.now_ms() => {
                self.trigger_event()
            }
            _ => None,
        }
    }

    /// One cadence tick. Always reschedules afterwards.
    pub fn trigger_event(&mut self) -> Option<ScheduledEvent> {
        let now = self.clock.now_ms();
        self.state.next_tick_ms = None;

        let spacing_closed = self
            .spacing
            .as_ref()
            .is_some_and(|gate| !gate.is_open(now));

        let fired = if spacing_closed {
            tracing::debug!("Tick skipped: global spacing not yet elapsed");
            None
        } else {
            match self.model.select_random_event(self.state.current_intensity) {
                Some(kind) => Some(self.fire(kind, false)),
                None => {
                    tracing::trace!(
                        "No event selected at intensity {:.0}",
                        self.state.current_intensity
                    );
                    None
                }
            }
        };

        self.schedule_next_event();
        fired
    }

    /// Fire now, bypassing timing, cooldowns and spacing. `None` picks any enabled kind.
    pub fn force_trigger(&mut self, kind: Option<EventKind>) -> Option<ScheduledEvent> {
        if self.state.disposed {
            return None;
        }
        let kind = match kind {
            Some(kind) if self.model.config(&kind).is_some() => kind,
            Some(kind) => {
                tracing::warn!("Cannot force unknown event kind '{}'", kind);
                return None;
            }
            None => self.model.select_forced()?,
        };
        Some(self.fire(kind, true))
    }

    fn fire(&mut self, kind: EventKind, forced: bool) -> ScheduledEvent {
        let now = self.clock.now_ms();
        let event = ScheduledEvent {
            variant: self.model.pick_variant(&kind),
            kind,
            intensity: self.state.current_intensity,
            forced,
            timestamp_ms: now,
        };

        if let Some(callback) = self.callback.as_mut() {
            if let Err(e) = callback(&event) {
                tracing::warn!(
                    kind = %event.kind,
                    intensity = event.intensity,
                    "Trigger callback failed: {:#}",
                    e
                );
            }
        }

        self.model
            .record_event(&event.kind, event.intensity, event.variant.clone());
        self.state.session_event_count = self.state.session_event_count.saturating_add(1);
        self.state.last_event_ms = now;
        if let Some(gate) = &self.spacing {
            gate.mark(now);
        }
        event
    }

    /// Sync the intensity mirror. A large upward jump while running makes the
    /// cadence catch up instead of waiting out a stale delay.
    pub fn update_intensity(&mut self, new_intensity: f64) -> f64 {
        let previous = self.state.current_intensity;
        let current = clamp_intensity(new_intensity);
        self.state.current_intensity = current;

        if self.state.is_running && current - previous > self.config.intensity_jump_threshold {
            let now = self.clock.now_ms();
            let since_last = now.saturating_sub(self.state.last_event_ms);
            if since_last >= self.config.min_cooldown_ms {
                tracing::info!(
                    "Intensity jump {:.0} -> {:.0}, firing immediately",
                    previous,
                    current
                );
                self.trigger_event();
            } else {
                let due = self.state.last_event_ms + self.config.min_cooldown_ms;
                tracing::info!(
                    "Intensity jump {:.0} -> {:.0}, rescheduling in {}ms",
                    previous,
                    current,
                    due - now
                );
                self.state.next_tick_ms = Some(due);
            }
        }
        current
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> SchedulerState {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn next_tick_ms(&self) -> Option<u64> {
        self.state.next_tick_ms
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn model(&self) -> &ProbabilityModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ProbabilityModel {
        &mut self.model
    }
}
