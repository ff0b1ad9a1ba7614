//! Probability model: per-kind configuration, intensity-scaled chances,
//! the random draw and a bounded event history.
//!
//! Selection is priority-ordered sequential Bernoulli: eligible kinds are
//! walked in catalog order and each gets an independent trial with its own
//! probability; the first success wins. Rare kinds sit first in the default
//! catalog so they keep their (small) chance instead of being drowned out by
//! common kinds in a single weighted draw.

use dread_core::{
    clamp_intensity, clamp_unit, Clock, Dispatch, EventConfig, EventConfigUpdate, EventKind,
    EventRecord, KindSpec,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Per-kind runtime entry.
#[derive(Debug, Clone)]
struct KindState {
    kind: EventKind,
    config: EventConfig,
    min_intensity: f64,
    variants: Vec<String>,
    dispatch: Dispatch,
    last_triggered_ms: Option<u64>,
    session_count: u32,
}

impl KindState {
    fn from_spec(spec: KindSpec) -> Self {
        Self {
            config: spec.config(),
            min_intensity: clamp_intensity(spec.min_intensity),
            kind: spec.kind,
            variants: spec.variants,
            dispatch: spec.dispatch,
            last_triggered_ms: None,
            session_count: 0,
        }
    }

    fn cap_reached(&self) -> bool {
        self.session_count >= self.config.max_per_session
    }

    fn remaining_cooldown_ms(&self, now_ms: u64) -> u64 {
        match self.last_triggered_ms {
            Some(last) => self
                .config
                .cooldown_ms()
                .saturating_sub(now_ms.saturating_sub(last)),
            None => 0,
        }
    }
}

/// Per-kind counters for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct KindStatistics {
    pub enabled: bool,
    pub session_count: u32,
    pub max_per_session: u32,
    pub last_triggered_ms: Option<u64>,
    pub remaining_cooldown_ms: u64,
}

/// Read-only snapshot of event counters.
#[derive(Debug, Clone, Serialize)]
pub struct EventStatistics {
    /// Events recorded since the model was created (survives resets)
    pub total_recorded: u64,
    pub session_events: u32,
    pub history_len: usize,
    pub last_event: Option<EventRecord>,
    pub per_kind: BTreeMap<String, KindStatistics>,
}

pub struct ProbabilityModel {
    catalog: Vec<KindState>,
    history: VecDeque<EventRecord>,
    history_capacity: usize,
    total_recorded: u64,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl ProbabilityModel {
    pub fn new(catalog: Vec<KindSpec>, history_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(catalog, history_capacity, clock, StdRng::from_entropy())
    }

    /// Deterministic draws for tests and simulations.
    pub fn with_seed(
        catalog: Vec<KindSpec>,
        history_capacity: usize,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        Self::with_rng(catalog, history_capacity, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        catalog: Vec<KindSpec>,
        history_capacity: usize,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let mut model = Self {
            catalog: Vec::with_capacity(catalog.len()),
            history: VecDeque::new(),
            history_capacity: history_capacity.max(1),
            total_recorded: 0,
            clock,
            rng,
        };
        for spec in catalog {
            model.upsert_kind(spec);
        }
        model
    }

    fn entry(&self, kind: &EventKind) -> Option<&KindState> {
        self.catalog.iter().find(|k| &k.kind == kind)
    }

    fn entry_mut(&mut self, kind: &EventKind) -> Option<&mut KindState> {
        self.catalog.iter_mut().find(|k| &k.kind == kind)
    }

    // ------------------------------------------------------------------
    // Probability & selection
    // ------------------------------------------------------------------

    /// Final chance for `kind` at `intensity`, always in [0, 1].
    /// Unknown kinds and intensities below the kind's floor yield 0.
    pub fn calculate_event_probability(&self, kind: &EventKind, intensity: f64) -> f64 {
        let Some(entry) = self.entry(kind) else {
            return 0.0;
        };
        let intensity = clamp_intensity(intensity);
        if intensity < entry.min_intensity {
            return 0.0;
        }
        clamp_unit(entry.config.base_chance * intensity_factor(intensity))
    }

    fn is_eligible(&self, entry: &KindState, intensity: f64, now_ms: u64) -> bool {
        entry.config.enabled
            && !entry.cap_reached()
            && entry.remaining_cooldown_ms(now_ms) == 0
            && clamp_intensity(intensity) >= entry.min_intensity
    }

    /// Kinds that could be selected right now, in priority order.
    pub fn eligible_kinds(&self, intensity: f64) -> Vec<EventKind> {
        let now = self.clock.now_ms();
        self.catalog
            .iter()
            .filter(|e| self.is_eligible(e, intensity, now))
            .map(|e| e.kind.clone())
            .collect()
    }

    /// Walk eligible kinds in priority order; first successful trial wins.
    pub fn select_random_event(&mut self, intensity: f64) -> Option<EventKind> {
        for kind in self.eligible_kinds(intensity) {
            let p = self.calculate_event_probability(&kind, intensity);
            if p > 0.0 && self.rng.gen_bool(p) {
                tracing::trace!("Selected {} (p={:.3}, intensity={:.0})", kind, p, intensity);
                return Some(kind);
            }
        }
        None
    }

    /// Uniform choice among enabled kinds, ignoring cooldown, cap and floor.
    pub fn select_forced(&mut self) -> Option<EventKind> {
        let enabled: Vec<EventKind> = self
            .catalog
            .iter()
            .filter(|e| e.config.enabled)
            .map(|e| e.kind.clone())
            .collect();
        enabled.choose(&mut self.rng).cloned()
    }

    /// Enabled, uncapped kinds with no occurrence this session.
    pub fn unseen_kinds(&self) -> Vec<EventKind> {
        self.catalog
            .iter()
            .filter(|e| e.config.enabled && !e.cap_reached() && e.session_count == 0)
            .map(|e| e.kind.clone())
            .collect()
    }

    /// Uniform choice among [`unseen_kinds`](Self::unseen_kinds).
    pub fn select_unseen(&mut self) -> Option<EventKind> {
        self.unseen_kinds().choose(&mut self.rng).cloned()
    }

    pub fn pick_variant(&mut self, kind: &EventKind) -> Option<String> {
        let variants = self.entry(kind)?.variants.clone();
        variants.choose(&mut self.rng).cloned()
    }

    // ------------------------------------------------------------------
    // Recording & cooldowns
    // ------------------------------------------------------------------

    pub fn record_event(&mut self, kind: &EventKind, intensity: f64, variant: Option<String>) {
        let now = self.clock.now_ms();
        match self.entry_mut(kind) {
            Some(entry) => {
                entry.last_triggered_ms = Some(now);
                entry.session_count = entry.session_count.saturating_add(1);
            }
            None => tracing::warn!("Recording event for unknown kind '{}'", kind),
        }

        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(EventRecord {
            kind: kind.clone(),
            timestamp_ms: now,
            intensity_at_trigger: clamp_intensity(intensity),
            variant,
        });
        self.total_recorded += 1;
    }

    /// Unknown kinds are never on cooldown.
    pub fn is_on_cooldown(&self, kind: &EventKind) -> bool {
        self.remaining_cooldown_ms(kind) > 0
    }

    pub fn remaining_cooldown_ms(&self, kind: &EventKind) -> u64 {
        let now = self.clock.now_ms();
        self.entry(kind)
            .map(|e| e.remaining_cooldown_ms(now))
            .unwrap_or(0)
    }

    /// Clear counters, cooldown timestamps and history. Configuration stays.
    pub fn reset_session(&mut self) {
        for entry in &mut self.catalog {
            entry.session_count = 0;
            entry.last_triggered_ms = None;
        }
        self.history.clear();
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn set_event_enabled(&mut self, kind: &EventKind, enabled: bool) -> bool {
        self.update_event_config(
            kind,
            &EventConfigUpdate {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
    }

    /// Returns false (and logs) for unknown kinds.
    pub fn update_event_config(&mut self, kind: &EventKind, update: &EventConfigUpdate) -> bool {
        match self.entry_mut(kind) {
            Some(entry) => {
                update.apply_to(&mut entry.config);
                true
            }
            None => {
                tracing::warn!("Ignoring config update for unknown kind '{}'", kind);
                false
            }
        }
    }

    /// Add a kind at the end of the priority order, or replace an existing
    /// kind's configuration in place. Session counters are preserved.
    pub fn upsert_kind(&mut self, spec: KindSpec) {
        let fresh = KindState::from_spec(spec);
        match self.entry_mut(&fresh.kind) {
            Some(entry) => {
                entry.config = fresh.config;
                entry.min_intensity = fresh.min_intensity;
                entry.variants = fresh.variants;
                entry.dispatch = fresh.dispatch;
            }
            None => self.catalog.push(fresh),
        }
    }

    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.history_capacity = capacity.max(1);
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn kinds(&self) -> Vec<EventKind> {
        self.catalog.iter().map(|e| e.kind.clone()).collect()
    }

    pub fn config(&self, kind: &EventKind) -> Option<&EventConfig> {
        self.entry(kind).map(|e| &e.config)
    }

    pub fn dispatch(&self, kind: &EventKind) -> Option<&Dispatch> {
        self.entry(kind).map(|e| &e.dispatch)
    }

    pub fn session_count(&self, kind: &EventKind) -> u32 {
        self.entry(kind).map(|e| e.session_count).unwrap_or(0)
    }

    pub fn history(&self) -> Vec<EventRecord> {
        self.history.iter().cloned().collect()
    }

    pub fn statistics(&self) -> EventStatistics {
        let now = self.clock.now_ms();
        let per_kind = self
            .catalog
            .iter()
            .map(|e| {
                (
                    e.kind.to_string(),
                    KindStatistics {
                        enabled: e.config.enabled,
                        session_count: e.session_count,
                        max_per_session: e.config.max_per_session,
                        last_triggered_ms: e.last_triggered_ms,
                        remaining_cooldown_ms: e.remaining_cooldown_ms(now),
                    },
                )
            })
            .collect();

        EventStatistics {
            total_recorded: self.total_recorded,
            session_events: self.catalog.iter().map(|e| e.session_count).sum(),
            history_len: self.history.len(),
            last_event: self.history.back().cloned(),
            per_kind,
        }
    }
}

/// Monotonic scaling of base chance by intensity.
fn intensity_factor(intensity: f64) -> f64 {
    clamp_intensity(intensity) / 100.0
}
