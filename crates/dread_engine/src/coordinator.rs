//! Session coordinator - ties the probability model, scheduler, periodic
//! tasks and effect handlers together.
//!
//! The coordinator owns the one [`SessionState`] and is the only thing that
//! mutates it. Every periodic concern runs off a single [`TaskRunner`] keyed
//! to the injected clock; the host (or [`crate::driver`]) calls
//! [`Coordinator::tick`] whenever [`Coordinator::next_wake_ms`] comes due.
//!
//! Lifecycle:
//! - Idle: constructed, or session reset by inactivity / disabled / safety
//! - Active (warm-up): one unseen kind per warm-up interval
//! - Active (scheduled): scheduler cadence plus sub-triggers
//! - Disposed: terminal

use crate::bundle::{run_bundle, BundlePlan, BundleReport, FireSource};
use crate::diagnostics::{CoordinatorSnapshot, EventLog, PerformanceMetrics};
use crate::handler::{EffectContext, EffectHandler};
use crate::probability::{EventStatistics, ProbabilityModel};
use crate::registry::HandlerRegistry;
use crate::safety::{AccessibilityState, SafetySignals};
use crate::scheduler::{ScheduledEvent, Scheduler, TriggerCallback};
use crate::spacing::SpacingGate;
use crate::tasks::{TaskId, TaskRunner};
use crate::warmup::WarmupPhase;
use dread_core::{
    clamp_unit, Clock, CoordinatedCategory, DreadConfig, EventKind, ResetReason, SessionState,
    MAX_INTENSITY,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Scheduler selection waiting to be dispatched, tagged with the session
/// generation it was selected in.
struct QueuedFire {
    generation: u64,
    event: ScheduledEvent,
}

pub struct Coordinator {
    /// Sanitized configuration currently in force
    config: DreadConfig,

    clock: Arc<dyn Clock>,

    /// The single session record
    session: SessionState,

    /// Cadence scheduler (owns the probability model)
    scheduler: Scheduler,

    /// Global minimum spacing, shared with the scheduler
    spacing: SpacingGate,

    registry: HandlerRegistry,

    tasks: TaskRunner,

    warmup: WarmupPhase,

    /// Last reported external safety signals
    signals: SafetySignals,

    /// Whether the safety interrupt is currently holding the coordinator down
    safety_engaged: bool,

    /// Current session generation, read by the scheduler callback
    generation: Arc<AtomicU64>,

    fired_tx: mpsc::UnboundedSender<QueuedFire>,
    fired_rx: mpsc::UnboundedReceiver<QueuedFire>,

    /// Bundles spawned by periodic work, reaped on later ticks
    in_flight: Vec<JoinHandle<BundleReport>>,

    event_log: EventLog,
    metrics: PerformanceMetrics,

    /// Sub-trigger draws
    rng: StdRng,

    initialized: bool,
    disposed: bool,
}

impl Coordinator {
    pub fn new(config: DreadConfig, clock: Arc<dyn Clock>) -> Self {
        let mut seeder = StdRng::from_entropy();
        Self::with_seed(config, clock, seeder.gen())
    }

    /// Fully deterministic coordinator for tests and simulations.
    pub fn with_seed(config: DreadConfig, clock: Arc<dyn Clock>, seed: u64) -> Self {
        let config = config.sanitized();
        let now = clock.now_ms();

        let model = ProbabilityModel::with_seed(
            config.events.clone(),
            config.probability.history_capacity,
            clock.clone(),
            seed,
        );
        let spacing = SpacingGate::from_secs(config.session.min_spacing_secs);
        let scheduler = Scheduler::with_seed(
            config.scheduler.clone(),
            model,
            clock.clone(),
            seed.wrapping_add(1),
        )
        .with_spacing(spacing.clone());

        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let session = SessionState::new(config.session.floor_intensity, now);

        let mut coordinator = Self {
            warmup: WarmupPhase::new(config.warmup.timeout_secs),
            event_log: EventLog::new(config.diagnostics.event_log_capacity),
            generation: Arc::new(AtomicU64::new(session.generation)),
            session,
            scheduler,
            spacing,
            registry: HandlerRegistry::new(),
            tasks: TaskRunner::new(),
            signals: SafetySignals::default(),
            safety_engaged: false,
            fired_tx,
            fired_rx,
            in_flight: Vec::new(),
            metrics: PerformanceMetrics::default(),
            rng: StdRng::seed_from_u64(seed.wrapping_add(2)),
            initialized: false,
            disposed: false,
            clock,
            config,
        };
        let callback = coordinator.trigger_callback();
        coordinator.scheduler.set_trigger_callback(callback);
        coordinator
    }

    /// Callback handed to the scheduler: queue the selection for dispatch.
    fn trigger_callback(&self) -> TriggerCallback {
        let tx = self.fired_tx.clone();
        let generation = self.generation.clone();
        Box::new(move |event: &ScheduledEvent| {
            tx.send(QueuedFire {
                generation: generation.load(Ordering::SeqCst),
                event: event.clone(),
            })
            .map_err(|_| {
                tracing::error!(kind = %event.kind, "Fire queue closed, dropping event");
                anyhow::anyhow!("fire queue closed")
            })
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialize registered handlers, then start a session if eligible.
    pub async fn initialize(&mut self) {
        if self.initialized || self.disposed {
            return;
        }

        let failures = self.registry.initialize_all().await;
        self.metrics.init_failures += failures as u64;
        self.initialized = true;
        tracing::info!(
            "Coordinator initialized ({} handler(s), {} failed)",
            self.registry.len(),
            failures
        );

        if self.safety_engaged {
            self.registry.force_disable_all();
        }
        if self.is_eligible() {
            self.start_session(ResetReason::Start);
        } else {
            tracing::info!("Coordinator not eligible, staying idle");
        }
    }

    /// Feature enabled, not disposed, and no safety signal asserted.
    pub fn is_eligible(&self) -> bool {
        self.config.enabled
            && !self.disposed
            && !self.signals.any_asserted(&self.config.safety)
    }

    /// Cancel all tasks, dispose the scheduler and every handler. Idempotent.
    /// Bundles still running are detached.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.tasks.cancel_all();
        self.scheduler.dispose();
        self.registry.dispose_all();
        self.warmup.cancel();
        self.session.is_active = false;
        if !self.in_flight.is_empty() {
            tracing::debug!("Detaching {} in-flight bundle(s)", self.in_flight.len());
        }
        self.in_flight.clear();
        self.disposed = true;
        tracing::info!("Coordinator disposed");
    }

    /// Wait for every spawned bundle and fold its report into diagnostics.
    pub async fn settle(&mut self) {
        for handle in std::mem::take(&mut self.in_flight) {
            self.absorb_join(handle.await);
        }
    }

    // ========================================================================
    // Session management
    // ========================================================================

    /// Counters, history, spacing and generation back to a fresh session.
    fn reset_state(&mut self, now: u64, reason: ResetReason) {
        self.scheduler.model_mut().reset_session();
        self.scheduler.reset_session();
        self.session
            .reset(self.config.session.floor_intensity, now, reason);
        self.generation
            .store(self.session.generation, Ordering::SeqCst);
        self.spacing.reset();
        self.scheduler.update_intensity(self.session.intensity);
    }

    /// Stop every task and the scheduler; session goes idle.
    fn deactivate(&mut self) {
        self.tasks.cancel_all();
        self.scheduler.stop();
        self.warmup.cancel();
        if self.session.is_active {
            tracing::info!(session_id = %self.session.session_id, "Session idle");
        }
        self.session.is_active = false;
    }

    fn start_session(&mut self, reason: ResetReason) {
        let now = self.clock.now_ms();
        self.deactivate();
        self.reset_state(now, reason);
        self.session.is_active = true;

        self.schedule_periodic_tasks(now);
        let has_kinds = !self.scheduler.model().kinds().is_empty();
        if self.config.warmup.enabled && has_kinds {
            self.warmup.begin(now);
            self.tasks.schedule_every(
                TaskId::Warmup,
                self.config.warmup.interval_secs * 1000,
                now,
            );
        } else {
            self.start_scheduler();
        }

        tracing::info!(
            session_id = %self.session.session_id,
            reason = ?reason,
            "Session started at intensity {:.0}",
            self.session.intensity
        );
    }

    fn schedule_periodic_tasks(&mut self, now: u64) {
        let s = &self.config.session;
        let (escalation_ms, inactivity_ms) =
            (s.escalation_period_secs * 1000, s.inactivity_check_secs * 1000);
        self.tasks
            .schedule_every(TaskId::Escalation, escalation_ms, now);
        self.tasks
            .schedule_every(TaskId::InactivityCheck, inactivity_ms, now);

        self.tasks.cancel_sub_triggers();
        let triggers: Vec<(String, u64)> = self
            .config
            .sub_triggers
            .iter()
            .map(|t| (t.name.clone(), t.period_secs * 1000))
            .collect();
        for (name, period_ms) in triggers {
            self.tasks
                .schedule_every(TaskId::SubTrigger(name), period_ms, now);
        }
    }

    fn start_scheduler(&mut self) {
        if !self.session.is_active {
            return;
        }
        let callback = self.trigger_callback();
        self.scheduler.start(self.session.intensity, callback);
    }

    /// User did something. Resumes an idle session when eligible.
    pub fn record_activity(&mut self) {
        if self.disposed {
            return;
        }
        self.session.last_activity_ms = self.clock.now_ms();
        if !self.session.is_active && self.initialized && self.is_eligible() {
            tracing::debug!("Activity after idle, starting fresh session");
            self.start_session(ResetReason::Start);
        }
    }

    /// Explicit reset. An active session restarts from the floor.
    pub fn reset_session(&mut self) {
        if self.disposed {
            return;
        }
        if self.session.is_active && self.is_eligible() {
            self.start_session(ResetReason::Explicit);
        } else {
            let now = self.clock.now_ms();
            self.reset_state(now, ResetReason::Explicit);
            tracing::info!(session_id = %self.session.session_id, "Session reset while idle");
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Run everything due at the current clock time.
    pub async fn tick(&mut self) {
        if self.disposed {
            return;
        }
        self.reap().await;

        if self.session.is_active {
            self.scheduler.poll();
            self.drain_fired(FireSource::Forced);
        }

        let now = self.clock.now_ms();
        while let Some(id) = self.tasks.pop_due(now) {
            self.run_task(id, now);
        }
    }

    /// Earliest time anything needs to run.
    pub fn next_wake_ms(&self) -> Option<u64> {
        let scheduler_due = if self.session.is_active {
            self.scheduler.next_tick_ms()
        } else {
            None
        };
        match (scheduler_due, self.tasks.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn run_task(&mut self, id: TaskId, now: u64) {
        tracing::trace!("Running task {}", id);
        match id {
            TaskId::Escalation => self.escalate(now),
            TaskId::InactivityCheck => self.check_inactivity(now),
            TaskId::Warmup => self.warmup_tick(now),
            TaskId::SubTrigger(name) => self.sub_trigger_tick(&name, now),
        }
    }

    /// Intensity grows with whole escalation periods elapsed, never drops.
    fn escalate(&mut self, now: u64) {
        let s = &self.config.session;
        let period_ms = (s.escalation_period_secs * 1000).max(1);
        let intervals = self.session.elapsed_ms(now) / period_ms;
        let target = (s.floor_intensity + intervals as f64 * s.escalation_rate).min(MAX_INTENSITY);

        if target > self.session.intensity {
            let previous = self.session.intensity;
            let current = self.session.set_intensity(target);
            tracing::debug!("Intensity escalated {:.0} -> {:.0}", previous, current);
            self.scheduler.update_intensity(current);
            self.drain_fired(FireSource::Forced);
        }
    }

    fn check_inactivity(&mut self, now: u64) {
        let threshold_ms = self.config.session.inactivity_threshold_secs * 1000;
        let idle_ms = self.session.idle_ms(now);
        if idle_ms > threshold_ms {
            tracing::info!(
                session_id = %self.session.session_id,
                reason = ?ResetReason::Inactivity,
                "No activity for {}s, resetting session",
                idle_ms / 1000
            );
            self.deactivate();
            self.reset_state(now, ResetReason::Inactivity);
        }
    }

    fn warmup_tick(&mut self, now: u64) {
        if !self.warmup.is_running() {
            self.tasks.cancel(&TaskId::Warmup);
            return;
        }
        if self.warmup.timed_out(now) {
            self.finish_warmup("timed out");
            return;
        }

        match self.scheduler.model_mut().select_unseen() {
            Some(kind) => {
                if self.scheduler.force_trigger(Some(kind)).is_some() {
                    self.warmup.note_fired();
                }
                self.drain_fired(FireSource::Warmup);
                if self.scheduler.model().unseen_kinds().is_empty() {
                    self.finish_warmup("catalog covered");
                }
            }
            None => self.finish_warmup("catalog covered"),
        }
    }

    fn finish_warmup(&mut self, why: &str) {
        self.warmup.finish();
        self.tasks.cancel(&TaskId::Warmup);
        tracing::info!(
            "Warm-up {} after {} event(s), scheduler taking over",
            why,
            self.warmup.status().fired
        );
        self.start_scheduler();
    }

    fn sub_trigger_tick(&mut self, name: &str, now: u64) {
        let Some(trigger) = self
            .config
            .sub_triggers
            .iter()
            .find(|t| t.name == name)
            .cloned()
        else {
            self.tasks.cancel(&TaskId::SubTrigger(name.to_string()));
            return;
        };

        let intensity = self.session.intensity;
        if intensity < trigger.min_intensity {
            return;
        }
        let p = clamp_unit(trigger.chance * intensity / 100.0);
        if !self.rng.gen_bool(p) {
            return;
        }

        if !self.spacing.is_open(now) {
            self.metrics.dropped_by_spacing += 1;
            tracing::debug!(
                "Sub-trigger '{}' suppressed, spacing open in {}ms",
                name,
                self.spacing.remaining_ms(now)
            );
            return;
        }
        self.spacing.mark(now);

        self.session.last_event_ms = Some(now);
        let plan = BundlePlan::for_category(
            &self.registry,
            FireSource::SubTrigger(trigger.name),
            trigger.category,
            EffectContext::at(intensity),
            now,
            self.session.generation,
        );
        self.in_flight.push(tokio::spawn(run_bundle(plan)));
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Selections queued by the scheduler callback, minus those selected
    /// before the last reset.
    fn take_fired(&mut self) -> Vec<ScheduledEvent> {
        let current = self.session.generation;
        let mut fresh = Vec::new();
        while let Ok(queued) = self.fired_rx.try_recv() {
            if queued.generation == current {
                fresh.push(queued.event);
            } else {
                self.metrics.dropped_stale += 1;
                tracing::debug!(
                    kind = %queued.event.kind,
                    "Discarding event from generation {} (now {})",
                    queued.generation,
                    current
                );
            }
        }
        fresh
    }

    fn plan_fire(&mut self, event: ScheduledEvent, source: FireSource) -> BundlePlan {
        self.session.last_event_ms = Some(event.timestamp_ms);
        let dispatch = self
            .scheduler
            .model()
            .dispatch(&event.kind)
            .cloned()
            .unwrap_or_default();
        tracing::debug!(
            kind = %event.kind,
            source = ?source,
            "Dispatching event at intensity {:.0}",
            event.intensity
        );
        let ctx = EffectContext {
            intensity: event.intensity,
            kind: Some(event.kind),
            category: None,
            variant: event.variant,
        };
        BundlePlan::for_dispatch(
            &self.registry,
            source,
            &dispatch,
            ctx,
            event.timestamp_ms,
            self.session.generation,
        )
    }

    /// Spawn a bundle for every queued selection. Forced selections are
    /// attributed to `forced_source`.
    fn drain_fired(&mut self, forced_source: FireSource) {
        for event in self.take_fired() {
            let source = if event.forced {
                forced_source.clone()
            } else {
                FireSource::Scheduled
            };
            let plan = self.plan_fire(event, source);
            self.in_flight.push(tokio::spawn(run_bundle(plan)));
        }
    }

    async fn reap(&mut self) {
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|handle| handle.is_finished());
        self.in_flight = pending;
        for handle in done {
            self.absorb_join(handle.await);
        }
    }

    fn absorb_join(&mut self, joined: Result<BundleReport, tokio::task::JoinError>) {
        match joined {
            Ok(report) => self.absorb(report),
            Err(e) => {
                self.metrics.handler_panics += 1;
                tracing::warn!("Bundle task failed: {}", e);
            }
        }
    }

    fn absorb(&mut self, report: BundleReport) {
        self.metrics.absorb(&report);
        self.event_log.push(report);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Fire a coordinated event now, subject to activity and global spacing.
    /// Returns `None` when the request was dropped.
    pub async fn trigger_coordinated_event(
        &mut self,
        category: CoordinatedCategory,
    ) -> Option<BundleReport> {
        let plan = self.plan_coordinated_event(category)?;
        Some(self.run_now(plan).await)
    }

    /// Like [`trigger_coordinated_event`](Self::trigger_coordinated_event)
    /// but ignores spacing and inactivity. Safety still wins.
    pub async fn force_coordinated_event(
        &mut self,
        category: CoordinatedCategory,
    ) -> Option<BundleReport> {
        let plan = self.plan_forced_coordinated_event(category)?;
        Some(self.run_now(plan).await)
    }

    /// Force a kind (or any enabled kind) through the scheduler and dispatch it.
    pub async fn force_event(&mut self, kind: Option<EventKind>) -> Option<BundleReport> {
        let plan = self.plan_forced_event(kind)?;
        Some(self.run_now(plan).await)
    }

    async fn run_now(&mut self, plan: BundlePlan) -> BundleReport {
        let report = run_bundle(plan).await;
        self.record_report(report.clone());
        report
    }

    /// Bookkeeping half of
    /// [`trigger_coordinated_event`](Self::trigger_coordinated_event): checks
    /// activity and spacing, marks the gate and resolves handlers. The caller
    /// runs the plan and hands the report to [`record_report`](Self::record_report).
    pub fn plan_coordinated_event(&mut self, category: CoordinatedCategory) -> Option<BundlePlan> {
        if self.disposed || !self.session.is_active {
            self.metrics.dropped_inactive += 1;
            tracing::debug!("Coordinated event '{}' dropped: session inactive", category.as_str());
            return None;
        }
        let now = self.clock.now_ms();
        if !self.spacing.is_open(now) {
            self.metrics.dropped_by_spacing += 1;
            tracing::debug!(
                "Coordinated event '{}' dropped: spacing open in {}ms",
                category.as_str(),
                self.spacing.remaining_ms(now)
            );
            return None;
        }
        self.spacing.mark(now);
        Some(self.plan_category(FireSource::Command, category, now))
    }

    pub fn plan_forced_coordinated_event(
        &mut self,
        category: CoordinatedCategory,
    ) -> Option<BundlePlan> {
        if self.disposed || self.safety_engaged {
            return None;
        }
        let now = self.clock.now_ms();
        self.spacing.mark(now);
        Some(self.plan_category(FireSource::Forced, category, now))
    }

    /// Records the forced kind and plans its dispatch. Selections the
    /// scheduler queued before it are spawned as usual.
    pub fn plan_forced_event(&mut self, kind: Option<EventKind>) -> Option<BundlePlan> {
        if self.disposed || self.safety_engaged {
            return None;
        }
        self.scheduler.force_trigger(kind)?;

        let mut fired = self.take_fired();
        let forced = fired.pop()?;
        for earlier in fired {
            let plan = self.plan_fire(earlier, FireSource::Scheduled);
            self.in_flight.push(tokio::spawn(run_bundle(plan)));
        }
        Some(self.plan_fire(forced, FireSource::Forced))
    }

    /// Fold a finished command bundle into the event log and metrics.
    pub fn record_report(&mut self, report: BundleReport) {
        self.absorb(report);
    }

    fn plan_category(
        &mut self,
        source: FireSource,
        category: CoordinatedCategory,
        now: u64,
    ) -> BundlePlan {
        self.session.last_event_ms = Some(now);
        BundlePlan::for_category(
            &self.registry,
            source,
            category,
            EffectContext::at(self.session.intensity),
            now,
            self.session.generation,
        )
    }

    /// External intensity spike (e.g. a metric crossing a threshold).
    pub async fn nudge_intensity(&mut self, delta: f64) -> f64 {
        if self.disposed || !self.session.is_active {
            return self.session.intensity;
        }
        let current = self.session.set_intensity(self.session.intensity + delta);
        self.scheduler.update_intensity(current);
        self.drain_fired(FireSource::Forced);
        current
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Register (or replace) a handler. Joins immediately when the
    /// coordinator is already initialized.
    pub async fn register_effect_handler(&mut self, name: &str, handler: Arc<dyn EffectHandler>) {
        if self.disposed {
            tracing::warn!("Coordinator disposed, ignoring handler '{}'", name);
            return;
        }
        if let Some(replaced) = self.registry.insert(name, handler) {
            tracing::debug!("Replacing effect handler '{}'", name);
            replaced.dispose();
        }
        if self.initialized {
            if !self.registry.initialize_one(name).await {
                self.metrics.init_failures += 1;
            }
            if self.safety_engaged {
                self.registry.force_disable_all();
            }
        }
    }

    pub fn unregister_effect_handler(&mut self, name: &str) -> bool {
        match self.registry.remove(name) {
            Some(handler) => {
                handler.dispose();
                tracing::debug!("Unregistered effect handler '{}'", name);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Safety & configuration
    // ========================================================================

    pub fn safe_mode_changed(&mut self, enabled: bool) {
        self.signals.safe_mode = enabled;
        self.session.is_safe_mode = enabled;
        self.apply_safety();
    }

    pub fn accessibility_changed(&mut self, state: AccessibilityState) {
        self.signals.accessibility = state;
        self.apply_safety();
    }

    pub fn debugging_changed(&mut self, debugging: bool) {
        self.signals.debugging = debugging;
        self.apply_safety();
    }

    fn apply_safety(&mut self) {
        if self.disposed {
            return;
        }
        let asserted = self.signals.any_asserted(&self.config.safety);
        if asserted && !self.safety_engaged {
            tracing::info!(signals = ?self.signals, "Safety interrupt engaged");
            self.safety_engaged = true;
            self.deactivate();
            self.registry.force_disable_all();
        } else if !asserted && self.safety_engaged {
            tracing::info!("Safety interrupt cleared");
            self.safety_engaged = false;
            self.registry.restore_force_disabled();
            if self.initialized && self.is_eligible() {
                self.start_session(ResetReason::SafetyCleared);
            }
        }
    }

    /// Re-apply a changed configuration without losing session counters.
    pub fn apply_config(&mut self, config: DreadConfig) {
        if self.disposed {
            return;
        }
        let config = config.sanitized();
        let was_enabled = self.config.enabled;

        let kept: HashSet<EventKind> = config.events.iter().map(|s| s.kind.clone()).collect();
        let model = self.scheduler.model_mut();
        for kind in model.kinds() {
            if !kept.contains(&kind) {
                tracing::info!("Event kind '{}' no longer configured, disabling", kind);
                model.set_event_enabled(&kind, false);
            }
        }
        for spec in config.events.iter().cloned() {
            model.upsert_kind(spec);
        }
        model.set_history_capacity(config.probability.history_capacity);

        self.scheduler.set_config(config.scheduler.clone());
        self.spacing
            .set_min_spacing_secs(config.session.min_spacing_secs);
        self.event_log
            .set_capacity(config.diagnostics.event_log_capacity);
        self.warmup.set_timeout_secs(config.warmup.timeout_secs);
        self.config = config;

        if self.session.is_active {
            let now = self.clock.now_ms();
            self.schedule_periodic_tasks(now);
            if self.warmup.is_running() {
                self.tasks.schedule_every(
                    TaskId::Warmup,
                    self.config.warmup.interval_secs * 1000,
                    now,
                );
            }
        }

        match (was_enabled, self.config.enabled) {
            (true, false) => {
                tracing::info!("Feature disabled by configuration");
                self.deactivate();
            }
            (false, true) if self.initialized && self.is_eligible() => {
                tracing::info!("Feature enabled by configuration");
                self.start_session(ResetReason::ConfigChanged);
            }
            _ => {}
        }
        self.apply_safety();
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub fn get_state(&self) -> CoordinatorSnapshot {
        let now = self.clock.now_ms();
        CoordinatorSnapshot {
            enabled: self.config.enabled,
            initialized: self.initialized,
            disposed: self.disposed,
            session: self.session.clone(),
            scheduler: self.scheduler.state(),
            warmup: self.warmup.status(),
            safety: self.signals,
            safety_engaged: self.safety_engaged,
            handlers: self.registry.statuses(),
            active_tasks: self.tasks.active(),
            in_flight: self.in_flight.len(),
            spacing_remaining_ms: self.spacing.remaining_ms(now),
        }
    }

    pub fn get_event_statistics(&self) -> EventStatistics {
        self.scheduler.model().statistics()
    }

    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.clone()
    }

    pub fn get_event_log(&self) -> Vec<BundleReport> {
        self.event_log.snapshot()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn config(&self) -> &DreadConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
