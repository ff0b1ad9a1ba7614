//! End-to-end coordinator behaviour driven by a manual clock.

use async_trait::async_trait;
use dread_core::{
    default_catalog, CoordinatedCategory, DreadConfig, EffectOp, EventKind, ManualClock,
    ResetReason,
};
use dread_engine::{
    AccessibilityState, Coordinator, EffectContext, EffectHandler, FireSource, StepOutcome,
    WarmupStage,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test doubles
// ============================================================================

struct TestHandler {
    ops: Vec<EffectOp>,
    fail_init: bool,
    fail_perform: bool,
    enabled: AtomicBool,
    disposed: AtomicBool,
    performed: Mutex<Vec<EffectOp>>,
}

impl TestHandler {
    fn new(ops: &[EffectOp]) -> Arc<Self> {
        Arc::new(Self::build(ops, false, false))
    }

    fn failing_init(ops: &[EffectOp]) -> Arc<Self> {
        Arc::new(Self::build(ops, true, false))
    }

    fn failing_perform(ops: &[EffectOp]) -> Arc<Self> {
        Arc::new(Self::build(ops, false, true))
    }

    fn build(ops: &[EffectOp], fail_init: bool, fail_perform: bool) -> Self {
        Self {
            ops: ops.to_vec(),
            fail_init,
            fail_perform,
            enabled: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            performed: Mutex::new(Vec::new()),
        }
    }

    fn performed(&self) -> Vec<EffectOp> {
        self.performed.lock().unwrap().clone()
    }
}

#[async_trait]
impl EffectHandler for TestHandler {
    async fn initialize(&self) -> anyhow::Result<()> {
        if self.fail_init {
            anyhow::bail!("initialization refused");
        }
        Ok(())
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn supports(&self, op: EffectOp) -> bool {
        self.ops.contains(&op)
    }

    async fn perform(&self, op: EffectOp, _ctx: &EffectContext) -> anyhow::Result<()> {
        if self.fail_perform {
            anyhow::bail!("device lost");
        }
        self.performed.lock().unwrap().push(op);
        Ok(())
    }
}

const VISUAL_OPS: &[EffectOp] = &[
    EffectOp::Jumpscare,
    EffectOp::ScreenShake,
    EffectOp::Glitch,
    EffectOp::Flicker,
    EffectOp::Vignette,
];

/// Defaults without sub-triggers, so only what a test drives fires.
fn quiet_config() -> DreadConfig {
    let mut config = DreadConfig::default();
    config.sub_triggers.clear();
    config
}

fn coordinator_with(config: DreadConfig) -> (Coordinator, ManualClock) {
    let clock = ManualClock::new(1_700_000_000_000);
    let coordinator = Coordinator::with_seed(config, Arc::new(clock.clone()), 42);
    (coordinator, clock)
}

async fn step(coordinator: &mut Coordinator, clock: &ManualClock, secs: u64) {
    clock.advance(Duration::from_secs(secs));
    coordinator.record_activity();
    coordinator.tick().await;
}

// ============================================================================
// Initialization & handlers
// ============================================================================

#[tokio::test]
async fn test_init_failure_isolated_to_one_handler() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    let audio = TestHandler::failing_init(&[EffectOp::Stinger]);
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("audio", audio.clone()).await;
    coordinator.register_effect_handler("visual", visual.clone()).await;

    coordinator.initialize().await;

    assert!(!audio.is_enabled());
    assert!(visual.is_enabled());
    assert!(coordinator.session().is_active);
    assert_eq!(coordinator.get_performance_metrics().init_failures, 1);
}

#[tokio::test]
async fn test_handler_fault_does_not_stop_bundle() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    let audio = TestHandler::failing_perform(&[EffectOp::Stinger]);
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("audio", audio.clone()).await;
    coordinator.register_effect_handler("visual", visual.clone()).await;
    coordinator.initialize().await;

    let report = coordinator
        .force_coordinated_event(CoordinatedCategory::Jumpscare)
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.performed(), 2);
    assert_eq!(visual.performed(), vec![EffectOp::Jumpscare, EffectOp::ScreenShake]);
    assert!(audio.is_enabled(), "a failing perform does not disable the handler");

    let metrics = coordinator.get_performance_metrics();
    assert_eq!(metrics.step_failures, 1);
    assert_eq!(metrics.handlers["visual"].calls, 2);
    assert_eq!(coordinator.get_event_log().len(), 1);
}

#[tokio::test]
async fn test_late_registration_initializes_immediately() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    coordinator.initialize().await;

    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", visual.clone()).await;
    assert!(visual.is_enabled());

    coordinator.safe_mode_changed(true);
    let typing = TestHandler::new(&[EffectOp::PhantomTyping]);
    coordinator.register_effect_handler("typing", typing.clone()).await;
    assert!(!typing.is_enabled(), "joins force-disabled while safety is engaged");

    coordinator.safe_mode_changed(false);
    assert!(typing.is_enabled());
    assert!(visual.is_enabled());
}

#[tokio::test]
async fn test_replacing_and_unregistering_dispose_old_handler() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    let first = TestHandler::new(VISUAL_OPS);
    let second = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", first.clone()).await;
    coordinator.register_effect_handler("visual", second.clone()).await;
    assert!(first.disposed.load(Ordering::SeqCst));

    assert!(coordinator.unregister_effect_handler("visual"));
    assert!(second.disposed.load(Ordering::SeqCst));
    assert!(!coordinator.unregister_effect_handler("visual"));
}

// ============================================================================
// Spacing
// ============================================================================

#[tokio::test]
async fn test_global_spacing_drops_second_request() {
    let (mut coordinator, clock) = coordinator_with(quiet_config());
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", visual.clone()).await;
    coordinator.initialize().await;

    assert!(coordinator
        .trigger_coordinated_event(CoordinatedCategory::Subtle)
        .await
        .is_some());
    assert!(coordinator
        .trigger_coordinated_event(CoordinatedCategory::Jumpscare)
        .await
        .is_none());
    assert_eq!(coordinator.get_performance_metrics().dropped_by_spacing, 1);
    assert_eq!(visual.performed(), vec![EffectOp::Flicker]);

    clock.advance(Duration::from_secs(60));
    assert!(coordinator
        .trigger_coordinated_event(CoordinatedCategory::Jumpscare)
        .await
        .is_some());
}

#[tokio::test]
async fn test_forced_event_bypasses_spacing() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", visual.clone()).await;
    coordinator.initialize().await;

    coordinator
        .trigger_coordinated_event(CoordinatedCategory::Ambient)
        .await
        .unwrap();
    let report = coordinator.force_event(Some(EventKind::GLITCH)).await.unwrap();

    assert_eq!(report.source, FireSource::Forced);
    assert_eq!(report.kind, Some(EventKind::GLITCH));
    assert!(matches!(report.steps[0].outcome, StepOutcome::Performed));
    assert_eq!(coordinator.get_event_statistics().per_kind["glitch"].session_count, 1);
}

#[tokio::test]
async fn test_sub_trigger_respects_global_spacing() {
    let mut config = DreadConfig::default();
    config.warmup.enabled = false;
    config.session.floor_intensity = 100.0;
    config.scheduler.max_events_per_session = 0;
    config.sub_triggers.retain(|t| t.name == "ambient");
    config.sub_triggers[0].chance = 1.0;
    let (mut coordinator, clock) = coordinator_with(config);
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", visual.clone()).await;
    coordinator.initialize().await;

    assert!(coordinator
        .trigger_coordinated_event(CoordinatedCategory::Subtle)
        .await
        .is_some());

    // ambient comes due 45s later, inside the 60s window
    step(&mut coordinator, &clock, 45).await;
    coordinator.settle().await;
    assert_eq!(coordinator.get_performance_metrics().dropped_by_spacing, 1);
    assert_eq!(coordinator.get_event_log().len(), 1);

    step(&mut coordinator, &clock, 45).await;
    coordinator.settle().await;
    let log = coordinator.get_event_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].source, FireSource::SubTrigger("ambient".to_string()));
    assert_eq!(log[1].started_ms - log[0].started_ms, 90_000);
    assert_eq!(coordinator.get_performance_metrics().dropped_by_spacing, 1);
}

// ============================================================================
// Escalation & inactivity
// ============================================================================

#[tokio::test]
async fn test_escalation_scenario() {
    let (mut coordinator, clock) = coordinator_with(quiet_config());
    coordinator.initialize().await;
    assert_eq!(coordinator.session().intensity, 20.0);

    for _ in 0..3 {
        step(&mut coordinator, &clock, 120).await;
    }
    assert_eq!(coordinator.session().intensity, 35.0);
    assert_eq!(coordinator.scheduler().state().current_intensity, 35.0);

    for _ in 3..20 {
        step(&mut coordinator, &clock, 120).await;
    }
    assert_eq!(coordinator.session().intensity, 100.0);
}

#[tokio::test]
async fn test_inactivity_resets_and_activity_resumes() {
    let (mut coordinator, clock) = coordinator_with(quiet_config());
    coordinator.initialize().await;
    for _ in 0..2 {
        step(&mut coordinator, &clock, 120).await;
    }
    assert_eq!(coordinator.session().intensity, 30.0);
    let first_session = coordinator.session().session_id;

    clock.advance(Duration::from_secs(330));
    coordinator.tick().await;

    let state = coordinator.get_state();
    assert!(!state.session.is_active);
    assert_eq!(state.session.intensity, 20.0);
    assert!(state.active_tasks.is_empty());
    assert!(!state.scheduler.is_running);
    assert_eq!(coordinator.get_event_statistics().session_events, 0);
    assert_eq!(state.session.last_reset, Some(ResetReason::Inactivity));

    coordinator.record_activity();
    assert!(coordinator.session().is_active);
    assert_ne!(coordinator.session().session_id, first_session);
    assert_eq!(coordinator.session().last_reset, Some(ResetReason::Start));
}

// ============================================================================
// Safety
// ============================================================================

#[tokio::test]
async fn test_safety_interrupt_and_restore() {
    let (mut coordinator, clock) = coordinator_with(quiet_config());
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", visual.clone()).await;
    coordinator.initialize().await;
    for _ in 0..2 {
        step(&mut coordinator, &clock, 120).await;
    }

    coordinator.accessibility_changed(AccessibilityState {
        reduced_motion: true,
        screen_reader: false,
    });
    let state = coordinator.get_state();
    assert!(state.safety_engaged);
    assert!(!state.session.is_active);
    assert!(state.active_tasks.is_empty());
    assert!(!visual.is_enabled());
    assert!(coordinator
        .trigger_coordinated_event(CoordinatedCategory::Subtle)
        .await
        .is_none());
    assert!(coordinator.force_event(None).await.is_none());

    coordinator.accessibility_changed(AccessibilityState::default());
    let state = coordinator.get_state();
    assert!(!state.safety_engaged);
    assert!(state.session.is_active);
    assert_eq!(state.session.intensity, 20.0);
    assert!(visual.is_enabled());
}

#[tokio::test]
async fn test_debugging_ignored_when_not_configured() {
    let mut config = quiet_config();
    config.safety.pause_while_debugging = false;
    let (mut coordinator, _) = coordinator_with(config);
    coordinator.initialize().await;

    coordinator.debugging_changed(true);
    assert!(coordinator.session().is_active);

    coordinator.safe_mode_changed(true);
    assert!(!coordinator.session().is_active);
    assert!(coordinator.session().is_safe_mode);
}

// ============================================================================
// Warm-up & scheduler
// ============================================================================

#[tokio::test]
async fn test_warmup_covers_catalog_then_hands_over() {
    let mut config = quiet_config();
    config.events = default_catalog().into_iter().take(3).collect();
    let (mut coordinator, clock) = coordinator_with(config);
    coordinator.initialize().await;

    assert_eq!(coordinator.get_state().warmup.stage, WarmupStage::Running);
    assert!(!coordinator.scheduler().is_running());

    for _ in 0..3 {
        step(&mut coordinator, &clock, 15).await;
    }
    coordinator.settle().await;

    let state = coordinator.get_state();
    assert_eq!(state.warmup.stage, WarmupStage::Finished);
    assert_eq!(state.warmup.fired, 3);
    assert!(state.scheduler.is_running);

    let stats = coordinator.get_event_statistics();
    assert!(stats.per_kind.values().all(|k| k.session_count == 1));
    let log = coordinator.get_event_log();
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|r| r.source == FireSource::Warmup));
}

#[tokio::test]
async fn test_warmup_times_out() {
    let mut config = quiet_config();
    config.warmup.timeout_secs = 20;
    let (mut coordinator, clock) = coordinator_with(config);
    coordinator.initialize().await;

    for _ in 0..2 {
        step(&mut coordinator, &clock, 15).await;
    }

    let state = coordinator.get_state();
    assert_eq!(state.warmup.stage, WarmupStage::Finished);
    assert_eq!(state.warmup.fired, 1);
    assert!(state.scheduler.is_running);
}

#[tokio::test]
async fn test_scheduled_events_reach_handlers() {
    let mut config = quiet_config();
    config.warmup.enabled = false;
    config.session.floor_intensity = 100.0;
    config.events = vec![dread_core::KindSpec {
        kind: EventKind::GLITCH,
        base_chance: 1.0,
        cooldown_secs: 0.0,
        max_per_session: 50,
        dispatch: dread_core::Dispatch::Step {
            handler: "visual".into(),
            op: EffectOp::Glitch,
        },
        ..Default::default()
    }];
    let (mut coordinator, clock) = coordinator_with(config);
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", visual.clone()).await;
    coordinator.initialize().await;
    assert!(coordinator.scheduler().is_running());

    for _ in 0..200 {
        step(&mut coordinator, &clock, 1).await;
    }
    coordinator.settle().await;

    let log = coordinator.get_event_log();
    assert!(!log.is_empty());
    assert!(log.iter().all(|r| r.source == FireSource::Scheduled));
    assert!(visual.performed().iter().all(|op| *op == EffectOp::Glitch));
    assert_eq!(
        coordinator.get_event_statistics().total_recorded as usize,
        log.len()
    );
}

// ============================================================================
// Commands & lifecycle
// ============================================================================

#[tokio::test]
async fn test_nudge_intensity_clamps() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    coordinator.initialize().await;

    assert_eq!(coordinator.nudge_intensity(-500.0).await, 0.0);
    assert_eq!(coordinator.nudge_intensity(500.0).await, 100.0);
    assert_eq!(coordinator.session().intensity, 100.0);
    assert_eq!(coordinator.scheduler().state().current_intensity, 100.0);
}

#[tokio::test]
async fn test_initialize_and_dispose_are_idempotent() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    let visual = TestHandler::new(VISUAL_OPS);
    coordinator.register_effect_handler("visual", visual.clone()).await;

    coordinator.initialize().await;
    let session = coordinator.session().session_id;
    coordinator.initialize().await;
    assert_eq!(coordinator.session().session_id, session);

    coordinator.dispose();
    coordinator.dispose();
    assert!(visual.disposed.load(Ordering::SeqCst));
    assert!(coordinator.get_state().disposed);
}

#[tokio::test]
async fn test_disabled_feature_stays_idle_until_enabled() {
    let mut config = quiet_config();
    config.enabled = false;
    let (mut coordinator, _) = coordinator_with(config.clone());
    coordinator.initialize().await;
    assert!(!coordinator.session().is_active);

    config.enabled = true;
    coordinator.apply_config(config.clone());
    assert!(coordinator.session().is_active);

    config.enabled = false;
    coordinator.apply_config(config);
    assert!(!coordinator.session().is_active);
    assert!(coordinator.next_wake_ms().is_none());
}

#[tokio::test]
async fn test_apply_config_disables_removed_kinds() {
    let (mut coordinator, _) = coordinator_with(quiet_config());
    coordinator.initialize().await;

    let mut config = quiet_config();
    config.events.retain(|spec| spec.kind != EventKind::JUMPSCARE);
    config.session.min_spacing_secs = 5.0;
    coordinator.apply_config(config);

    let stats = coordinator.get_event_statistics();
    assert!(!stats.per_kind["jumpscare"].enabled);
    assert!(stats.per_kind["glitch"].enabled);
    assert!(coordinator.session().is_active);
}

#[tokio::test]
async fn test_explicit_reset_returns_to_floor() {
    let (mut coordinator, clock) = coordinator_with(quiet_config());
    coordinator.initialize().await;
    for _ in 0..4 {
        step(&mut coordinator, &clock, 120).await;
    }
    coordinator.force_event(Some(EventKind::GLITCH)).await;
    let before = coordinator.session().generation;

    coordinator.reset_session();

    let session = coordinator.session();
    assert_eq!(session.intensity, 20.0);
    assert!(session.is_active);
    assert!(session.generation > before);
    assert_eq!(coordinator.get_event_statistics().session_events, 0);
    assert_eq!(coordinator.get_state().scheduler.session_event_count, 0);
}
