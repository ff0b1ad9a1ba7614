//! Real-time driver: shares a [`Coordinator`] behind a tokio mutex and ticks
//! it from a background task.

use crate::bundle::{run_bundle, BundlePlan, BundleReport};
use crate::coordinator::Coordinator;
use crate::diagnostics::{CoordinatorSnapshot, PerformanceMetrics};
use crate::handler::EffectHandler;
use crate::probability::EventStatistics;
use crate::safety::AccessibilityState;
use dread_core::{CoordinatedCategory, DreadConfig, EventKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

/// Upper bound on one sleep so clock jumps are noticed.
const MAX_IDLE_MS: u64 = 1000;

#[derive(Clone)]
pub struct CoordinatorHandle {
    inner: Arc<Mutex<Coordinator>>,
    /// Wakes the loop early after anything that may move the next deadline
    wake: Arc<Notify>,
}

impl CoordinatorHandle {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(coordinator)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Spawn the tick loop. It initializes the coordinator, then runs until
    /// `shutdown` turns true (or its sender is dropped), then settles and
    /// disposes.
    pub fn spawn(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let wake = Arc::clone(&self.wake);

        tokio::spawn(async move {
            inner.lock().await.initialize().await;

            loop {
                if *shutdown.borrow() {
                    break;
                }

                let wait_ms = {
                    let coordinator = inner.lock().await;
                    let now = coordinator.clock().now_ms();
                    coordinator
                        .next_wake_ms()
                        .map(|due| due.saturating_sub(now))
                        .unwrap_or(MAX_IDLE_MS)
                        .min(MAX_IDLE_MS)
                };

                let sender_gone = tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => false,
                    _ = wake.notified() => false,
                    changed = shutdown.changed() => changed.is_err(),
                };
                if sender_gone || *shutdown.borrow() {
                    break;
                }

                inner.lock().await.tick().await;
            }

            let mut coordinator = inner.lock().await;
            coordinator.settle().await;
            coordinator.dispose();
            tracing::info!("Coordinator loop stopped");
        })
    }

    pub async fn register_effect_handler(&self, name: &str, handler: Arc<dyn EffectHandler>) {
        self.inner
            .lock()
            .await
            .register_effect_handler(name, handler)
            .await;
    }

    pub async fn unregister_effect_handler(&self, name: &str) -> bool {
        self.inner.lock().await.unregister_effect_handler(name)
    }

    pub async fn record_activity(&self) {
        self.inner.lock().await.record_activity();
        self.wake.notify_one();
    }

    pub async fn reset_session(&self) {
        self.inner.lock().await.reset_session();
        self.wake.notify_one();
    }

    pub async fn safe_mode_changed(&self, enabled: bool) {
        self.inner.lock().await.safe_mode_changed(enabled);
        self.wake.notify_one();
    }

    pub async fn accessibility_changed(&self, state: AccessibilityState) {
        self.inner.lock().await.accessibility_changed(state);
        self.wake.notify_one();
    }

    pub async fn debugging_changed(&self, debugging: bool) {
        self.inner.lock().await.debugging_changed(debugging);
        self.wake.notify_one();
    }

    pub async fn apply_config(&self, config: DreadConfig) {
        self.inner.lock().await.apply_config(config);
        self.wake.notify_one();
    }

    // Command bundles run with the lock released; only planning and
    // recording the report take it.

    pub async fn trigger_coordinated_event(
        &self,
        category: CoordinatedCategory,
    ) -> Option<BundleReport> {
        let plan = self.inner.lock().await.plan_coordinated_event(category)?;
        Some(self.run_unlocked(plan).await)
    }

    pub async fn force_coordinated_event(
        &self,
        category: CoordinatedCategory,
    ) -> Option<BundleReport> {
        let plan = self
            .inner
            .lock()
            .await
            .plan_forced_coordinated_event(category)?;
        Some(self.run_unlocked(plan).await)
    }

    pub async fn force_event(&self, kind: Option<EventKind>) -> Option<BundleReport> {
        let plan = self.inner.lock().await.plan_forced_event(kind)?;
        Some(self.run_unlocked(plan).await)
    }

    async fn run_unlocked(&self, plan: BundlePlan) -> BundleReport {
        let report = run_bundle(plan).await;
        self.inner.lock().await.record_report(report.clone());
        report
    }

    pub async fn nudge_intensity(&self, delta: f64) -> f64 {
        let current = self.inner.lock().await.nudge_intensity(delta).await;
        self.wake.notify_one();
        current
    }

    pub async fn get_state(&self) -> CoordinatorSnapshot {
        self.inner.lock().await.get_state()
    }

    pub async fn get_event_statistics(&self) -> EventStatistics {
        self.inner.lock().await.get_event_statistics()
    }

    pub async fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.inner.lock().await.get_performance_metrics()
    }

    pub async fn get_event_log(&self) -> Vec<BundleReport> {
        self.inner.lock().await.get_event_log()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::EffectContext;
    use async_trait::async_trait;
    use dread_core::{EffectOp, ManualClock};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Handler whose every effect takes five seconds.
    struct SlowHandler {
        enabled: AtomicBool,
        started: Notify,
    }

    #[async_trait]
    impl EffectHandler for SlowHandler {
        async fn initialize(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn dispose(&self) {}

        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }

        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }

        fn supports(&self, _op: EffectOp) -> bool {
            true
        }

        async fn perform(&self, _op: EffectOp, _ctx: &EffectContext) -> anyhow::Result<()> {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_loop_initializes_and_disposes_on_shutdown() {
        let clock = ManualClock::new(0);
        let coordinator = Coordinator::with_seed(DreadConfig::default(), Arc::new(clock), 1);
        let handle = CoordinatorHandle::new(coordinator);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = handle.spawn(shutdown_rx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.get_state().await.initialized);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        let state = handle.get_state().await;
        assert!(state.disposed);
        assert!(!state.session.is_active);
    }

    #[tokio::test]
    async fn test_dropping_shutdown_sender_stops_loop() {
        let coordinator =
            Coordinator::with_seed(DreadConfig::default(), Arc::new(ManualClock::new(0)), 2);
        let handle = CoordinatorHandle::new(coordinator);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = handle.spawn(shutdown_rx);
        drop(shutdown_tx);
        task.await.unwrap();
        assert!(handle.get_state().await.disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_not_blocked_by_running_bundle() {
        let mut config = DreadConfig::default();
        config.sub_triggers.clear();
        let mut coordinator =
            Coordinator::with_seed(config, Arc::new(ManualClock::new(0)), 3);
        let slow = Arc::new(SlowHandler {
            enabled: AtomicBool::new(false),
            started: Notify::new(),
        });
        coordinator
            .register_effect_handler("visual", slow.clone())
            .await;
        coordinator.initialize().await;
        let handle = CoordinatorHandle::new(coordinator);

        let running = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .trigger_coordinated_event(CoordinatedCategory::Subtle)
                    .await
            })
        };
        slow.started.notified().await;

        let signalled =
            tokio::time::timeout(Duration::from_millis(500), handle.safe_mode_changed(true)).await;
        assert!(signalled.is_ok(), "safety signal waited on the handler");

        let state = handle.get_state().await;
        assert!(state.safety_engaged);
        assert!(!state.session.is_active);

        let report = running.await.unwrap().unwrap();
        assert_eq!(report.performed(), 1);
        assert_eq!(handle.get_event_log().await.len(), 1);
        assert_eq!(handle.get_performance_metrics().await.bundles, 1);
    }
}
