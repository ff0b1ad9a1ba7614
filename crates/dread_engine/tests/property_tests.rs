//! Property-based tests for the probability model and scheduler.

use dread_core::{Clock, EventKind, KindSpec, ManualClock, SchedulerConfig};
use dread_engine::{ProbabilityModel, Scheduler};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

fn arb_window() -> impl Strategy<Value = (u64, u64)> {
    (1u64..200_000, 0u64..200_000).prop_map(|(min, span)| (min, min + span))
}

fn arb_spec() -> impl Strategy<Value = KindSpec> {
    ("[a-z]{1,8}", -1.0f64..2.0, 0u32..5, -10.0f64..110.0).prop_map(
        |(name, base_chance, max_per_session, min_intensity)| KindSpec {
            kind: EventKind::new(name),
            base_chance,
            cooldown_secs: 0.0,
            max_per_session,
            min_intensity,
            ..Default::default()
        },
    )
}

fn model(catalog: Vec<KindSpec>, seed: u64) -> ProbabilityModel {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
    ProbabilityModel::with_seed(catalog, 64, clock, seed)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Delay never leaves [min_cooldown_ms, max_cooldown_ms].
    #[test]
    fn delay_within_window(
        (min, max) in arb_window(),
        intensity in -50.0f64..150.0,
        jitter in 0.0f64..0.9,
        scaling in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let config = SchedulerConfig {
            min_cooldown_ms: min,
            max_cooldown_ms: max,
            jitter,
            intensity_scaling: scaling,
            ..Default::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let mut scheduler = Scheduler::with_seed(config, model(vec![], seed), clock, seed);
        scheduler.update_intensity(intensity);
        for _ in 0..10 {
            let delay = scheduler.calculate_next_event_delay();
            prop_assert!(delay >= min && delay <= max, "delay {} outside [{}, {}]", delay, min, max);
        }
    }

    /// Probability is a valid probability for any catalog entry and intensity.
    #[test]
    fn probability_always_unit(spec in arb_spec(), intensity in -50.0f64..150.0) {
        let kind = spec.kind.clone();
        let model = model(vec![spec], 0);
        let p = model.calculate_event_probability(&kind, intensity);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    /// A kind never exceeds its session cap through random selection.
    #[test]
    fn selection_respects_session_cap(specs in proptest::collection::vec(arb_spec(), 1..5), seed in any::<u64>()) {
        let mut model = model(specs, seed);
        for _ in 0..200 {
            if let Some(kind) = model.select_random_event(100.0) {
                model.record_event(&kind, 100.0, None);
            }
        }
        for kind in model.kinds() {
            let cap = model.config(&kind).map(|c| c.max_per_session).unwrap_or(0);
            prop_assert!(model.session_count(&kind) <= cap);
        }
    }
}
