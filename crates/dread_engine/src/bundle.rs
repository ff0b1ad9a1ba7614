//! Coordinated-event execution.
//!
//! A bundle is planned synchronously (handlers resolved from the registry at
//! fire time) and then run step by step. Each step is isolated: a missing,
//! disabled, unwilling, failing or panicking handler affects only its own
//! step.

use crate::handler::{EffectContext, EffectHandler, StepError};
use crate::registry::HandlerRegistry;
use dread_core::{BundleStep, CoordinatedCategory, Dispatch, EffectOp, EventKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Who asked for the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireSource {
    Scheduled,
    SubTrigger(String),
    Warmup,
    Forced,
    Command,
}

struct PlannedStep {
    handler_name: String,
    op: EffectOp,
    handler: Option<Arc<dyn EffectHandler>>,
}

pub struct BundlePlan {
    source: FireSource,
    ctx: EffectContext,
    steps: Vec<PlannedStep>,
    started_ms: u64,
    generation: u64,
}

impl BundlePlan {
    pub fn for_category(
        registry: &HandlerRegistry,
        source: FireSource,
        category: CoordinatedCategory,
        mut ctx: EffectContext,
        started_ms: u64,
        generation: u64,
    ) -> Self {
        ctx.category = Some(category);
        Self::from_steps(registry, source, category.steps(), ctx, started_ms, generation)
    }

    /// Plan whatever a kind's catalog entry dispatches to.
    pub fn for_dispatch(
        registry: &HandlerRegistry,
        source: FireSource,
        dispatch: &Dispatch,
        ctx: EffectContext,
        started_ms: u64,
        generation: u64,
    ) -> Self {
        match dispatch {
            Dispatch::Bundle(category) => {
                Self::for_category(registry, source, *category, ctx, started_ms, generation)
            }
            Dispatch::Step { handler, op } => Self {
                source,
                steps: vec![PlannedStep {
                    handler_name: handler.clone(),
                    op: *op,
                    handler: registry.get(handler),
                }],
                ctx,
                started_ms,
                generation,
            },
        }
    }

    fn from_steps(
        registry: &HandlerRegistry,
        source: FireSource,
        steps: &[BundleStep],
        ctx: EffectContext,
        started_ms: u64,
        generation: u64,
    ) -> Self {
        Self {
            source,
            steps: steps
                .iter()
                .map(|step| PlannedStep {
                    handler_name: step.handler.to_string(),
                    op: step.op,
                    handler: registry.get(step.handler),
                })
                .collect(),
            ctx,
            started_ms,
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Performed,
    Skipped { reason: String },
    Failed { error: String, panicked: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub handler: String,
    pub op: EffectOp,
    pub outcome: StepOutcome,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleReport {
    pub source: FireSource,
    pub kind: Option<EventKind>,
    pub category: Option<CoordinatedCategory>,
    pub variant: Option<String>,
    pub intensity: f64,
    pub started_ms: u64,
    pub generation: u64,
    pub steps: Vec<StepReport>,
}

impl BundleReport {
    pub fn performed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Performed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&StepOutcome) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.outcome)).count()
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Run every step in order. Never fails as a whole.
pub async fn run_bundle(plan: BundlePlan) -> BundleReport {
    let BundlePlan {
        source,
        ctx,
        steps,
        started_ms,
        generation,
    } = plan;

    let mut reports = Vec::with_capacity(steps.len());
    for step in steps {
        let started = Instant::now();
        let result = run_step(&step, &ctx).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let outcome = match result {
            Ok(()) => StepOutcome::Performed,
            Err((e, panicked)) if e.is_fault() => {
                tracing::warn!(
                    handler = %step.handler_name,
                    op = %step.op,
                    intensity = ctx.intensity,
                    "Effect step failed: {}",
                    e
                );
                StepOutcome::Failed {
                    error: e.to_string(),
                    panicked,
                }
            }
            Err((e, _)) => {
                tracing::debug!(handler = %step.handler_name, op = %step.op, "Effect step skipped: {}", e);
                StepOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };

        reports.push(StepReport {
            handler: step.handler_name,
            op: step.op,
            outcome,
            elapsed_ms,
        });
    }

    BundleReport {
        source,
        kind: ctx.kind,
        category: ctx.category,
        variant: ctx.variant,
        intensity: ctx.intensity,
        started_ms,
        generation,
        steps: reports,
    }
}

/// The bool in the error is true when the handler panicked.
async fn run_step(step: &PlannedStep, ctx: &EffectContext) -> Result<(), (StepError, bool)> {
    let name = &step.handler_name;
    let Some(handler) = step.handler.clone() else {
        return Err((StepError::MissingHandler(name.clone()), false));
    };
    if !handler.is_enabled() {
        return Err((StepError::Disabled(name.clone()), false));
    }
    if !handler.supports(step.op) {
        return Err((
            StepError::Unsupported {
                handler: name.clone(),
                op: step.op,
            },
            false,
        ));
    }
    if !handler.can_trigger(ctx.intensity) {
        return Err((
            StepError::Declined {
                handler: name.clone(),
                intensity: ctx.intensity,
            },
            false,
        ));
    }

    // Own task so a panicking handler cannot take the bundle down with it.
    let op = step.op;
    let task_ctx = ctx.clone();
    let joined = tokio::spawn(async move { handler.perform(op, &task_ctx).await }).await;

    let failed = |message: String| StepError::Failed {
        handler: name.clone(),
        op,
        message,
    };
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err((failed(format!("{:#}", e)), false)),
        Err(join_err) if join_err.is_panic() => Err((failed("handler panicked".to_string()), true)),
        Err(join_err) => Err((failed(join_err.to_string()), false)),
    }
}
