use async_trait::async_trait;
use dread_core::{CoordinatedCategory, EffectOp, EventKind};
use serde::Serialize;

/// What a handler is told about the effect it is asked to perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectContext {
    pub intensity: f64,
    pub kind: Option<EventKind>,
    pub category: Option<CoordinatedCategory>,
    pub variant: Option<String>,
}

impl EffectContext {
    pub fn at(intensity: f64) -> Self {
        Self {
            intensity,
            kind: None,
            category: None,
            variant: None,
        }
    }
}

// ============================================================================
// EffectHandler trait
// ============================================================================

/// Pluggable effect renderer.
///
/// Handlers are shared behind `Arc` and may be called from spawned bundle
/// tasks, so every method takes `&self`; keep enable state in an atomic.
#[async_trait]
pub trait EffectHandler: Send + Sync {
    async fn initialize(&self) -> anyhow::Result<()>;

    fn dispose(&self);

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    /// Whether `perform` understands `op`.
    fn supports(&self, _op: EffectOp) -> bool {
        false
    }

    /// Handler-local veto (e.g. too intense for this renderer).
    fn can_trigger(&self, _intensity: f64) -> bool {
        true
    }

    async fn perform(&self, op: EffectOp, _ctx: &EffectContext) -> anyhow::Result<()> {
        anyhow::bail!("operation '{}' not implemented", op)
    }
}

// ============================================================================
// Step errors
// ============================================================================

/// Why one step of a bundle did not run to completion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("no handler registered as '{0}'")]
    MissingHandler(String),
    #[error("handler '{handler}' does not support {op}")]
    Unsupported { handler: String, op: EffectOp },
    #[error("handler '{0}' is disabled")]
    Disabled(String),
    #[error("handler '{handler}' declined at intensity {intensity:.0}")]
    Declined { handler: String, intensity: f64 },
    #[error("handler '{handler}' failed on {op}: {message}")]
    Failed {
        handler: String,
        op: EffectOp,
        message: String,
    },
}

impl StepError {
    /// Skips are expected outcomes; failures are handler faults.
    pub fn is_fault(&self) -> bool {
        matches!(self, StepError::Failed { .. })
    }
}
