//! Stand-in effect handlers that log instead of rendering.

use async_trait::async_trait;
use dread_core::{handlers, EffectOp};
use dread_engine::{EffectContext, EffectHandler};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub struct LoggingHandler {
    name: &'static str,
    ops: &'static [EffectOp],
    fail_init: bool,
    enabled: AtomicBool,
    performed: AtomicU64,
}

impl LoggingHandler {
    pub fn new(name: &'static str, ops: &'static [EffectOp], fail_init: bool) -> Self {
        Self {
            name,
            ops,
            fail_init,
            enabled: AtomicBool::new(false),
            performed: AtomicU64::new(0),
        }
    }

    pub fn performed(&self) -> u64 {
        self.performed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EffectHandler for LoggingHandler {
    async fn initialize(&self) -> anyhow::Result<()> {
        if self.fail_init {
            anyhow::bail!("{} handler configured to fail", self.name);
        }
        Ok(())
    }

    fn dispose(&self) {
        tracing::debug!(handler = self.name, "disposed after {} effect(s)", self.performed());
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn supports(&self, op: EffectOp) -> bool {
        self.ops.contains(&op)
    }

    async fn perform(&self, op: EffectOp, ctx: &EffectContext) -> anyhow::Result<()> {
        self.performed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            handler = self.name,
            op = %op,
            intensity = ctx.intensity,
            kind = ctx.kind.as_ref().map(|k| k.as_str()).unwrap_or("-"),
            variant = ctx.variant.as_deref().unwrap_or("-"),
            "effect"
        );
        Ok(())
    }
}

/// One handler per built-in registry name. `fail` names a handler whose
/// initialization should fail.
pub fn demo_handlers(fail: Option<&str>) -> Vec<(&'static str, Arc<LoggingHandler>)> {
    const TABLE: &[(&str, &[EffectOp])] = &[
        (
            handlers::VISUAL,
            &[
                EffectOp::Jumpscare,
                EffectOp::ScreenShake,
                EffectOp::Glitch,
                EffectOp::Flicker,
                EffectOp::Vignette,
            ],
        ),
        (
            handlers::AUDIO,
            &[EffectOp::Stinger, EffectOp::Heartbeat, EffectOp::Whisper],
        ),
        (handlers::ENTITY, &[EffectOp::SpawnEntity]),
        (handlers::TYPING, &[EffectOp::PhantomTyping]),
        (handlers::TIME, &[EffectOp::TimeDilation]),
    ];

    TABLE
        .iter()
        .map(|&(name, ops)| {
            let fail_init = fail == Some(name);
            (name, Arc::new(LoggingHandler::new(name, ops, fail_init)))
        })
        .collect()
}
