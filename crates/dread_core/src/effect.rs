//! Effect operations and coordinated-event tables.
//!
//! Handlers advertise which [`EffectOp`]s they support; the engine never
//! looks up operations by string name. A [`CoordinatedCategory`] is a fixed,
//! ordered bundle of `(handler, op)` steps fired together as one logical effect.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known handler registry names used by the built-in bundles.
pub mod handlers {
    pub const VISUAL: &str = "visual";
    pub const AUDIO: &str = "audio";
    pub const ENTITY: &str = "entity";
    pub const TYPING: &str = "typing";
    pub const TIME: &str = "time";
}

/// Optional operation a handler may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOp {
    /// Full-screen scare image/animation
    Jumpscare,
    ScreenShake,
    Glitch,
    /// Brief brightness flicker
    Flicker,
    /// Darkened screen edges
    Vignette,
    SpawnEntity,
    /// Ghost characters appearing in the editor
    PhantomTyping,
    TimeDilation,
    Heartbeat,
    Whisper,
    /// Short loud sting accompanying a scare
    Stinger,
}

impl EffectOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectOp::Jumpscare => "jumpscare",
            EffectOp::ScreenShake => "screen_shake",
            EffectOp::Glitch => "glitch",
            EffectOp::Flicker => "flicker",
            EffectOp::Vignette => "vignette",
            EffectOp::SpawnEntity => "spawn_entity",
            EffectOp::PhantomTyping => "phantom_typing",
            EffectOp::TimeDilation => "time_dilation",
            EffectOp::Heartbeat => "heartbeat",
            EffectOp::Whisper => "whisper",
            EffectOp::Stinger => "stinger",
        }
    }
}

impl fmt::Display for EffectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a coordinated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleStep {
    pub handler: &'static str,
    pub op: EffectOp,
}

const fn step(handler: &'static str, op: EffectOp) -> BundleStep {
    BundleStep { handler, op }
}

const JUMPSCARE_STEPS: &[BundleStep] = &[
    step(handlers::AUDIO, EffectOp::Stinger),
    step(handlers::VISUAL, EffectOp::Jumpscare),
    step(handlers::VISUAL, EffectOp::ScreenShake),
];

const AMBIENT_STEPS: &[BundleStep] = &[
    step(handlers::AUDIO, EffectOp::Heartbeat),
    step(handlers::VISUAL, EffectOp::Vignette),
];

const INTENSE_STEPS: &[BundleStep] = &[
    step(handlers::AUDIO, EffectOp::Stinger),
    step(handlers::VISUAL, EffectOp::Glitch),
    step(handlers::VISUAL, EffectOp::ScreenShake),
    step(handlers::ENTITY, EffectOp::SpawnEntity),
    step(handlers::TIME, EffectOp::TimeDilation),
];

const SUBTLE_STEPS: &[BundleStep] = &[
    step(handlers::VISUAL, EffectOp::Flicker),
    step(handlers::AUDIO, EffectOp::Whisper),
    step(handlers::TYPING, EffectOp::PhantomTyping),
];

/// Named bundle of handler operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatedCategory {
    Jumpscare,
    Ambient,
    Intense,
    Subtle,
}

impl CoordinatedCategory {
    pub const ALL: [CoordinatedCategory; 4] = [
        CoordinatedCategory::Jumpscare,
        CoordinatedCategory::Ambient,
        CoordinatedCategory::Intense,
        CoordinatedCategory::Subtle,
    ];

    /// Ordered steps executed for this category.
    pub fn steps(&self) -> &'static [BundleStep] {
        match self {
            CoordinatedCategory::Jumpscare => JUMPSCARE_STEPS,
            CoordinatedCategory::Ambient => AMBIENT_STEPS,
            CoordinatedCategory::Intense => INTENSE_STEPS,
            CoordinatedCategory::Subtle => SUBTLE_STEPS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatedCategory::Jumpscare => "jumpscare",
            CoordinatedCategory::Ambient => "ambient",
            CoordinatedCategory::Intense => "intense",
            CoordinatedCategory::Subtle => "subtle",
        }
    }

    /// Parse a category name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for CoordinatedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
