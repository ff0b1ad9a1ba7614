//! Event kinds, per-kind configuration and event records.

use crate::effect::{handlers, CoordinatedCategory, EffectOp};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Clamp to [0, 1]; NaN collapses to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Clamp to [0, +inf); NaN collapses to 0.
pub fn clamp_non_negative(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.max(0.0)
    }
}

/// Category identifier. The set of kinds is defined by the configured
/// catalog, these constants only name the built-in ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKind(Cow<'static, str>);

impl EventKind {
    pub const JUMPSCARE: EventKind = EventKind(Cow::Borrowed("jumpscare"));
    pub const SCREEN_SHAKE: EventKind = EventKind(Cow::Borrowed("screen_shake"));
    pub const GLITCH: EventKind = EventKind(Cow::Borrowed("glitch"));
    pub const ENTITY_SPAWN: EventKind = EventKind(Cow::Borrowed("entity_spawn"));
    pub const PHANTOM_TYPING: EventKind = EventKind(Cow::Borrowed("phantom_typing"));
    pub const TIME_DILATION: EventKind = EventKind(Cow::Borrowed("time_dilation"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Runtime-mutable configuration for one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    pub enabled: bool,
    /// Chance of firing at full intensity (0.0 - 1.0)
    pub base_chance: f64,
    pub cooldown_secs: f64,
    /// 0 means the kind can never be selected
    pub max_per_session: u32,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_chance: 0.3,
            cooldown_secs: 120.0,
            max_per_session: 10,
        }
    }
}

impl EventConfig {
    pub fn sanitized(mut self) -> Self {
        self.base_chance = clamp_unit(self.base_chance);
        self.cooldown_secs = clamp_non_negative(self.cooldown_secs);
        self
    }

    pub fn cooldown_ms(&self) -> u64 {
        (self.cooldown_secs * 1000.0).round() as u64
    }
}

/// Partial update; every present field is clamped into range.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventConfigUpdate {
    pub enabled: Option<bool>,
    pub base_chance: Option<f64>,
    pub cooldown_secs: Option<f64>,
    pub max_per_session: Option<i64>,
}

impl EventConfigUpdate {
    pub fn apply_to(&self, config: &mut EventConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(chance) = self.base_chance {
            config.base_chance = clamp_unit(chance);
        }
        if let Some(cooldown) = self.cooldown_secs {
            config.cooldown_secs = clamp_non_negative(cooldown);
        }
        if let Some(max) = self.max_per_session {
            config.max_per_session = max.clamp(0, u32::MAX as i64) as u32;
        }
    }
}

/// What the coordinator does when a kind fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    Bundle(CoordinatedCategory),
    Step { handler: String, op: EffectOp },
}

impl Default for Dispatch {
    fn default() -> Self {
        Dispatch::Bundle(CoordinatedCategory::Subtle)
    }
}

/// Catalog entry as it appears in `[[events]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindSpec {
    pub kind: EventKind,
    pub enabled: bool,
    pub base_chance: f64,
    pub cooldown_secs: f64,
    pub max_per_session: u32,
    /// Below this intensity the kind is never eligible for random selection
    pub min_intensity: f64,
    pub variants: Vec<String>,
    pub dispatch: Dispatch,
}

impl Default for KindSpec {
    fn default() -> Self {
        let config = EventConfig::default();
        Self {
            kind: EventKind::new(""),
            enabled: config.enabled,
            base_chance: config.base_chance,
            cooldown_secs: config.cooldown_secs,
            max_per_session: config.max_per_session,
            min_intensity: 0.0,
            variants: Vec::new(),
            dispatch: Dispatch::default(),
        }
    }
}

impl KindSpec {
    pub fn config(&self) -> EventConfig {
        EventConfig {
            enabled: self.enabled,
            base_chance: self.base_chance,
            cooldown_secs: self.cooldown_secs,
            max_per_session: self.max_per_session,
        }
        .sanitized()
    }

    fn builtin(
        kind: EventKind,
        base_chance: f64,
        cooldown_secs: f64,
        max_per_session: u32,
        min_intensity: f64,
        variants: &[&str],
        dispatch: Dispatch,
    ) -> Self {
        Self {
            kind,
            enabled: true,
            base_chance,
            cooldown_secs,
            max_per_session,
            min_intensity,
            variants: variants.iter().map(|v| v.to_string()).collect(),
            dispatch,
        }
    }
}

fn single(handler: &str, op: EffectOp) -> Dispatch {
    Dispatch::Step {
        handler: handler.to_string(),
        op,
    }
}

/// Built-in catalog in priority order, rarest first.
pub fn default_catalog() -> Vec<KindSpec> {
    vec![
        KindSpec::builtin(
            EventKind::JUMPSCARE,
            0.15,
            600.0,
            5,
            70.0,
            &["face", "scream", "shadow"],
            Dispatch::Bundle(CoordinatedCategory::Jumpscare),
        ),
        KindSpec::builtin(
            EventKind::TIME_DILATION,
            0.2,
            300.0,
            6,
            50.0,
            &[],
            single(handlers::TIME, EffectOp::TimeDilation),
        ),
        KindSpec::builtin(
            EventKind::ENTITY_SPAWN,
            0.3,
            240.0,
            10,
            30.0,
            &["crawler", "watcher"],
            single(handlers::ENTITY, EffectOp::SpawnEntity),
        ),
        KindSpec::builtin(
            EventKind::PHANTOM_TYPING,
            0.35,
            180.0,
            12,
            40.0,
            &[],
            single(handlers::TYPING, EffectOp::PhantomTyping),
        ),
        KindSpec::builtin(
            EventKind::GLITCH,
            0.5,
            90.0,
            25,
            0.0,
            &["rgb_split", "scanline"],
            single(handlers::VISUAL, EffectOp::Glitch),
        ),
        KindSpec::builtin(
            EventKind::SCREEN_SHAKE,
            0.6,
            60.0,
            30,
            0.0,
            &[],
            single(handlers::VISUAL, EffectOp::ScreenShake),
        ),
    ]
}

/// A fired event as kept in the bounded history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub timestamp_ms: u64,
    pub intensity_at_trigger: f64,
    pub variant: Option<String>,
}
