use crate::effect::CoordinatedCategory;
use crate::event::{clamp_non_negative, clamp_unit, default_catalog, KindSpec};
use crate::session::clamp_intensity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DreadConfig {
    /// Master switch. When false the coordinator never starts a session.
    pub enabled: bool,
    pub session: SessionConfig,
    pub scheduler: SchedulerConfig,
    pub probability: ProbabilityConfig,
    pub warmup: WarmupConfig,
    pub safety: SafetyConfig,
    pub diagnostics: DiagnosticsConfig,
    /// Event catalog in priority order (first = checked first)
    pub events: Vec<KindSpec>,
    pub sub_triggers: Vec<SubTriggerConfig>,
}

impl Default for DreadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session: SessionConfig::default(),
            scheduler: SchedulerConfig::default(),
            probability: ProbabilityConfig::default(),
            warmup: WarmupConfig::default(),
            safety: SafetyConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            events: default_catalog(),
            sub_triggers: default_sub_triggers(),
        }
    }
}

impl DreadConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied and ranges are clamped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: DreadConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config.sanitized())
    }

    /// Try to load from path; if the file is missing or invalid, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg.sanitized()
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DREAD_ENABLED") {
            if let Ok(b) = v.parse() {
                self.enabled = b;
            }
        }
        if let Ok(v) = std::env::var("DREAD_FLOOR_INTENSITY") {
            if let Ok(n) = v.parse() {
                self.session.floor_intensity = n;
            }
        }
        if let Ok(v) = std::env::var("DREAD_ESCALATION_RATE") {
            if let Ok(n) = v.parse() {
                self.session.escalation_rate = n;
            }
        }
        if let Ok(v) = std::env::var("DREAD_MIN_SPACING_SECS") {
            if let Ok(n) = v.parse() {
                self.session.min_spacing_secs = n;
            }
        }
    }

    /// Clamp every numeric field into its valid range. Invalid values are
    /// never an error; they are corrected and a warning is logged.
    pub fn sanitized(mut self) -> Self {
        let s = &mut self.session;
        s.floor_intensity = warn_clamp("session.floor_intensity", s.floor_intensity, clamp_intensity);
        s.escalation_rate = warn_clamp("session.escalation_rate", s.escalation_rate, clamp_non_negative);
        s.min_spacing_secs = warn_clamp("session.min_spacing_secs", s.min_spacing_secs, clamp_non_negative);
        s.escalation_period_secs = s.escalation_period_secs.max(1);
        s.inactivity_check_secs = s.inactivity_check_secs.max(1);
        s.inactivity_threshold_secs = s.inactivity_threshold_secs.max(1);

        let sc = &mut self.scheduler;
        if sc.min_cooldown_ms > sc.max_cooldown_ms {
            tracing::warn!(
                "scheduler.min_cooldown_ms ({}) > max_cooldown_ms ({}), swapping",
                sc.min_cooldown_ms,
                sc.max_cooldown_ms
            );
            std::mem::swap(&mut sc.min_cooldown_ms, &mut sc.max_cooldown_ms);
        }
        sc.min_cooldown_ms = sc.min_cooldown_ms.max(1);
        sc.max_cooldown_ms = sc.max_cooldown_ms.max(sc.min_cooldown_ms);
        sc.jitter = warn_clamp("scheduler.jitter", sc.jitter, |v| clamp_unit(v).min(0.9));
        sc.intensity_jump_threshold = warn_clamp(
            "scheduler.intensity_jump_threshold",
            sc.intensity_jump_threshold,
            clamp_non_negative,
        );

        self.probability.history_capacity = self.probability.history_capacity.clamp(1, 100);
        self.warmup.interval_secs = self.warmup.interval_secs.max(1);
        self.diagnostics.event_log_capacity = self.diagnostics.event_log_capacity.max(1);

        let mut seen = HashSet::new();
        self.events.retain(|spec| {
            if spec.kind.as_str().is_empty() {
                tracing::warn!("Dropping [[events]] entry without a kind");
                return false;
            }
            if !seen.insert(spec.kind.clone()) {
                tracing::warn!("Dropping duplicate [[events]] entry for '{}'", spec.kind);
                return false;
            }
            true
        });
        for spec in &mut self.events {
            spec.base_chance = warn_clamp("events.base_chance", spec.base_chance, clamp_unit);
            spec.cooldown_secs = warn_clamp("events.cooldown_secs", spec.cooldown_secs, clamp_non_negative);
            spec.min_intensity = warn_clamp("events.min_intensity", spec.min_intensity, clamp_intensity);
        }

        let mut names = HashSet::new();
        self.sub_triggers
            .retain(|t| !t.name.is_empty() && names.insert(t.name.clone()));
        for trigger in &mut self.sub_triggers {
            trigger.chance = warn_clamp("sub_triggers.chance", trigger.chance, clamp_unit);
            trigger.min_intensity =
                warn_clamp("sub_triggers.min_intensity", trigger.min_intensity, clamp_intensity);
            trigger.period_secs = trigger.period_secs.max(1);
        }

        self
    }
}

fn warn_clamp(field: &str, value: f64, clamp: impl Fn(f64) -> f64) -> f64 {
    let clamped = clamp(value);
    if clamped != value {
        tracing::warn!("Config value {}={} out of range, clamped to {}", field, value, clamped);
    }
    clamped
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Intensity a fresh session starts at (0 - 100)
    pub floor_intensity: f64,
    /// Intensity added per elapsed escalation period
    pub escalation_rate: f64,
    pub escalation_period_secs: u64,
    /// Idle time after which the session resets
    pub inactivity_threshold_secs: u64,
    pub inactivity_check_secs: u64,
    /// Global minimum spacing between any two non-forced effects
    pub min_spacing_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            floor_intensity: 20.0,
            escalation_rate: 5.0,
            escalation_period_secs: 120,
            inactivity_threshold_secs: 300,
            inactivity_check_secs: 30,
            min_spacing_secs: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub min_cooldown_ms: u64,
    pub max_cooldown_ms: u64,
    /// When false, delays are uniform in [min, max] regardless of intensity
    pub intensity_scaling: bool,
    /// Relative jitter applied to the scaled delay (0.2 = ±20%)
    pub jitter: f64,
    /// Safety valve: the scheduler stops itself after this many events
    pub max_events_per_session: u32,
    /// Intensity rise that makes a running scheduler catch up immediately
    pub intensity_jump_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_cooldown_ms: 30_000,
            max_cooldown_ms: 120_000,
            intensity_scaling: true,
            jitter: 0.2,
            max_events_per_session: 100,
            intensity_jump_threshold: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityConfig {
    /// Event history ring size (1 - 100)
    pub history_capacity: usize,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            history_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupConfig {
    pub enabled: bool,
    /// Accelerated cadence while the catalog is being sampled
    pub interval_secs: u64,
    /// Warm-up ends after this long even if kinds remain unseen
    pub timeout_secs: u64,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Treat reduced-motion / screen-reader signals as an interrupt
    pub respect_accessibility: bool,
    /// Treat an active debugging session as an interrupt
    pub pause_while_debugging: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            respect_accessibility: true,
            pause_while_debugging: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub event_log_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: 200,
        }
    }
}

/// Independent periodic task that fires a whole category bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTriggerConfig {
    pub name: String,
    pub category: CoordinatedCategory,
    pub period_secs: u64,
    /// Chance per period at full intensity
    pub chance: f64,
    #[serde(default)]
    pub min_intensity: f64,
}

fn default_sub_triggers() -> Vec<SubTriggerConfig> {
    vec![
        SubTriggerConfig {
            name: "ambient".to_string(),
            category: CoordinatedCategory::Ambient,
            period_secs: 45,
            chance: 0.5,
            min_intensity: 0.0,
        },
        SubTriggerConfig {
            name: "subtle".to_string(),
            category: CoordinatedCategory::Subtle,
            period_secs: 90,
            chance: 0.4,
            min_intensity: 25.0,
        },
    ]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn test_default_config() {
        let cfg = DreadConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.session.floor_intensity, 20.0);
        assert_eq!(cfg.scheduler.min_cooldown_ms, 30_000);
        assert_eq!(cfg.scheduler.max_cooldown_ms, 120_000);
        assert_eq!(cfg.events.len(), 6);
        assert_eq!(cfg.sub_triggers.len(), 2);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[session]
floor_intensity = 30
"#;
        let cfg: DreadConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.session.floor_intensity, 30.0);
        // Defaults for unspecified fields
        assert_eq!(cfg.session.escalation_rate, 5.0);
        assert_eq!(cfg.events.len(), 6);
        assert!(cfg.warmup.enabled);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
enabled = false

[session]
floor_intensity = 10
escalation_rate = 2.5
escalation_period_secs = 60
inactivity_threshold_secs = 120
inactivity_check_secs = 10
min_spacing_secs = 30

[scheduler]
min_cooldown_ms = 5000
max_cooldown_ms = 20000
intensity_scaling = false
max_events_per_session = 12

[warmup]
enabled = false

[safety]
pause_while_debugging = false

[[events]]
kind = "flicker_storm"
base_chance = 0.4
cooldown_secs = 30
max_per_session = 3
min_intensity = 10
variants = ["slow", "fast"]
dispatch = { bundle = "subtle" }

[[sub_triggers]]
name = "dread_pulse"
category = "ambient"
period_secs = 20
chance = 1.0
"#;
        let cfg: DreadConfig = toml::from_str(toml_str).unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.session.escalation_rate, 2.5);
        assert!(!cfg.scheduler.intensity_scaling);
        assert_eq!(cfg.scheduler.max_events_per_session, 12);
        assert!(!cfg.warmup.enabled);
        assert!(!cfg.safety.pause_while_debugging);
        assert!(cfg.safety.respect_accessibility);
        assert_eq!(cfg.events.len(), 1);
        assert_eq!(cfg.events[0].kind, EventKind::new("flicker_storm"));
        assert_eq!(cfg.events[0].variants, vec!["slow", "fast"]);
        assert_eq!(cfg.sub_triggers.len(), 1);
        assert_eq!(cfg.sub_triggers[0].category, CoordinatedCategory::Ambient);
    }

    #[test]
    fn test_sanitize_clamps_instead_of_failing() {
        let mut cfg = DreadConfig::default();
        cfg.session.floor_intensity = 250.0;
        cfg.session.escalation_rate = -3.0;
        cfg.scheduler.min_cooldown_ms = 90_000;
        cfg.scheduler.max_cooldown_ms = 10_000;
        cfg.scheduler.jitter = 4.0;
        cfg.probability.history_capacity = 10_000;
        cfg.events[0].base_chance = 7.0;
        cfg.events.push(cfg.events[1].clone());

        let cfg = cfg.sanitized();
        assert_eq!(cfg.session.floor_intensity, 100.0);
        assert_eq!(cfg.session.escalation_rate, 0.0);
        assert_eq!(cfg.scheduler.min_cooldown_ms, 10_000);
        assert_eq!(cfg.scheduler.max_cooldown_ms, 90_000);
        assert_eq!(cfg.scheduler.jitter, 0.9);
        assert_eq!(cfg.probability.history_capacity, 100);
        assert_eq!(cfg.events[0].base_chance, 1.0);
        assert_eq!(cfg.events.len(), 6, "duplicate kind should be dropped");
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("DREAD_FLOOR_INTENSITY", "35");
        std::env::set_var("DREAD_ENABLED", "false");

        let mut cfg = DreadConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.session.floor_intensity, 35.0);
        assert!(!cfg.enabled);

        std::env::remove_var("DREAD_FLOOR_INTENSITY");
        std::env::remove_var("DREAD_ENABLED");

        let cfg = DreadConfig::load_or_default("/nonexistent/dread.toml");
        assert_eq!(cfg.session.floor_intensity, 20.0);
        assert!(cfg.enabled);
    }
}
