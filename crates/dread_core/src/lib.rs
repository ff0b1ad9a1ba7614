//! # Dread core
//!
//! Shared vocabulary for the tension engine: event kinds and their
//! configuration, the session state record, effect operations with their
//! coordinated-event tables, TOML configuration and the clock abstraction.

pub mod clock;
pub mod config;
pub mod effect;
pub mod event;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DiagnosticsConfig, DreadConfig, ProbabilityConfig, SafetyConfig, SchedulerConfig,
    SessionConfig, SubTriggerConfig, WarmupConfig,
};
pub use effect::{handlers, BundleStep, CoordinatedCategory, EffectOp};
pub use event::{
    clamp_non_negative, clamp_unit, default_catalog, Dispatch, EventConfig, EventConfigUpdate,
    EventKind, EventRecord, KindSpec,
};
pub use session::{clamp_intensity, ResetReason, SessionState, MAX_INTENSITY, MIN_INTENSITY};
