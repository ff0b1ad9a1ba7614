//! # Dread engine
//!
//! Probability model, cadence scheduler and the session coordinator that
//! dispatches coordinated effects to pluggable handlers.
//!
//! Dependency order, leaves first:
//! [`probability`] → [`scheduler`] → [`coordinator`].

pub mod bundle;
pub mod coordinator;
pub mod diagnostics;
pub mod driver;
pub mod handler;
pub mod probability;
pub mod registry;
pub mod safety;
pub mod scheduler;
pub mod spacing;
pub mod tasks;
pub mod warmup;

pub use bundle::{run_bundle, BundlePlan, BundleReport, FireSource, StepOutcome, StepReport};
pub use coordinator::Coordinator;
pub use diagnostics::{CoordinatorSnapshot, EventLog, HandlerMetrics, PerformanceMetrics};
pub use driver::CoordinatorHandle;
pub use handler::{EffectContext, EffectHandler, StepError};
pub use probability::{EventStatistics, KindStatistics, ProbabilityModel};
pub use registry::{HandlerRegistry, HandlerStatus};
pub use safety::{AccessibilityState, SafetySignals};
pub use scheduler::{ScheduledEvent, Scheduler, SchedulerState, TriggerCallback};
pub use spacing::SpacingGate;
pub use tasks::{TaskId, TaskInfo, TaskRunner};
pub use warmup::{WarmupPhase, WarmupStage, WarmupStatus};
