//! External safety interrupts.
//!
//! Any asserted signal takes the coordinator out of service: tasks stop and
//! every handler is force-disabled. Clearing all of them starts a fresh
//! session at the floor intensity.

use dread_core::SafetyConfig;
use serde::{Deserialize, Serialize};

/// Host accessibility preferences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityState {
    pub reduced_motion: bool,
    pub screen_reader: bool,
}

impl AccessibilityState {
    pub fn is_restrictive(&self) -> bool {
        self.reduced_motion || self.screen_reader
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SafetySignals {
    pub safe_mode: bool,
    pub accessibility: AccessibilityState,
    pub debugging: bool,
}

impl SafetySignals {
    /// Whether any signal that the configuration honours is asserted.
    pub fn any_asserted(&self, config: &SafetyConfig) -> bool {
        self.safe_mode
            || (config.respect_accessibility && self.accessibility.is_restrictive())
            || (config.pause_while_debugging && self.debugging)
    }
}
