//! Named effect handlers with per-handler lifecycle bookkeeping.

use crate::handler::EffectHandler;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Slot {
    handler: Arc<dyn EffectHandler>,
    initialized: bool,
    init_failed: bool,
    /// Disabled by a safety interrupt; re-enabled when it clears
    force_disabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandlerStatus {
    pub name: String,
    pub enabled: bool,
    pub initialized: bool,
    pub init_failed: bool,
    pub force_disabled: bool,
}

#[derive(Default)]
pub struct HandlerRegistry {
    slots: BTreeMap<String, Slot>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `name`. Returns the handler it replaced, if any; the
    /// caller decides whether to dispose it.
    pub fn insert(
        &mut self,
        name: &str,
        handler: Arc<dyn EffectHandler>,
    ) -> Option<Arc<dyn EffectHandler>> {
        tracing::debug!("Registered effect handler: {}", name);
        self.slots
            .insert(
                name.to_string(),
                Slot {
                    handler,
                    initialized: false,
                    init_failed: false,
                    force_disabled: false,
                },
            )
            .map(|old| old.handler)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn EffectHandler>> {
        self.slots.remove(name).map(|slot| slot.handler)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EffectHandler>> {
        self.slots.get(name).map(|slot| slot.handler.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    /// Initialize every handler not yet initialized. One failure never
    /// prevents the others; failed handlers stay disabled. Returns the
    /// number of failures.
    pub async fn initialize_all(&mut self) -> usize {
        let names: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| !slot.initialized)
            .map(|(name, _)| name.clone())
            .collect();

        let mut failures = 0;
        for name in names {
            if !self.initialize_one(&name).await {
                failures += 1;
            }
        }
        failures
    }

    /// Returns false when the handler's `initialize` failed.
    pub async fn initialize_one(&mut self, name: &str) -> bool {
        let Some(handler) = self.get(name) else {
            return false;
        };

        let result = handler.initialize().await;
        let Some(slot) = self.slots.get_mut(name) else {
            return false;
        };
        slot.initialized = true;

        match result {
            Ok(()) => {
                slot.init_failed = false;
                handler.set_enabled(true);
                tracing::info!("Effect handler '{}' initialized", name);
                true
            }
            Err(e) => {
                slot.init_failed = true;
                handler.set_enabled(false);
                tracing::warn!(handler = name, "Effect handler initialization failed: {:#}", e);
                false
            }
        }
    }

    /// Disable every enabled handler, remembering which ones to restore.
    pub fn force_disable_all(&mut self) {
        for (name, slot) in &mut self.slots {
            if slot.handler.is_enabled() {
                slot.handler.set_enabled(false);
                slot.force_disabled = true;
                tracing::debug!("Effect handler '{}' force-disabled", name);
            }
        }
    }

    /// Re-enable only the handlers `force_disable_all` turned off.
    pub fn restore_force_disabled(&mut self) {
        for (name, slot) in &mut self.slots {
            if slot.force_disabled {
                slot.force_disabled = false;
                if !slot.init_failed {
                    slot.handler.set_enabled(true);
                    tracing::debug!("Effect handler '{}' re-enabled", name);
                }
            }
        }
    }

    pub fn dispose_all(&mut self) {
        for (name, slot) in std::mem::take(&mut self.slots) {
            tracing::debug!("Disposing effect handler '{}'", name);
            slot.handler.dispose();
        }
    }

    pub fn statuses(&self) -> Vec<HandlerStatus> {
        self.slots
            .iter()
            .map(|(name, slot)| HandlerStatus {
                name: name.clone(),
                enabled: slot.handler.is_enabled(),
                initialized: slot.initialized,
                init_failed: slot.init_failed,
                force_disabled: slot.force_disabled,
            })
            .collect()
    }
}
