//! Transient per-card alarm firing state

use serde::Serialize;
use std::{collections::HashMap, sync::Mutex};
use tracing::warn;

/// Latest firing of one card, consumed by the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlarmFiringState {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// Firing states keyed by config id. Writers replace whole records.
#[derive(Debug, Default)]
pub struct AlarmStates {
    states: Mutex<HashMap<String, AlarmFiringState>>,
}

impl AlarmStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, config_id: &str, trigger: &str, entity_id: &str) {
        self.replace(
            config_id,
            AlarmFiringState {
                active: true,
                trigger: Some(trigger.to_string()),
                entity_id: Some(entity_id.to_string()),
            },
            false,
        );
    }

    /// Mark a known card inactive; unknown cards are left untouched
    pub fn clear(&self, config_id: &str) {
        self.replace(config_id, AlarmFiringState::default(), true);
    }

    pub fn get(&self, config_id: &str) -> Option<AlarmFiringState> {
        self.states.lock().ok().and_then(|s| s.get(config_id).cloned())
    }

    pub fn all(&self) -> HashMap<String, AlarmFiringState> {
        self.states.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn replace(&self, config_id: &str, state: AlarmFiringState, only_existing: bool) {
        match self.states.lock() {
            Ok(mut states) => {
                if only_existing && !states.contains_key(config_id) {
                    return;
                }
                states.insert(config_id.to_string(), state);
            }
            Err(e) => warn!("Failed to lock alarm states: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_clear() {
        let states = AlarmStates::new();
        states.clear("front_door");
        assert!(states.get("front_door").is_none());

        states.set_active("front_door", "door_open_60s", "binary_sensor.front_door");
        let fired = states.get("front_door").unwrap();
        assert!(fired.active);
        assert_eq!(fired.trigger.as_deref(), Some("door_open_60s"));

        states.clear("front_door");
        assert_eq!(states.get("front_door"), Some(AlarmFiringState::default()));
    }
}
