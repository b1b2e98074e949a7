//! Host platform collaborator: entity states, change stream, service calls

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::HostError;
use super::clock::Clock;

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_UNKNOWN: &str = "unknown";
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Snapshot of one entity as reported by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    pub fn is_on(&self) -> bool {
        self.state == STATE_ON
    }

    pub fn is_off(&self) -> bool {
        self.state == STATE_OFF
    }

    /// Transient host anomaly, never a real reading
    pub fn is_indeterminate(&self) -> bool {
        self.state == STATE_UNKNOWN || self.state == STATE_UNAVAILABLE
    }
}

/// State-change notification delivered by the host event bus
#[derive(Debug, Clone)]
pub struct StateChange {
    pub entity_id: String,
    pub old_state: Option<EntityState>,
    pub new_state: Option<EntityState>,
}

/// A service invocation as seen by the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Value,
    pub blocking: bool,
}

/// Narrow interface the engine needs from the host platform
#[async_trait]
pub trait EntityHost: Send + Sync {
    /// Current state of an entity, if the host knows it
    fn state(&self, entity_id: &str) -> Option<EntityState>;

    /// Subscribe to every state change on the bus
    fn subscribe(&self) -> broadcast::Receiver<StateChange>;

    /// Invoke a named service. `blocking` waits for the host to acknowledge.
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        blocking: bool,
    ) -> Result<(), HostError>;
}

/// In-process host used by the daemon and by tests.
///
/// Entity states are pushed in from outside (HTTP ingestion or tests),
/// `homeassistant.turn_on|turn_off|toggle` act on the local entity table and
/// every other call is recorded.
#[derive(Debug)]
pub struct MemoryHost {
    clock: Arc<dyn Clock>,
    states: Mutex<HashMap<String, EntityState>>,
    calls: Mutex<Vec<ServiceCall>>,
    failing_domains: Mutex<HashSet<String>>,
    unresponsive: Mutex<HashSet<String>>,
    change_tx: broadcast::Sender<StateChange>,
}

impl MemoryHost {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (change_tx, _) = broadcast::channel(256);
        Self {
            clock,
            states: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing_domains: Mutex::new(HashSet::new()),
            unresponsive: Mutex::new(HashSet::new()),
            change_tx,
        }
    }

    /// Record a new state for an entity and publish the change
    pub fn set_state(&self, entity_id: &str, state: &str, attributes: Map<String, Value>) -> EntityState {
        let new_state = EntityState {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            attributes,
            last_updated: self.clock.now(),
        };

        let old_state = match self.states.lock() {
            Ok(mut states) => states.insert(entity_id.to_string(), new_state.clone()),
            Err(e) => {
                warn!("Failed to lock entity states: {}", e);
                return new_state;
            }
        };

        debug!(
            "Entity {} changed: {:?} -> {}",
            entity_id,
            old_state.as_ref().map(|s| s.state.as_str()),
            state
        );

        // No subscribers is fine, the change is still stored
        let _ = self.change_tx.send(StateChange {
            entity_id: entity_id.to_string(),
            old_state,
            new_state: Some(new_state.clone()),
        });

        new_state
    }

    /// Make every call into `domain` fail
    pub fn fail_domain(&self, domain: &str) {
        if let Ok(mut failing) = self.failing_domains.lock() {
            failing.insert(domain.to_string());
        }
    }

    /// Make an entity ignore turn_on / turn_off requests
    pub fn set_unresponsive(&self, entity_id: &str, unresponsive: bool) {
        if let Ok(mut set) = self.unresponsive.lock() {
            if unresponsive {
                set.insert(entity_id.to_string());
            } else {
                set.remove(entity_id);
            }
        }
    }

    /// All recorded non-switch calls, oldest first
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Recorded calls to a specific service
    pub fn calls_to(&self, domain: &str, service: &str) -> Vec<ServiceCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.domain == domain && c.service == service)
            .collect()
    }

    fn switch_entity(&self, entity_id: &str, target: Option<&str>) -> Result<(), HostError> {
        let current = self
            .state(entity_id)
            .ok_or_else(|| HostError::UnknownEntity(entity_id.to_string()))?;

        let unresponsive = self
            .unresponsive
            .lock()
            .map(|set| set.contains(entity_id))
            .unwrap_or(false);
        if unresponsive {
            info!("Entity {} ignored switch request", entity_id);
            return Ok(());
        }

        let next = match target {
            Some(target) => target,
            None if current.is_on() => STATE_OFF,
            None => STATE_ON,
        };
        if current.state != next {
            self.set_state(entity_id, next, current.attributes);
        }
        Ok(())
    }
}

#[async_trait]
impl EntityHost for MemoryHost {
    fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.states.lock().ok().and_then(|s| s.get(entity_id).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.change_tx.subscribe()
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        blocking: bool,
    ) -> Result<(), HostError> {
        let failing = self
            .failing_domains
            .lock()
            .map(|f| f.contains(domain))
            .unwrap_or(false);
        if failing {
            return Err(HostError::ServiceFailed {
                domain: domain.to_string(),
                service: service.to_string(),
                reason: "service unavailable".to_string(),
            });
        }

        if domain == "homeassistant" {
            let entity_id = data
                .get("entity_id")
                .and_then(Value::as_str)
                .ok_or_else(|| HostError::ServiceFailed {
                    domain: domain.to_string(),
                    service: service.to_string(),
                    reason: "missing entity_id".to_string(),
                })?;

            return match service {
                "turn_on" => self.switch_entity(entity_id, Some(STATE_ON)),
                "turn_off" => self.switch_entity(entity_id, Some(STATE_OFF)),
                "toggle" => self.switch_entity(entity_id, None),
                other => Err(HostError::ServiceFailed {
                    domain: domain.to_string(),
                    service: other.to_string(),
                    reason: "unsupported service".to_string(),
                }),
            };
        }

        info!("Service call {}.{}: {}", domain, service, data);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ServiceCall {
                domain: domain.to_string(),
                service: service.to_string(),
                data,
                blocking,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::TokioClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn host() -> MemoryHost {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MemoryHost::new(Arc::new(TokioClock::new(base)))
    }

    #[tokio::test]
    async fn set_state_publishes_old_and_new() {
        let host = host();
        let mut rx = host.subscribe();

        host.set_state("switch.fan", "off", Map::new());
        host.set_state("switch.fan", "on", Map::new());

        let first = rx.recv().await.unwrap();
        assert!(first.old_state.is_none());
        let second = rx.recv().await.unwrap();
        assert_eq!(second.old_state.unwrap().state, "off");
        assert_eq!(second.new_state.unwrap().state, "on");
    }

    #[tokio::test]
    async fn switch_services_drive_entity_table() {
        let host = host();
        host.set_state("switch.fan", "off", Map::new());

        host.call_service("homeassistant", "turn_on", json!({"entity_id": "switch.fan"}), true)
            .await
            .unwrap();
        assert!(host.state("switch.fan").unwrap().is_on());

        host.call_service("homeassistant", "toggle", json!({"entity_id": "switch.fan"}), true)
            .await
            .unwrap();
        assert!(host.state("switch.fan").unwrap().is_off());

        let missing = host
            .call_service("homeassistant", "turn_on", json!({"entity_id": "switch.none"}), true)
            .await;
        assert!(matches!(missing, Err(HostError::UnknownEntity(_))));
    }

    #[tokio::test]
    async fn other_calls_are_recorded_or_fail_on_demand() {
        let host = host();
        host.call_service("notify", "phone", json!({"message": "hi"}), false)
            .await
            .unwrap();
        assert_eq!(host.calls_to("notify", "phone").len(), 1);

        host.fail_domain("notify");
        assert!(host
            .call_service("notify", "phone", json!({"message": "hi"}), false)
            .await
            .is_err());
        assert_eq!(host.calls().len(), 1);
    }

    #[test]
    fn indeterminate_states() {
        let state = EntityState {
            entity_id: "switch.fan".into(),
            state: "unavailable".into(),
            attributes: Map::new(),
            last_updated: Utc::now(),
        };
        assert!(state.is_indeterminate());
        assert!(!state.is_off());
        assert!(!state.is_on());
    }
}
