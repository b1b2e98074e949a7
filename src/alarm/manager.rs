//! Card config registry and trigger evaluation

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{
    config::AlarmCardConfig,
    responsible::ResponsiblePeople,
    trigger::{is_open_state, TriggerKind},
};
use crate::{
    error::{EngineError, EngineResult},
    services::{notify, EntityHost, EntityState, JsonStore},
    state::AlarmStates,
    tasks::{alarm_listener_task, held_open_task},
};

pub const STORE_KEY: &str = "alarm_config_card_card_configs";
const STORE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigsRecord {
    #[serde(default)]
    configs: HashMap<String, AlarmCardConfig>,
}

/// Resolve a configured sound path to a playable media id
pub fn resolve_media_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("/local/") {
        return Some(path.to_string());
    }
    let relative = path
        .strip_prefix("local/")
        .or_else(|| path.strip_prefix("www/"))
        .unwrap_or(path);
    Some(format!("/local/{}", relative).replace("//", "/"))
}

/// Owns every card config, its state listener and its held-open timer
pub struct AlarmConfigManager {
    host: Arc<dyn EntityHost>,
    store: JsonStore,
    responsible: Arc<ResponsiblePeople>,
    alarm_states: Arc<AlarmStates>,
    shutdown: watch::Receiver<bool>,
    configs: Mutex<HashMap<String, AlarmCardConfig>>,
    listeners: Mutex<HashMap<String, JoinHandle<()>>>,
    door_timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl AlarmConfigManager {
    pub fn new(
        host: Arc<dyn EntityHost>,
        store_dir: &std::path::Path,
        responsible: Arc<ResponsiblePeople>,
        alarm_states: Arc<AlarmStates>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            host,
            store: JsonStore::new(store_dir, STORE_KEY, STORE_VERSION),
            responsible,
            alarm_states,
            shutdown,
            configs: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            door_timers: Mutex::new(HashMap::new()),
        }
    }

    /// Load persisted configs and attach their listeners
    pub async fn load(self: &Arc<Self>) {
        let record = match self.store.load::<ConfigsRecord>().await {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                error!("Failed to load alarm card configs: {}", e);
                ConfigsRecord::default()
            }
        };

        info!("Loaded {} alarm card configs", record.configs.len());
        for (config_id, config) in record.configs {
            self.insert_config(&config_id, config.clone());
            self.setup_listener(&config_id, &config).await;
        }
    }

    /// Sanitize, persist and activate a card config
    pub async fn set_config(self: &Arc<Self>, config_id: &str, raw: &Map<String, Value>) -> EngineResult<AlarmCardConfig> {
        if config_id.is_empty() {
            return Err(EngineError::InvalidRequest("config_id must not be empty".to_string()));
        }

        let sanitized = AlarmCardConfig::sanitize(config_id, raw);
        self.insert_config(config_id, sanitized.clone());

        let stored = self
            .store
            .update(|record: &mut ConfigsRecord| {
                record.configs.insert(config_id.to_string(), sanitized.clone());
            })
            .await;
        if let Err(e) = stored {
            error!("[{}] Failed to persist card config: {}", config_id, e);
        }

        self.setup_listener(config_id, &sanitized).await;
        info!("[{}] Card config saved", config_id);
        Ok(sanitized)
    }

    pub fn config(&self, config_id: &str) -> Option<AlarmCardConfig> {
        self.configs.lock().ok().and_then(|c| c.get(config_id).cloned())
    }

    pub fn configs(&self) -> HashMap<String, AlarmCardConfig> {
        self.configs.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn has_pending_door_timer(&self, config_id: &str) -> bool {
        self.door_timers
            .lock()
            .map(|t| t.get(config_id).map(|h| !h.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }

    fn insert_config(&self, config_id: &str, config: AlarmCardConfig) {
        match self.configs.lock() {
            Ok(mut configs) => {
                configs.insert(config_id.to_string(), config);
            }
            Err(e) => warn!("Failed to lock card configs: {}", e),
        }
    }

    async fn setup_listener(self: &Arc<Self>, config_id: &str, config: &AlarmCardConfig) {
        self.remove_listener(config_id).await;
        let Some(target) = config.target_entity() else {
            debug!("[{}] No target entity, listener not attached", config_id);
            return;
        };

        // Subscribe before spawning so no change slips through in between
        let rx = self.host.subscribe();
        let handle = tokio::spawn(alarm_listener_task(
            Arc::clone(self),
            config_id.to_string(),
            target.to_string(),
            rx,
            self.shutdown.clone(),
        ));

        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(config_id.to_string(), handle);
        }
        debug!("[{}] Listening to {}", config_id, target);
    }

    async fn remove_listener(&self, config_id: &str) {
        let handle = self.listeners.lock().ok().and_then(|mut l| l.remove(config_id));
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        self.cancel_door_timer(config_id).await;
    }

    async fn cancel_door_timer(&self, config_id: &str) {
        let handle = self.door_timers.lock().ok().and_then(|mut t| t.remove(config_id));
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            debug!("[{}] Held-open timer cleared", config_id);
        }
    }

    /// Evaluate every configured trigger for one transition
    pub async fn process_state_change(
        self: &Arc<Self>,
        config_id: &str,
        old_state: Option<EntityState>,
        new_state: Option<EntityState>,
    ) {
        let Some(config) = self.config(config_id) else {
            return;
        };
        let Some(new_state) = new_state else {
            return;
        };
        if new_state.is_indeterminate() {
            return;
        }
        if !config.alarm_enabled() {
            return;
        }

        let triggers = config.trigger_types();
        if triggers.is_empty() {
            return;
        }

        let kinds: Vec<TriggerKind> = triggers.iter().filter_map(|t| t.parse().ok()).collect();

        if kinds.contains(&TriggerKind::DoorOpen) {
            if is_open_state(&new_state) {
                self.arm_door_timer(config_id, &config);
            } else {
                self.cancel_door_timer(config_id).await;
            }
        }

        for kind in kinds {
            if kind == TriggerKind::DoorOpen {
                continue;
            }
            if kind.matches(old_state.as_ref(), &new_state, config.threshold()) {
                self.fire_alarm(&config, kind.as_str(), &new_state).await;
            }
        }
    }

    /// Start the held-open timer unless one is already pending.
    ///
    /// The entry stays in place after it fires, so a target that remains open
    /// alarms once; only a non-open observation clears it.
    fn arm_door_timer(self: &Arc<Self>, config_id: &str, config: &AlarmCardConfig) {
        let Ok(mut timers) = self.door_timers.lock() else {
            warn!("[{}] Failed to lock held-open timers", config_id);
            return;
        };
        if timers.contains_key(config_id) {
            return;
        }

        let delay = config.door_open_delay();
        debug!("[{}] Held-open timer armed for {:?}", config_id, delay);
        let handle = tokio::spawn(held_open_task(
            Arc::clone(self),
            config_id.to_string(),
            delay,
            self.shutdown.clone(),
        ));
        timers.insert(config_id.to_string(), handle);
    }

    /// Held-open expiry: fire only if the target is still open
    pub async fn fire_if_still_open(&self, config_id: &str) {
        let Some(config) = self.config(config_id) else {
            return;
        };
        if !config.alarm_enabled() {
            debug!("[{}] Held-open expired while disabled", config_id);
            return;
        }
        let Some(target) = config.target_entity() else {
            return;
        };
        let Some(state) = self.host.state(target) else {
            return;
        };
        if !is_open_state(&state) {
            return;
        }
        self.fire_alarm(&config, TriggerKind::DoorOpen.as_str(), &state).await;
    }

    /// Fan out every side effect of a firing; one failure never blocks the rest
    pub async fn fire_alarm(&self, config: &AlarmCardConfig, trigger: &str, state: &EntityState) {
        let config_id = config.config_id();
        let message = build_message(config, trigger, state);
        info!("[{}] Alarm fired: {}", config_id, message);

        if !config_id.is_empty() {
            self.alarm_states.set_active(config_id, trigger, &state.entity_id);
        }

        if config.flag("email_enabled") {
            let subject = config.text("email_subject").unwrap_or("Alarm Notification");
            if let Err(e) = self
                .host
                .call_service(
                    "pyscript",
                    "send_custom_email",
                    json!({"subject": subject, "message": message}),
                    false,
                )
                .await
            {
                warn!("[{}] Email notification failed: {}", config_id, e);
            }
        }

        if config.flag("mobile_enabled") {
            let targets = config.mobile_services();
            notify::dispatch(self.host.as_ref(), &targets, &message, config.title(), config_id).await;
        }

        let people = self.responsible.services();
        if !people.is_empty() {
            notify::dispatch(self.host.as_ref(), &people, &message, config.title(), config_id).await;
        }

        if config.flag("sound_enabled") {
            self.play_sound(config).await;
        }

        self.schedule_auto_clear(config);
    }

    async fn play_sound(&self, config: &AlarmCardConfig) {
        let (Some(player), Some(path)) = (config.text("sound_player"), config.text("sound_path")) else {
            return;
        };
        let Some(media_id) = resolve_media_path(path) else {
            return;
        };

        if let Err(e) = self
            .host
            .call_service(
                "media_player",
                "play_media",
                json!({
                    "entity_id": player,
                    "media_content_id": media_id,
                    "media_content_type": "music",
                }),
                false,
            )
            .await
        {
            warn!("[{}] Sound playback failed: {}", config.config_id(), e);
        }
    }

    fn schedule_auto_clear(&self, config: &AlarmCardConfig) {
        let Some(delay) = config.auto_clear_delay() else {
            return;
        };
        let config_id = config.config_id().to_string();
        if config_id.is_empty() {
            return;
        }

        let states = Arc::clone(&self.alarm_states);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            states.clear(&config_id);
            debug!("[{}] Alarm state auto-cleared", config_id);
        });
    }

    /// Detach every listener and pending timer
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self
            .listeners
            .lock()
            .map(|l| l.keys().cloned().collect())
            .unwrap_or_default();
        for id in ids {
            self.remove_listener(&id).await;
        }
        info!("Alarm listeners detached");
    }
}

fn build_message(config: &AlarmCardConfig, trigger: &str, state: &EntityState) -> String {
    if let Some(custom) = config.text("email_body") {
        return custom.to_string();
    }
    let target = config.target_entity().unwrap_or(&state.entity_id);
    format!("Alarm triggered: {} on {}", trigger, target)
}
