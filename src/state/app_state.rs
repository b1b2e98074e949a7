//! Main application state management

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::AlarmStates;
use crate::{
    alarm::{AlarmConfigManager, ResponsiblePeople},
    config::EntryConfig,
    error::{EngineError, EngineResult},
    sensor::RuntimeSensor,
    services::{Clock, MemoryHost},
};

/// Shared state behind the HTTP API: the host, every entry's sensor and the
/// alarm subsystem
pub struct AppState {
    /// Entity table and service sink; states are pushed in over HTTP
    pub host: Arc<MemoryHost>,
    pub clock: Arc<dyn Clock>,
    pub storage_dir: PathBuf,
    pub alarms: Arc<AlarmConfigManager>,
    pub responsible: Arc<ResponsiblePeople>,
    pub alarm_states: Arc<AlarmStates>,
    sensors: RwLock<HashMap<String, Arc<RuntimeSensor>>>,
    /// Held from the existence check until the new sensor is registered
    registration: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub bind_host: String,
}

impl AppState {
    pub fn new(port: u16, bind_host: String, storage_dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let host = Arc::new(MemoryHost::new(Arc::clone(&clock)));
        let responsible = Arc::new(ResponsiblePeople::new(&storage_dir));
        let alarm_states = Arc::new(AlarmStates::new());
        let alarms = Arc::new(AlarmConfigManager::new(
            host.clone(),
            &storage_dir,
            Arc::clone(&responsible),
            Arc::clone(&alarm_states),
            shutdown_rx,
        ));

        Self {
            host,
            clock,
            storage_dir,
            alarms,
            responsible,
            alarm_states,
            sensors: RwLock::new(HashMap::new()),
            registration: Mutex::new(()),
            shutdown_tx,
            start_time: Instant::now(),
            port,
            bind_host,
        }
    }

    /// Load the installation-wide stores, then bring up every entry
    pub async fn load(&self, entries: Vec<EntryConfig>) {
        self.responsible.load().await;
        self.alarms.load().await;
        for entry in entries {
            if let Err(e) = self.add_entry(entry).await {
                warn!("Skipping entry: {}", e);
            }
        }
    }

    /// Create, restore and register the sensor of one entry
    pub async fn add_entry(&self, config: EntryConfig) -> EngineResult<Arc<RuntimeSensor>> {
        let _registration = self.registration.lock().await;
        if self.sensor(&config.entry_id).is_ok() {
            return Err(EngineError::InvalidRequest(format!(
                "entry '{}' already exists",
                config.entry_id
            )));
        }
        Ok(self.register(config).await)
    }

    /// Replace the configuration of an existing entry or create it; the flag
    /// is true when the entry was created
    pub async fn upsert_entry(&self, config: EntryConfig) -> EngineResult<(Arc<RuntimeSensor>, bool)> {
        let _registration = self.registration.lock().await;
        match self.sensor(&config.entry_id) {
            Ok(sensor) => {
                sensor.update_config(config).await?;
                Ok((sensor, false))
            }
            Err(_) => Ok((self.register(config).await, true)),
        }
    }

    async fn register(&self, config: EntryConfig) -> Arc<RuntimeSensor> {
        let entry_id = config.entry_id.clone();
        let sensor = Arc::new(RuntimeSensor::new(
            config,
            self.host.clone(),
            Arc::clone(&self.clock),
            &self.storage_dir,
            self.shutdown_tx.subscribe(),
        ));
        sensor.initialize().await;

        self.sensors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry_id.clone(), Arc::clone(&sensor));
        info!("[{}] Entry registered", entry_id);
        sensor
    }

    /// Look up a sensor by entry id
    pub fn sensor(&self, entry_id: &str) -> EngineResult<Arc<RuntimeSensor>> {
        self.sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entry_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownEntry(entry_id.to_string()))
    }

    /// All sensors ordered by entry id
    pub fn sensors(&self) -> Vec<Arc<RuntimeSensor>> {
        let mut sensors: Vec<_> = self
            .sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        sensors.sort_by(|a, b| a.entry_id().cmp(b.entry_id()));
        sensors
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Signal every loop to stop, persist counters and detach listeners
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        for sensor in self.sensors() {
            sensor.shutdown().await;
        }
        self.alarms.shutdown().await;
        info!("All entries shut down");
    }
}
