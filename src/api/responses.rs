//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::{alarm::AlarmCardConfig, sensor::SensorSnapshot, state::AlarmFiringState};

/// API response structure for service endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<SensorSnapshot>,
}

impl ApiResponse {
    pub fn new(status: &str, message: String, entry: Option<SensorSnapshot>) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            entry,
        }
    }

    /// Successful operation on an entry
    pub fn ok(message: String, entry: SensorSnapshot) -> Self {
        Self::new("ok", message, Some(entry))
    }

    /// Successful operation without an entry
    pub fn done(message: String) -> Self {
        Self::new("ok", message, None)
    }
}

/// Server overview
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub entries: Vec<String>,
    pub alarm_configs: usize,
    pub active_alarms: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlarmsResponse {
    pub alarms: HashMap<String, AlarmFiringState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigsResponse {
    pub configs: HashMap<String, AlarmCardConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsibleResponse {
    pub services: Vec<String>,
}

// Service requests

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub entry_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StartTimerRequest {
    pub entry_id: String,
    pub duration: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reverse_mode: bool,
    #[serde(default)]
    pub start_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualPowerRequest {
    pub entry_id: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    pub entry_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSwitchRequest {
    pub entry_id: String,
    pub entity_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAlarmEnabledRequest {
    pub entry_id: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetCardConfigRequest {
    pub config_id: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// Entity state pushed in by the host side
#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}
