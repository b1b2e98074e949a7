//! Persisted per-entry sensor record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{timer_state::ActiveTimer, StartMethod};

pub const STORE_VERSION: u32 = 2;

pub fn store_key(entry_id: &str) -> String {
    format!("alarm_config_card_{}", entry_id)
}

/// Version 1 records predate the persisted reset instant
pub fn migrate(from: u32, mut data: Value) -> Value {
    if from < 2 {
        if let Some(map) = data.as_object_mut() {
            map.entry("next_reset_date").or_insert(Value::Null);
        }
    }
    data
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finishes_at: Option<DateTime<Utc>>,
    /// Timer duration in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_at_start: Option<i64>,
    #[serde(default)]
    pub reverse_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_method: Option<StartMethod>,
    #[serde(default)]
    pub next_reset_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub runtime_seconds: i64,
    #[serde(default)]
    pub last_on_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_enabled: Option<bool>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl SensorRecord {
    /// Rebuild the persisted countdown, if any
    pub fn timer(&self) -> Option<ActiveTimer> {
        let finishes_at = self.finishes_at?;
        let duration = self.duration?;
        let started_at = self.timer_start?;

        let mut timer = ActiveTimer::new(
            duration,
            started_at,
            self.runtime_at_start.unwrap_or(0),
            self.reverse_mode,
            self.start_method.unwrap_or_default(),
        )?;
        timer.finishes_at = finishes_at;
        Some(timer)
    }

    pub fn set_timer(&mut self, timer: Option<&ActiveTimer>) {
        match timer {
            Some(timer) => {
                self.finishes_at = Some(timer.finishes_at);
                self.duration = Some(timer.duration_minutes);
                self.timer_start = Some(timer.started_at);
                self.runtime_at_start = Some(timer.runtime_at_start);
                self.reverse_mode = timer.reverse;
                self.start_method = Some(timer.start_method);
            }
            None => {
                self.finishes_at = None;
                self.duration = None;
                self.timer_start = None;
                self.runtime_at_start = None;
                self.reverse_mode = false;
                self.start_method = None;
            }
        }
    }
}
