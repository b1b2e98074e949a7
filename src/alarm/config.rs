//! Sanitized alarm card configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::services::clock::secs_f64;

/// Keys a card config may carry; everything else is dropped on save
pub const ALLOWED_CONFIG_KEYS: [&str; 17] = [
    "config_id",
    "target_entity",
    "trigger_types",
    "trigger_threshold",
    "door_open_seconds",
    "alarm_enabled",
    "sound_enabled",
    "sound_player",
    "sound_path",
    "email_enabled",
    "email_subject",
    "email_body",
    "mobile_enabled",
    "mobile_service",
    "auto_clear_enabled",
    "auto_clear_seconds",
    "title",
];

pub const DEFAULT_DOOR_OPEN_SECONDS: u64 = 60;

/// Lenient numeric parse: JSON numbers and numeric strings
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Loose truthiness of a stored JSON value
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Card configuration restricted to the allow-list.
///
/// Values are kept verbatim as sent by the card; typed accessors interpret
/// them leniently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmCardConfig(Map<String, Value>);

impl AlarmCardConfig {
    pub fn sanitize(config_id: &str, raw: &Map<String, Value>) -> Self {
        let mut data: Map<String, Value> = raw
            .iter()
            .filter(|(key, _)| ALLOWED_CONFIG_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        data.insert("config_id".to_string(), Value::String(config_id.to_string()));
        Self(data)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn config_id(&self) -> &str {
        self.text("config_id").unwrap_or_default()
    }

    /// Non-empty string value
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).map(truthy).unwrap_or(false)
    }

    pub fn target_entity(&self) -> Option<&str> {
        self.text("target_entity")
    }

    pub fn trigger_types(&self) -> Vec<String> {
        match self.0.get("trigger_types") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    pub fn threshold(&self) -> Option<&Value> {
        self.0.get("trigger_threshold")
    }

    /// Cards are enabled unless explicitly switched off
    pub fn alarm_enabled(&self) -> bool {
        self.0.get("alarm_enabled").map(truthy).unwrap_or(true)
    }

    /// Held-open delay; non-positive, oversized or unparsable values use the
    /// default
    pub fn door_open_delay(&self) -> Duration {
        self.0
            .get("door_open_seconds")
            .and_then(parse_number)
            .and_then(secs_f64)
            .unwrap_or(Duration::from_secs(DEFAULT_DOOR_OPEN_SECONDS))
    }

    /// Mobile targets; a single string or a list
    pub fn mobile_services(&self) -> Vec<String> {
        match self.0.get("mobile_service") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn auto_clear_delay(&self) -> Option<Duration> {
        if !self.flag("auto_clear_enabled") {
            return None;
        }
        self.0.get("auto_clear_seconds").and_then(parse_number).and_then(secs_f64)
    }

    pub fn title(&self) -> &str {
        self.text("title").unwrap_or("Alarm")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn sanitize_drops_unknown_keys_and_keeps_the_rest_verbatim() {
        let input = raw(json!({
            "target_entity": "binary_sensor.front_door",
            "trigger_types": ["door_open_60s", "changed"],
            "door_open_seconds": "45",
            "mobile_service": "notify.phone",
            "favourite_colour": "green",
            "config_id": "spoofed",
        }));

        let config = AlarmCardConfig::sanitize("front_door", &input);
        let map = config.as_map();

        assert!(!map.contains_key("favourite_colour"));
        assert_eq!(map["config_id"], "front_door");
        assert_eq!(map["door_open_seconds"], "45");
        assert_eq!(map["trigger_types"], json!(["door_open_60s", "changed"]));
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn door_open_delay_clamps_to_default() {
        let delay = |v: Value| {
            AlarmCardConfig::sanitize("c", &raw(json!({ "door_open_seconds": v }))).door_open_delay()
        };
        assert_eq!(delay(json!(30)), Duration::from_secs(30));
        assert_eq!(delay(json!("12.5")), Duration::from_millis(12_500));
        assert_eq!(delay(json!(0)), Duration::from_secs(60));
        assert_eq!(delay(json!(-5)), Duration::from_secs(60));
        assert_eq!(delay(json!("soon")), Duration::from_secs(60));
        assert_eq!(delay(json!("1e30")), Duration::from_secs(60));
        assert_eq!(delay(json!(1e300)), Duration::from_secs(60));
        assert_eq!(AlarmCardConfig::sanitize("c", &Map::new()).door_open_delay(), Duration::from_secs(60));
    }

    #[test]
    fn accessors_are_lenient() {
        let config = AlarmCardConfig::sanitize(
            "c",
            &raw(json!({
                "mobile_service": ["notify.a", "notify.b"],
                "auto_clear_enabled": true,
                "auto_clear_seconds": "0",
                "alarm_enabled": false,
            })),
        );
        assert_eq!(config.mobile_services(), vec!["notify.a", "notify.b"]);
        assert_eq!(config.auto_clear_delay(), None);
        assert!(!config.alarm_enabled());

        let clear = |v: Value| {
            AlarmCardConfig::sanitize(
                "c",
                &raw(json!({ "auto_clear_enabled": true, "auto_clear_seconds": v })),
            )
            .auto_clear_delay()
        };
        assert_eq!(clear(json!(10)), Some(Duration::from_secs(10)));
        assert_eq!(clear(json!(1e30)), None);
        assert_eq!(clear(json!("1e30")), None);
        assert_eq!(config.title(), "Alarm");
        assert!(AlarmCardConfig::sanitize("c", &Map::new()).alarm_enabled());
    }
}
