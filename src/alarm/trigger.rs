//! Trigger kinds and transition matching

use serde_json::Value;
use std::str::FromStr;

use super::config::parse_number;
use crate::services::EntityState;

pub const OPEN_STATES: [&str; 3] = ["on", "open", "opening"];
pub const MOTION_STATES: [&str; 3] = ["on", "motion", "detected"];
pub const PRESSED_STATES: [&str; 3] = ["on", "pressed", "triggered"];
pub const SMOKE_STATES: [&str; 3] = ["on", "smoke", "detected"];
pub const EXIT_STATES: [&str; 2] = ["on", "open"];
pub const AFFIRMATIVE_VALUES: [&str; 4] = ["on", "true", "detected", "yes"];

/// Alarm trigger kinds a card can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Changed,
    Above,
    Below,
    On,
    Off,
    Locked,
    Unlocked,
    Motion,
    CctvMotion,
    PanicButton,
    EmergencyButton,
    Smoke,
    EmergencyExit,
    Person,
    Vehicle,
    /// Held-open timer; never matches a single transition
    DoorOpen,
}

impl FromStr for TriggerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "changed" => Self::Changed,
            "above" => Self::Above,
            "below" => Self::Below,
            "on" => Self::On,
            "off" => Self::Off,
            "locked" => Self::Locked,
            "unlocked" => Self::Unlocked,
            "motion" => Self::Motion,
            "cctv_motion" => Self::CctvMotion,
            "panic_button" => Self::PanicButton,
            "emergency_button" => Self::EmergencyButton,
            "smoke" => Self::Smoke,
            "emergency_exit" => Self::EmergencyExit,
            "person" => Self::Person,
            "vehicle" => Self::Vehicle,
            "door_open_60s" => Self::DoorOpen,
            _ => return Err(()),
        })
    }
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Above => "above",
            Self::Below => "below",
            Self::On => "on",
            Self::Off => "off",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Motion => "motion",
            Self::CctvMotion => "cctv_motion",
            Self::PanicButton => "panic_button",
            Self::EmergencyButton => "emergency_button",
            Self::Smoke => "smoke",
            Self::EmergencyExit => "emergency_exit",
            Self::Person => "person",
            Self::Vehicle => "vehicle",
            Self::DoorOpen => "door_open_60s",
        }
    }

    /// Decide whether this kind fires on the `old -> new` transition
    pub fn matches(self, old: Option<&EntityState>, new: &EntityState, threshold: Option<&Value>) -> bool {
        let state = new.state.to_lowercase();
        let state = state.as_str();

        match self {
            Self::Changed => old.map(|o| o.state != new.state).unwrap_or(true),
            Self::Above | Self::Below => {
                let (Some(threshold), Some(value)) = (
                    threshold.and_then(parse_number),
                    new.state.trim().parse::<f64>().ok(),
                ) else {
                    return false;
                };
                if self == Self::Above {
                    value > threshold
                } else {
                    value < threshold
                }
            }
            Self::On => state == "on",
            Self::Off => state == "off",
            Self::Locked => state == "locked",
            Self::Unlocked => state == "unlocked",
            Self::Motion | Self::CctvMotion => MOTION_STATES.contains(&state),
            Self::PanicButton | Self::EmergencyButton => PRESSED_STATES.contains(&state),
            Self::Smoke => SMOKE_STATES.contains(&state),
            Self::EmergencyExit => EXIT_STATES.contains(&state),
            Self::Person => match_attribute(new, "person"),
            Self::Vehicle => match_attribute(new, "vehicle"),
            Self::DoorOpen => false,
        }
    }
}

/// Probe a detection attribute, falling back to the primary on/off value
fn match_attribute(state: &EntityState, key: &str) -> bool {
    match state.attributes.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v > 0.0).unwrap_or(false),
        Some(Value::String(s)) => AFFIRMATIVE_VALUES.contains(&s.to_lowercase().as_str()),
        _ => state.state.to_lowercase() == "on",
    }
}

/// Whether the entity currently reports an open-like state
pub fn is_open_state(state: &EntityState) -> bool {
    OPEN_STATES.contains(&state.state.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Map};

    fn state(value: &str) -> EntityState {
        with_attrs(value, json!({}))
    }

    fn with_attrs(value: &str, attrs: Value) -> EntityState {
        EntityState {
            entity_id: "sensor.probe".into(),
            state: value.into(),
            attributes: attrs.as_object().cloned().unwrap_or_else(Map::new),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn changed_fires_on_difference_or_missing_old() {
        assert!(TriggerKind::Changed.matches(None, &state("on"), None));
        assert!(TriggerKind::Changed.matches(Some(&state("off")), &state("on"), None));
        assert!(!TriggerKind::Changed.matches(Some(&state("on")), &state("on"), None));
    }

    #[test]
    fn numeric_triggers_need_both_sides_numeric() {
        let twenty = json!("20");
        assert!(TriggerKind::Above.matches(None, &state("21.5"), Some(&twenty)));
        assert!(!TriggerKind::Above.matches(None, &state("20"), Some(&twenty)));
        assert!(TriggerKind::Below.matches(None, &state("19"), Some(&json!(20))));
        assert!(!TriggerKind::Above.matches(None, &state("unavailable"), Some(&twenty)));
        assert!(!TriggerKind::Below.matches(None, &state("5"), Some(&json!("cold"))));
        assert!(!TriggerKind::Below.matches(None, &state("5"), None));
    }

    #[test]
    fn exact_and_category_matches_ignore_case() {
        assert!(TriggerKind::Locked.matches(None, &state("LOCKED"), None));
        assert!(!TriggerKind::Locked.matches(None, &state("unlocked"), None));
        assert!(TriggerKind::Motion.matches(None, &state("Detected"), None));
        assert!(TriggerKind::PanicButton.matches(None, &state("pressed"), None));
        assert!(TriggerKind::Smoke.matches(None, &state("smoke"), None));
        assert!(TriggerKind::EmergencyExit.matches(None, &state("open"), None));
        assert!(!TriggerKind::EmergencyExit.matches(None, &state("opening"), None));
    }

    #[test]
    fn attribute_probes() {
        let person = TriggerKind::Person;
        assert!(person.matches(None, &with_attrs("off", json!({"person": true})), None));
        assert!(!person.matches(None, &with_attrs("on", json!({"person": false})), None));
        assert!(person.matches(None, &with_attrs("off", json!({"person": 2})), None));
        assert!(!person.matches(None, &with_attrs("off", json!({"person": 0})), None));
        assert!(person.matches(None, &with_attrs("off", json!({"person": "Yes"})), None));
        assert!(!person.matches(None, &with_attrs("off", json!({"person": "nobody"})), None));
        // Missing attribute falls back to the primary value
        assert!(TriggerKind::Vehicle.matches(None, &state("on"), None));
        assert!(!TriggerKind::Vehicle.matches(None, &state("off"), None));
    }

    #[test]
    fn held_open_never_matches_a_transition() {
        assert!(!TriggerKind::DoorOpen.matches(None, &state("open"), None));
        assert!(is_open_state(&state("Opening")));
        assert!(!is_open_state(&state("closed")));
    }

    #[test]
    fn names_round_trip() {
        for name in ["changed", "cctv_motion", "door_open_60s", "emergency_button"] {
            assert_eq!(name.parse::<TriggerKind>().unwrap().as_str(), name);
        }
        assert!("sparkles".parse::<TriggerKind>().is_err());
    }
}
