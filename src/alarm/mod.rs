//! Alarm trigger evaluation module
//!
//! Card configurations, trigger matching, the global responsible-people list
//! and the manager that ties them to entity state changes.

pub mod config;
pub mod manager;
pub mod responsible;
pub mod trigger;

// Re-export main types
pub use config::AlarmCardConfig;
pub use manager::AlarmConfigManager;
pub use responsible::ResponsiblePeople;
pub use trigger::TriggerKind;
