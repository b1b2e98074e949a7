//! alarm-runtime - runtime accounting and alarm triggers for smart-home switches
//!
//! Each configured entry tracks how long a monitored switch has been on,
//! drives normal and reverse countdown timers and resets its counter daily.
//! Alarm cards fire notifications, email and sound when a watched entity
//! meets one of their trigger conditions.

pub mod alarm;
pub mod api;
pub mod config;
pub mod error;
pub mod sensor;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use sensor::RuntimeSensor;
pub use state::AppState;
pub use utils::signals::shutdown_signal;
