//! State management module
//!
//! This module contains the in-memory state of the engine: the runtime
//! counter, timer phases, reset schedule, alarm firing states and the shared
//! application state.

pub mod alarm_state;
pub mod app_state;
pub mod reset_schedule;
pub mod runtime;
pub mod timer_state;

// Re-export main types
pub use alarm_state::{AlarmFiringState, AlarmStates};
pub use app_state::AppState;
pub use reset_schedule::ResetSchedule;
pub use runtime::RuntimeAccumulator;
pub use timer_state::{ActiveTimer, DurationUnit, StartMethod, TimerPhase, TimerStatus};
