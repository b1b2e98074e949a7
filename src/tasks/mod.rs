//! Background tasks module
//!
//! This module contains the loops that run alongside the HTTP server: live
//! runtime accumulation, countdown completion and updates, the daily reset
//! schedule and the entity listeners.

pub mod accumulation;
pub mod alarm;
pub mod daily_reset;
pub mod switch_listener;
pub mod timer;

// Re-export main functions
pub use accumulation::accumulation_task;
pub use alarm::{alarm_listener_task, held_open_task};
pub use daily_reset::daily_reset_task;
pub use switch_listener::switch_listener_task;
pub use timer::{timer_completion_task, timer_update_task};
