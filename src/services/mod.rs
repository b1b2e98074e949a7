//! External collaborator module
//!
//! This module contains the narrow interfaces the engine depends on: the host
//! platform, the clock, the persistent store and notification fan-out.

pub mod clock;
pub mod host;
pub mod notify;
pub mod storage;

// Re-export main types
pub use clock::{Clock, SystemClock, TokioClock};
pub use host::{EntityHost, EntityState, MemoryHost, ServiceCall, StateChange};
pub use storage::JsonStore;
