//! Countdown timer phases and their parameters

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EngineError;
use super::runtime::{elapsed_rounded, elapsed_whole};

/// How the timer was started from the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMethod {
    #[default]
    Button,
    Slider,
}

impl FromStr for StartMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "button" => Ok(Self::Button),
            "slider" => Ok(Self::Slider),
            other => Err(EngineError::InvalidRequest(format!("unknown start_method '{}'", other))),
        }
    }
}

/// Unit of a requested timer duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationUnit {
    Seconds,
    #[default]
    Minutes,
    Hours,
    Days,
}

impl FromStr for DurationUnit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" | "sec" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "minutes" => Ok(Self::Minutes),
            "h" | "hr" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            other => Err(EngineError::InvalidRequest(format!("unknown duration unit '{}'", other))),
        }
    }
}

impl DurationUnit {
    pub fn to_minutes(self, amount: f64) -> f64 {
        match self {
            Self::Seconds => amount / 60.0,
            Self::Minutes => amount,
            Self::Hours => amount * 60.0,
            Self::Days => amount * 1440.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Seconds => "sec",
            Self::Minutes => "min",
            Self::Hours => "hr",
            Self::Days => "day",
        }
    }

    /// Amount as shown in notifications: minutes are always whole, other
    /// units drop the fraction only when there is none.
    pub fn display_amount(self, amount: f64) -> String {
        if self == Self::Minutes || amount.fract() == 0.0 {
            format!("{}", amount.trunc() as i64)
        } else {
            format!("{}", amount)
        }
    }
}

/// Parameters of a running countdown
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTimer {
    pub duration_minutes: f64,
    pub started_at: DateTime<Utc>,
    pub finishes_at: DateTime<Utc>,
    /// Counter value the timer builds on; negative after a mid-timer reset
    pub runtime_at_start: i64,
    pub reverse: bool,
    pub start_method: StartMethod,
}

impl ActiveTimer {
    /// `None` when the countdown would end beyond the representable range
    pub fn new(
        duration_minutes: f64,
        started_at: DateTime<Utc>,
        runtime_at_start: i64,
        reverse: bool,
        start_method: StartMethod,
    ) -> Option<Self> {
        Some(Self {
            duration_minutes,
            started_at,
            finishes_at: Self::end_of(started_at, duration_minutes)?,
            runtime_at_start,
            reverse,
            start_method,
        })
    }

    /// Instant a countdown of `duration_minutes` begun at `started_at` ends
    pub fn end_of(started_at: DateTime<Utc>, duration_minutes: f64) -> Option<DateTime<Utc>> {
        let millis = (duration_minutes * 60_000.0).round();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return None;
        }
        Duration::try_milliseconds(millis as i64).and_then(|d| started_at.checked_add_signed(d))
    }

    /// Configured duration in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.duration_minutes * 60.0).round() as i64
    }

    /// Counter value after a natural completion
    pub fn completed_runtime(&self) -> i64 {
        self.runtime_at_start + self.duration_seconds()
    }

    /// Counter value when the timer is cut short at `now`
    pub fn cancelled_runtime(&self, now: DateTime<Utc>) -> i64 {
        self.runtime_at_start + elapsed_rounded(self.started_at, now)
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        elapsed_whole(self.started_at, now)
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.finishes_at - now).num_seconds().max(0)
    }

    /// Rebase after the counter was zeroed mid-timer.
    ///
    /// The elapsed part is subtracted so that only the post-reset portion of
    /// the countdown ends up in the counter.
    pub fn rebase_after_reset(&mut self, now: DateTime<Utc>) {
        self.runtime_at_start = -self.elapsed_seconds(now);
    }
}

/// Timer state machine.
///
/// `Finishing` guards a natural completion in progress: switch events seen
/// while finishing must not be treated as an external cancel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TimerPhase {
    #[default]
    Idle,
    Active(ActiveTimer),
    Finishing(ActiveTimer),
}

impl TimerPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Timer parameters while active or finishing
    pub fn timer(&self) -> Option<&ActiveTimer> {
        match self {
            Self::Idle => None,
            Self::Active(t) | Self::Finishing(t) => Some(t),
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveTimer> {
        match self {
            Self::Active(t) => Some(t),
            _ => None,
        }
    }

    /// Move `Active` to `Finishing`; returns the timer if the move happened
    pub fn begin_finishing(&mut self) -> Option<ActiveTimer> {
        match std::mem::take(self) {
            Self::Active(t) => {
                *self = Self::Finishing(t.clone());
                Some(t)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.timer().map(|t| t.reverse).unwrap_or(false)
    }

    pub fn label(&self) -> &'static str {
        if self.is_idle() {
            "idle"
        } else {
            "active"
        }
    }
}

/// Countdown status published by the timer update loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerStatus {
    pub active: bool,
    pub remaining_seconds: Option<u64>,
}

impl TimerStatus {
    /// Create an active timer status with remaining seconds
    pub fn active(remaining_seconds: u64) -> Self {
        Self {
            active: true,
            remaining_seconds: Some(remaining_seconds),
        }
    }

    /// Create an inactive timer status
    pub fn inactive() -> Self {
        Self {
            active: false,
            remaining_seconds: None,
        }
    }
}

impl Default for TimerStatus {
    fn default() -> Self {
        Self::inactive()
    }
}
