//! Time sources and absolute-instant sleeping

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use std::time::Duration;

/// Source of wall-clock time for every accounting decision
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;

    /// Offset used to interpret the daily reset time-of-day
    fn offset(&self) -> FixedOffset;
}

/// Wall clock backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// Clock that advances with the tokio timer.
///
/// Anchored at construction to a UTC instant; afterwards it reports
/// `base + (tokio::time::Instant::now() - origin)`. Under a paused runtime
/// this makes time fully deterministic.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
    offset: FixedOffset,
}

impl TokioClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self::with_offset(base, Utc.fix())
    }

    pub fn with_offset(base: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
            offset,
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.origin);
        self.base + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Sleep until the clock reports `deadline` or later.
///
/// The clock is re-read after every wake-up so drift between the clock and
/// the tokio timer never fires a callback early.
pub async fn sleep_until(clock: &dyn Clock, deadline: DateTime<Utc>) {
    loop {
        let remaining = deadline - clock.now();
        let Ok(remaining) = remaining.to_std() else {
            return;
        };
        if remaining.is_zero() {
            return;
        }
        tokio::time::sleep(remaining).await;
    }
}

/// Positive fractional seconds as a `Duration`; `None` for non-positive,
/// non-finite or unrepresentably large values
pub fn secs_f64(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}
