//! Whole-second runtime accounting

use chrono::{DateTime, Utc};

/// Whole seconds elapsed between `anchor` and `now`, rounded down
pub fn elapsed_whole(anchor: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - anchor).num_seconds().max(0)
}

/// Whole seconds elapsed between `anchor` and `now`, rounded to nearest
pub fn elapsed_rounded(anchor: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (now - anchor).num_milliseconds().max(0);
    (millis + 500) / 1000
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Run {
    anchor: DateTime<Utc>,
    base: i64,
}

/// Seconds counter of "on" time since the last reset.
///
/// While running the displayed value is `base + floor(now - anchor)`. Every
/// re-anchor captures the current value as the new base, so the counter never
/// drifts with the number of observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeAccumulator {
    seconds: i64,
    run: Option<Run>,
}

impl RuntimeAccumulator {
    pub fn new(seconds: i64) -> Self {
        Self { seconds, run: None }
    }

    pub fn value(&self) -> i64 {
        self.seconds
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.run.map(|r| r.anchor)
    }

    /// Begin accumulating from `anchor` on top of `base`
    pub fn start(&mut self, anchor: DateTime<Utc>, base: i64) {
        self.run = Some(Run { anchor, base });
    }

    /// Recompute the counter; returns the new value only when it changed
    pub fn observe(&mut self, now: DateTime<Utc>) -> Option<i64> {
        let run = self.run?;
        let value = run.base + elapsed_whole(run.anchor, now);
        if value == self.seconds {
            return None;
        }
        self.seconds = value;
        Some(value)
    }

    /// Take a final observation and stop accumulating
    pub fn freeze(&mut self, now: DateTime<Utc>) -> i64 {
        self.observe(now);
        self.run = None;
        self.seconds
    }

    /// Stop accumulating without observing
    pub fn halt(&mut self) {
        self.run = None;
    }

    /// Overwrite the counter; any running accumulation is halted
    pub fn set(&mut self, seconds: i64) {
        self.run = None;
        self.seconds = seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn on_intervals_sum_with_floor_at_each_stop() {
        let mut acc = RuntimeAccumulator::new(0);

        acc.start(t0(), acc.value());
        assert_eq!(acc.freeze(t0() + Duration::milliseconds(2700)), 2);

        let second_on = t0() + Duration::seconds(10);
        acc.start(second_on, acc.value());
        assert_eq!(acc.freeze(second_on + Duration::milliseconds(3600)), 5);
        assert!(!acc.is_running());
    }

    #[test]
    fn observe_reports_only_whole_second_changes() {
        let mut acc = RuntimeAccumulator::new(40);
        acc.start(t0(), 40);

        assert_eq!(acc.observe(t0() + Duration::milliseconds(300)), None);
        assert_eq!(acc.observe(t0() + Duration::milliseconds(1000)), Some(41));
        assert_eq!(acc.observe(t0() + Duration::milliseconds(1950)), None);
        assert_eq!(acc.observe(t0() + Duration::milliseconds(2050)), Some(42));
    }

    #[test]
    fn observations_do_not_drift() {
        let mut many = RuntimeAccumulator::new(0);
        many.start(t0(), 0);
        for ms in (0..=60_000).step_by(50) {
            many.observe(t0() + Duration::milliseconds(ms));
        }

        let mut once = RuntimeAccumulator::new(0);
        once.start(t0(), 0);
        once.observe(t0() + Duration::seconds(60));

        assert_eq!(many.value(), once.value());
        assert_eq!(many.value(), 60);
    }

    #[test]
    fn negative_base_counts_up_from_below_zero() {
        let mut acc = RuntimeAccumulator::new(0);
        acc.start(t0(), -30);
        assert_eq!(acc.observe(t0() + Duration::seconds(45)), Some(15));
    }

    #[test]
    fn halt_and_set_do_not_observe() {
        let mut acc = RuntimeAccumulator::new(5);
        acc.start(t0(), 5);
        acc.halt();
        assert_eq!(acc.observe(t0() + Duration::seconds(100)), None);
        assert_eq!(acc.value(), 5);

        acc.start(t0(), 5);
        acc.set(600);
        assert!(!acc.is_running());
        assert_eq!(acc.value(), 600);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(elapsed_whole(t0(), t0() + Duration::milliseconds(1999)), 1);
        assert_eq!(elapsed_rounded(t0(), t0() + Duration::milliseconds(1499)), 1);
        assert_eq!(elapsed_rounded(t0(), t0() + Duration::milliseconds(1500)), 2);
        assert_eq!(elapsed_whole(t0(), t0() - Duration::seconds(4)), 0);
    }
}
