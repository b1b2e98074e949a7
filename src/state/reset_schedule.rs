//! Daily reset time-of-day and next-reset bookkeeping

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use tracing::warn;

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_reset_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Daily wall-clock reset plus the persisted absolute next-reset instant
#[derive(Debug, Clone, PartialEq)]
pub struct ResetSchedule {
    time: NaiveTime,
    next_reset: Option<DateTime<Utc>>,
}

impl Default for ResetSchedule {
    fn default() -> Self {
        Self {
            time: NaiveTime::MIN,
            next_reset: None,
        }
    }
}

impl ResetSchedule {
    /// Build from configuration; invalid values fall back to midnight
    pub fn from_config(value: &str, context: &str) -> Self {
        let time = parse_reset_time(value).unwrap_or_else(|| {
            warn!("[{}] Invalid reset time '{}', using default 00:00:00", context, value);
            NaiveTime::MIN
        });
        Self {
            time,
            next_reset: None,
        }
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn time_label(&self) -> String {
        self.time.format("%H:%M:%S").to_string()
    }

    pub fn next_reset(&self) -> Option<DateTime<Utc>> {
        self.next_reset
    }

    pub fn set_next_reset(&mut self, next: DateTime<Utc>) {
        self.next_reset = Some(next);
    }

    /// First occurrence of the reset time strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        let local_now = now.with_timezone(&offset);
        let today = local_now.date_naive().and_time(self.time);
        let candidate = Utc.from_utc_datetime(&(today - Duration::seconds(offset.local_minus_utc() as i64)));
        if candidate <= now {
            candidate + Duration::days(1)
        } else {
            candidate
        }
    }

    /// Recompute and store the next reset relative to `now`
    pub fn advance(&mut self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        let next = self.next_after(now, offset);
        self.next_reset = Some(next);
        next
    }

    /// Number of resets missed if `now` is at or past the stored instant
    pub fn missed_resets(&self, now: DateTime<Utc>) -> Option<i64> {
        let next = self.next_reset?;
        if now < next {
            return None;
        }
        let overdue = now - next;
        let days = overdue.num_days();
        let remainder = overdue.num_seconds() - days * 86_400;
        Some((days + i64::from(remainder > 0)).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 15, h, m, 0).unwrap()
    }

    #[test]
    fn parses_both_formats() {
        assert_eq!(parse_reset_time("06:30"), NaiveTime::from_hms_opt(6, 30, 0));
        assert_eq!(parse_reset_time("06:30:15"), NaiveTime::from_hms_opt(6, 30, 15));
        assert_eq!(parse_reset_time("25:00"), None);
        assert_eq!(ResetSchedule::from_config("nope", "test").time(), NaiveTime::MIN);
    }

    #[test]
    fn next_after_rolls_to_tomorrow_once_passed() {
        let schedule = ResetSchedule::from_config("06:00", "test");
        let utc_offset = FixedOffset::east_opt(0).unwrap();

        assert_eq!(schedule.next_after(utc(5, 0), utc_offset), utc(6, 0));
        assert_eq!(schedule.next_after(utc(6, 0), utc_offset), utc(6, 0) + Duration::days(1));
    }

    #[test]
    fn next_after_respects_local_offset() {
        let schedule = ResetSchedule::from_config("00:00", "test");
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        // 21:00 UTC is 23:00 local, local midnight is 22:00 UTC
        assert_eq!(schedule.next_after(utc(21, 0), plus_two), utc(22, 0));
    }

    #[test]
    fn missed_resets_counts_whole_and_partial_days() {
        let mut schedule = ResetSchedule::from_config("00:00", "test");
        schedule.set_next_reset(utc(0, 0));

        assert_eq!(schedule.missed_resets(utc(0, 0) - Duration::minutes(1)), None);
        assert_eq!(schedule.missed_resets(utc(9, 0)), Some(1));
        assert_eq!(schedule.missed_resets(utc(9, 0) + Duration::days(2)), Some(3));
    }
}
