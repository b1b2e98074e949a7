//! Countdown, reset and power operations on a [`RuntimeSensor`]

use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{RuntimeSensor, Settle};
use crate::{
    config::EntryConfig,
    error::{EngineError, EngineResult},
    services::host::{STATE_OFF, STATE_ON},
    state::{ActiveTimer, DurationUnit, ResetSchedule, StartMethod, TimerPhase},
};

const DEFAULT_TEST_MESSAGE: &str = "Test notification";

/// Polling for the switch to report on after a timer start
const SWITCH_ON_POLLS: usize = 10;
const SWITCH_ON_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Manual power command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    TurnOn,
    TurnOff,
}

impl FromStr for PowerAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "turn_on" => Ok(Self::TurnOn),
            "turn_off" => Ok(Self::TurnOff),
            other => Err(EngineError::InvalidRequest(format!(
                "action must be 'turn_on' or 'turn_off', got '{}'",
                other
            ))),
        }
    }
}

impl RuntimeSensor {
    /// Start a countdown, replacing any running one.
    ///
    /// A normal timer switches the device on and stops it when the countdown
    /// ends; a reverse timer switches it off and turns it on at the end.
    pub async fn start_timer(
        self: &Arc<Self>,
        duration: f64,
        unit: DurationUnit,
        reverse: bool,
        start_method: StartMethod,
    ) -> EngineResult<()> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(EngineError::InvalidRequest(format!(
                "duration must be a positive number, got {}",
                duration
            )));
        }

        let minutes = unit.to_minutes(duration);
        if ActiveTimer::end_of(self.clock.now(), minutes).is_none() {
            return Err(EngineError::InvalidRequest(format!(
                "duration of {} {} is out of range",
                duration,
                unit.label()
            )));
        }

        let _op = self.op_lock.lock().await;
        info!(
            "[{}] Starting {} timer for {} {} ({} min)",
            self.entry_id,
            if reverse { "reverse" } else { "normal" },
            unit.display_amount(duration),
            unit.label(),
            minutes
        );

        let now = self.clock.now();
        self.inner().watchdog = None;

        let replacing = self.inner().phase.is_active();
        if replacing {
            debug!("[{}] Replacing running timer", self.entry_id);
            self.stop_accumulation(Settle::CancelTimer(now)).await;
            self.stop_timer_tasks().await;
            self.inner().phase = TimerPhase::Idle;
        } else {
            self.stop_accumulation(Settle::Freeze(now)).await;
        }

        let runtime_at_start = self.runtime_seconds();

        if reverse {
            self.inner().last_on = None;
            if self.switch_is_on() {
                if let Err(e) = self.switch_service("turn_off").await {
                    warn!("[{}] Failed to turn off switch for reverse timer: {}", self.entry_id, e);
                }
                self.ensure_switch_state(STATE_OFF, "Reverse mode timer start").await;
            }
        } else if !self.switch_is_on() {
            if let Err(e) = self.switch_service("turn_on").await {
                warn!("[{}] Failed to turn on switch: {}", self.entry_id, e);
            }
            self.wait_for_switch_on().await;
        }

        let started_at = self.clock.now();
        let timer = ActiveTimer::new(minutes, started_at, runtime_at_start, reverse, start_method)
            .ok_or_else(|| EngineError::InvalidRequest("timer end is out of range".to_string()))?;
        let finishes_at = timer.finishes_at;
        let switch_on = self.switch_is_on();
        {
            let mut inner = self.inner();
            if !reverse && switch_on && inner.last_on.is_none() {
                inner.last_on = Some(started_at);
            }
            inner.phase = TimerPhase::Active(timer);
        }

        self.persist().await;
        self.spawn_timer_tasks(finishes_at);
        if !reverse && switch_on {
            self.start_accumulation(started_at);
        }
        self.publish_timer_status();

        let lead = if reverse { "Delayed timer started for" } else { "Timer was started for" };
        self.send_notification(&format!("{} {} {}", lead, unit.display_amount(duration), unit.label()))
            .await;
        Ok(())
    }

    async fn wait_for_switch_on(&self) {
        if self.switch_entity_id().is_none() {
            return;
        }
        for _ in 0..SWITCH_ON_POLLS {
            if self.switch_is_on() {
                return;
            }
            sleep(SWITCH_ON_POLL_INTERVAL).await;
        }
        debug!("[{}] Switch did not report on after timer start", self.entry_id);
    }

    /// Cut the running countdown short and switch the device off
    pub async fn cancel_timer(self: &Arc<Self>) -> EngineResult<()> {
        let _op = self.op_lock.lock().await;

        let reverse = match &self.inner().phase {
            TimerPhase::Active(timer) => timer.reverse,
            _ => {
                debug!("[{}] No active timer to cancel", self.entry_id);
                return Ok(());
            }
        };
        info!("[{}] Cancelling timer", self.entry_id);

        let now = self.clock.now();
        let settle = if reverse { Settle::Freeze(now) } else { Settle::CancelTimer(now) };
        self.stop_accumulation(settle).await;
        let usage = self.usage_text();

        {
            let mut inner = self.inner();
            inner.watchdog = None;
            inner.phase = TimerPhase::Idle;
        }
        self.stop_timer_tasks().await;
        self.persist().await;

        if self.switch_is_on() {
            if let Err(e) = self.switch_service("turn_off").await {
                warn!("[{}] Failed to turn off switch on cancel: {}", self.entry_id, e);
            }
            if !reverse {
                self.ensure_switch_state(STATE_OFF, "Timer cancellation turn-off").await;
            }
        }

        self.send_notification(&format!("Timer finished – daily usage {}", usage))
            .await;
        Ok(())
    }

    /// Natural completion, called by the completion task
    pub async fn finish_timer(self: &Arc<Self>) {
        let _op = self.op_lock.lock().await;

        // The caller is the completion task itself; detach its handle
        drop(self.tasks().completion.take());

        let timer = self.inner().phase.begin_finishing();
        let Some(timer) = timer else {
            debug!("[{}] Completion fired without an active timer", self.entry_id);
            return;
        };

        if timer.reverse {
            self.finish_reverse_timer().await;
        } else {
            self.finish_normal_timer(&timer).await;
        }
    }

    async fn finish_normal_timer(self: &Arc<Self>, timer: &ActiveTimer) {
        info!("[{}] Timer completed - turning off switch", self.entry_id);
        self.stop_accumulation(Settle::Halt).await;

        let value = timer.completed_runtime();
        self.inner().runtime.set(value);
        self.publish_runtime(value);
        debug!(
            "[{}] Runtime set to {}s (start {}s + duration {}s)",
            self.entry_id,
            value,
            timer.runtime_at_start,
            timer.duration_seconds()
        );
        let usage = self.usage_text();

        self.stop_timer_tasks().await;
        self.inner().phase = TimerPhase::Idle;
        self.persist().await;

        self.ensure_switch_state(STATE_OFF, "Timer completion turn-off").await;
        self.send_notification(&format!("Timer was turned off - daily usage {}", usage))
            .await;
    }

    async fn finish_reverse_timer(self: &Arc<Self>) {
        info!("[{}] Reverse timer completed - turning on switch", self.entry_id);
        self.stop_timer_tasks().await;
        self.inner().phase = TimerPhase::Idle;
        self.persist().await;

        self.switch_on_after_delay("Reverse timer completion turn-on").await;
        self.persist().await;
        self.send_notification("Delayed start timer completed - device turned ON")
            .await;
    }

    /// Turn the switch on and start counting from that moment
    pub(super) async fn switch_on_after_delay(self: &Arc<Self>, description: &str) {
        if self.switch_entity_id().is_none() {
            return;
        }
        if let Err(e) = self.switch_service("turn_on").await {
            warn!("[{}] Failed to turn on switch: {}", self.entry_id, e);
        }
        self.ensure_switch_state(STATE_ON, description).await;

        let now = self.clock.now();
        self.inner().last_on = Some(now);
        self.start_accumulation(now);
    }

    /// Zero the counter; a running countdown is rebased so that only its
    /// post-reset part is counted
    pub(super) async fn perform_reset(self: &Arc<Self>, kind: &str) {
        let now = self.clock.now();
        info!(
            "[{}] Performing {} runtime reset at {}. Current value: {}s",
            self.entry_id,
            kind,
            now,
            self.runtime_seconds()
        );

        self.stop_accumulation(Settle::Halt).await;
        {
            let mut inner = self.inner();
            if let Some(timer) = inner.phase.active_mut() {
                timer.rebase_after_reset(now);
                debug!(
                    "[{}] Timer rebased, counter base now {}s",
                    self.entry_id, timer.runtime_at_start
                );
            }
            inner.runtime.set(0);
            inner.last_on = None;
        }
        self.publish_runtime(0);

        if self.switch_is_on() {
            self.inner().last_on = Some(now);
            self.start_accumulation(now);
        }
    }

    /// Scheduled daily reset, called by the reset task
    pub async fn scheduled_reset(self: &Arc<Self>) {
        let _op = self.op_lock.lock().await;
        self.perform_reset("scheduled").await;

        let next = self.inner().schedule.advance(self.clock.now(), self.clock.offset());
        info!("[{}] Next reset scheduled for {}", self.entry_id, next);
        self.persist().await;
    }

    /// Operator-requested reset
    pub async fn reset_daily_usage(self: &Arc<Self>) {
        let _op = self.op_lock.lock().await;
        let usage = self.usage_text();
        self.perform_reset("manual").await;
        self.persist().await;
        self.send_notification(&format!("Daily usage reset from {} to 00:00", usage))
            .await;
    }

    pub async fn manual_power_toggle(self: &Arc<Self>, action: PowerAction) {
        let _op = self.op_lock.lock().await;
        match action {
            PowerAction::TurnOn => {
                self.ensure_switch_state(STATE_ON, "Manual turn-on").await;
                self.send_notification("Timer started").await;
            }
            PowerAction::TurnOff => {
                let usage = self.usage_text();
                self.ensure_switch_state(STATE_OFF, "Manual turn-off").await;
                self.send_notification(&format!("Timer was turned off - daily usage {}", usage))
                    .await;
            }
        }
    }

    pub async fn test_notification(&self, message: Option<&str>) {
        let message = message.unwrap_or(DEFAULT_TEST_MESSAGE);
        info!("[{}] Sending test notification: {}", self.entry_id, message);
        self.send_notification(message).await;
    }

    /// Point the sensor at a different switch entity
    pub async fn update_switch_entity(self: &Arc<Self>, entity_id: &str) -> EngineResult<()> {
        let entity_id = entity_id.trim();
        if entity_id.is_empty() {
            return Err(EngineError::InvalidRequest("entity_id is required".to_string()));
        }
        let _op = self.op_lock.lock().await;
        self.apply_switch_entity(Some(entity_id.to_string())).await;
        self.persist().await;
        Ok(())
    }

    async fn apply_switch_entity(self: &Arc<Self>, entity_id: Option<String>) {
        info!("[{}] Updating switch entity to {:?}", self.entry_id, entity_id);
        let changed = {
            let mut inner = self.inner();
            let changed = inner.config.switch_entity_id != entity_id;
            inner.config.switch_entity_id = entity_id;
            changed
        };
        if changed {
            self.bind_switch_listener().await;
        }

        let now = self.clock.now();
        if self.switch_is_on() {
            self.inner().last_on.get_or_insert(now);
            self.start_accumulation(now);
        } else {
            self.stop_accumulation(Settle::Freeze(now)).await;
        }
    }

    /// Apply an edited entry configuration
    pub async fn update_config(self: &Arc<Self>, config: EntryConfig) -> EngineResult<()> {
        if config.entry_id != self.entry_id {
            return Err(EngineError::InvalidRequest(format!(
                "entry_id '{}' does not match '{}'",
                config.entry_id, self.entry_id
            )));
        }

        let _op = self.op_lock.lock().await;
        info!("[{}] Config entry updated", self.entry_id);

        let now = self.clock.now();
        let new_switch = config.switch_entity_id.clone();
        let (switch_changed, reset_changed) = {
            let mut inner = self.inner();
            let switch_changed = inner.config.switch_entity_id != new_switch;

            let mut schedule = ResetSchedule::from_config(&config.reset_time, &self.entry_id);
            let reset_changed = schedule.time() != inner.schedule.time();
            if reset_changed {
                info!(
                    "[{}] Reset time updated from {} to {}",
                    self.entry_id,
                    inner.schedule.time_label(),
                    schedule.time_label()
                );
                schedule.advance(now, self.clock.offset());
                inner.schedule = schedule;
            }

            let current_switch = inner.config.switch_entity_id.clone();
            inner.config = EntryConfig {
                switch_entity_id: current_switch,
                ..config
            };
            inner.alarm_override = None;
            (switch_changed, reset_changed)
        };

        if switch_changed {
            self.apply_switch_entity(new_switch).await;
        }
        if reset_changed {
            self.restart_daily_reset().await;
        }
        self.persist().await;
        Ok(())
    }

    pub async fn set_alarm_enabled(&self, enabled: bool) {
        let _op = self.op_lock.lock().await;
        info!("[{}] Alarm notifications {}", self.entry_id, if enabled { "enabled" } else { "disabled" });
        {
            let mut inner = self.inner();
            inner.config.alarm_enabled = enabled;
            inner.alarm_override = Some(enabled);
        }
        self.persist().await;
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use chrono::{TimeZone, Utc};

    async fn run_for(f: &Fixture, seconds: u64) {
        f.switch_to("on").await;
        advance(Duration::from_secs(seconds)).await;
        f.switch_to("off").await;
    }

    #[test]
    fn power_actions_parse() {
        assert_eq!("turn_on".parse::<PowerAction>().unwrap(), PowerAction::TurnOn);
        assert_eq!("turn_off".parse::<PowerAction>().unwrap(), PowerAction::TurnOff);
        assert!("toggle".parse::<PowerAction>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_snaps_to_exact_duration() {
        let f = Fixture::start("off").await;
        f.switch_to("on").await;
        advance(Duration::from_millis(5500)).await;
        assert_eq!(f.runtime(), 5);

        f.sensor
            .start_timer(20.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();
        assert_eq!(f.sensor.snapshot().timer_state, "active");

        advance(Duration::from_secs(20 * 60 + 2)).await;

        assert_eq!(f.runtime(), 1205);
        assert_eq!(f.switch_state(), "off");
        let snapshot = f.sensor.snapshot();
        assert_eq!(snapshot.timer_state, "idle");
        assert!(snapshot.timer_finishes_at.is_none());
        assert_eq!(
            f.messages(),
            vec![
                "Timer was started for 20 min",
                "Timer was turned off - daily usage 00:20:05 (hh:mm:ss)",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_switches_device_on() {
        let f = Fixture::start("off").await;

        f.sensor
            .start_timer(1.5, DurationUnit::Hours, false, StartMethod::Slider)
            .await
            .unwrap();
        settle().await;

        assert_eq!(f.switch_state(), "on");
        let snapshot = f.sensor.snapshot();
        assert_eq!(snapshot.timer_duration, 90.0);
        assert_eq!(snapshot.timer_start_method, Some(StartMethod::Slider));
        assert!(snapshot.last_on_timestamp.is_some());
        assert!(f.sensor.subscribe_timer().borrow().active);

        advance(Duration::from_secs(60)).await;
        assert_eq!(f.runtime(), 60);
        assert_eq!(f.messages(), vec!["Timer was started for 1.5 hr"]);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_duration_is_rejected() {
        let f = Fixture::start("off").await;
        let result = f
            .sensor
            .start_timer(0.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
        assert_eq!(f.sensor.snapshot().timer_state, "idle");
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_duration_leaves_everything_untouched() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(20.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();
        let before = f.sensor.snapshot().timer_finishes_at;

        let result = f
            .sensor
            .start_timer(1e15, DurationUnit::Days, true, StartMethod::Button)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
        let result = f
            .sensor
            .start_timer(f64::MAX, DurationUnit::Seconds, false, StartMethod::Button)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));

        settle().await;
        let snapshot = f.sensor.snapshot();
        assert_eq!(snapshot.timer_state, "active");
        assert_eq!(snapshot.timer_finishes_at, before);
        assert!(!snapshot.reverse_mode);
        assert_eq!(f.switch_state(), "on");
        assert_eq!(f.messages(), vec!["Timer was started for 20 min"]);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_off_during_timer_rounds_at_the_switch_change() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(20.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();

        advance(Duration::from_millis(95_600)).await;
        // The switch goes off while the operation lock is held for the
        // settle delay; the poll loop sees it first
        f.sensor.manual_power_toggle(PowerAction::TurnOff).await;
        settle().await;

        assert_eq!(f.switch_state(), "off");
        assert_eq!(f.runtime(), 96);
        assert_eq!(f.sensor.snapshot().timer_state, "idle");

        advance(Duration::from_secs(30)).await;
        assert_eq!(f.runtime(), 96);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_rounds_elapsed_time() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(20.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();

        advance(Duration::from_millis(95_600)).await;
        f.sensor.cancel_timer().await.unwrap();
        settle().await;

        assert_eq!(f.runtime(), 96);
        assert_eq!(f.switch_state(), "off");
        assert_eq!(f.sensor.snapshot().timer_state, "idle");
        assert!(!f.sensor.subscribe_timer().borrow().active);
        assert_eq!(
            f.messages().last().map(String::as_str),
            Some("Timer finished – daily usage 00:01:36 (hh:mm:ss)")
        );

        // Nothing left to cancel
        f.sensor.cancel_timer().await.unwrap();
        advance(Duration::from_secs(30)).await;
        assert_eq!(f.runtime(), 96);
    }

    #[tokio::test(start_paused = true)]
    async fn external_off_cancels_normal_timer() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(20.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();

        advance(Duration::from_millis(95_600)).await;
        f.switch_to("off").await;

        assert_eq!(f.runtime(), 96);
        assert_eq!(f.sensor.snapshot().timer_state, "idle");

        // No completion follows
        advance(Duration::from_secs(20 * 60)).await;
        assert_eq!(f.runtime(), 96);
        assert_eq!(f.messages(), vec!["Timer was started for 20 min"]);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_while_active_builds_on_elapsed_time() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(20.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();
        advance(Duration::from_secs(30)).await;

        f.sensor
            .start_timer(5.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();
        assert_eq!(f.runtime(), 30);

        advance(Duration::from_secs(5 * 60 + 2)).await;
        assert_eq!(f.runtime(), 330);
        assert_eq!(f.switch_state(), "off");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_timer_counts_only_post_reset_part() {
        let f = Fixture::start("off").await;
        run_for(&f, 300).await;
        assert_eq!(f.runtime(), 300);

        f.sensor
            .start_timer(20.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();
        advance(Duration::from_secs(600)).await;
        assert_eq!(f.runtime(), 900);

        f.sensor.reset_daily_usage().await;
        assert_eq!(f.runtime(), 0);
        advance(Duration::from_secs(30)).await;
        assert_eq!(f.runtime(), 30);

        advance(Duration::from_secs(572)).await;
        assert_eq!(f.runtime(), 600);
        assert_eq!(f.messages()[1], "Daily usage reset from 00:15:00 (hh:mm:ss) to 00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_at_timer_start_yields_full_duration() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(2.0, DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();
        f.sensor.reset_daily_usage().await;

        advance(Duration::from_secs(122)).await;
        assert_eq!(f.runtime(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn reverse_timer_turns_device_on_at_end() {
        let f = Fixture::start("off").await;
        run_for(&f, 10).await;
        f.switch_to("on").await;

        f.sensor
            .start_timer(1.0, DurationUnit::Minutes, true, StartMethod::Button)
            .await
            .unwrap();
        settle().await;
        assert_eq!(f.switch_state(), "off");
        let snapshot = f.sensor.snapshot();
        assert!(snapshot.reverse_mode);
        assert!(snapshot.last_on_timestamp.is_none());

        advance(Duration::from_secs(30)).await;
        assert_eq!(f.runtime(), 10);
        assert_eq!(f.sensor.snapshot().timer_state, "active");

        advance(Duration::from_secs(30)).await;
        assert_eq!(f.switch_state(), "on");
        assert_eq!(f.sensor.snapshot().timer_state, "idle");

        advance(Duration::from_secs(30)).await;
        assert_eq!(f.runtime(), 40);
        assert_eq!(
            f.messages(),
            vec![
                "Delayed timer started for 1 min",
                "Delayed start timer completed - device turned ON",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn manual_use_during_reverse_countdown_is_counted() {
        let f = Fixture::start("off").await;
        f.sensor
            .start_timer(10.0, DurationUnit::Minutes, true, StartMethod::Button)
            .await
            .unwrap();

        advance(Duration::from_secs(60)).await;
        run_for(&f, 5).await;

        assert_eq!(f.runtime(), 5);
        assert_eq!(f.sensor.snapshot().timer_state, "active");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_reverse_timer_keeps_device_off() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(10.0, DurationUnit::Seconds, true, StartMethod::Button)
            .await
            .unwrap();
        settle().await;
        f.sensor.cancel_timer().await.unwrap();

        advance(Duration::from_secs(20)).await;
        assert_eq!(f.switch_state(), "off");
        assert_eq!(f.runtime(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_reset_fires_at_reset_time() {
        let dir = std::sync::Arc::new(tempfile::tempdir().unwrap());
        let base = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 0).unwrap();
        let f = Fixture::start_at(dir, base, "on", entry()).await;
        f.switch_to("off").await;
        f.switch_to("on").await;

        advance(Duration::from_secs(30)).await;
        assert_eq!(f.runtime(), 30);

        advance(Duration::from_secs(31)).await;
        assert_eq!(f.runtime(), 1);
        assert_eq!(
            f.sensor.snapshot().next_reset_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap())
        );
    }
}
