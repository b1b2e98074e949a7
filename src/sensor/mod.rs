//! Per-entry runtime sensor
//!
//! A [`RuntimeSensor`] owns the cumulative "on" counter of one monitored
//! switch together with its countdown timer and daily reset schedule. Every
//! mutating operation runs under the sensor's operation lock, so switch
//! events, service calls and scheduled callbacks never interleave on the same
//! counter.

mod record;
mod restore;
mod timer;

pub use record::SensorRecord;
pub use timer::PowerAction;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    config::EntryConfig,
    error::HostError,
    services::{host::STATE_ON, notify, Clock, EntityHost, EntityState, JsonStore, StateChange},
    state::{ResetSchedule, RuntimeAccumulator, StartMethod, TimerPhase, TimerStatus},
    tasks::{accumulation_task, daily_reset_task, switch_listener_task, timer_completion_task, timer_update_task},
};

pub const WATCHDOG_MESSAGE: &str =
    "Warning: Home assistant was offline during a running timer! Usage time may be unsynchronized.";

/// How long a switch command is given before its result is verified
const SWITCH_SETTLE: Duration = Duration::from_secs(1);

/// The timer-mode poll loop hands over to completion this close to the end
const TIMER_END_MARGIN_MS: i64 = 200;

/// Outcome of one accumulation poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationTick {
    Continue,
    Stop,
}

/// How to settle the counter when accumulation stops
#[derive(Debug, Clone, Copy)]
enum Settle {
    /// Keep the last observed value
    Halt,
    /// Final whole-second observation at the given instant
    Freeze(DateTime<Utc>),
    /// Countdown cut short: counter becomes start value plus rounded elapsed
    CancelTimer(DateTime<Utc>),
}

/// Operator-facing view of a sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub entry_id: String,
    pub runtime_seconds: i64,
    pub timer_state: &'static str,
    pub timer_finishes_at: Option<DateTime<Utc>>,
    pub timer_duration: f64,
    pub timer_remaining: i64,
    pub watchdog_message: Option<String>,
    pub switch_entity_id: Option<String>,
    pub last_on_timestamp: Option<DateTime<Utc>>,
    pub instance_title: String,
    pub next_reset_date: Option<DateTime<Utc>>,
    pub reset_time: String,
    pub timer_start_method: Option<StartMethod>,
    pub show_seconds: bool,
    pub reverse_mode: bool,
    pub alarm_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reset_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_info: Option<String>,
}

struct SensorInner {
    config: EntryConfig,
    runtime: RuntimeAccumulator,
    phase: TimerPhase,
    last_on: Option<DateTime<Utc>>,
    watchdog: Option<String>,
    schedule: ResetSchedule,
    /// Pending catch-up notice, shown by the next snapshot only
    catch_up_info: Option<String>,
    /// Alarm-enabled value set through the service, persisted across restarts
    alarm_override: Option<bool>,
}

#[derive(Default)]
struct SensorTasks {
    accumulation: Option<JoinHandle<()>>,
    timer_update: Option<JoinHandle<()>>,
    completion: Option<JoinHandle<()>>,
    switch_listener: Option<JoinHandle<()>>,
    daily_reset: Option<JoinHandle<()>>,
}

impl SensorTasks {
    fn drain(&mut self) -> Vec<JoinHandle<()>> {
        [
            self.accumulation.take(),
            self.timer_update.take(),
            self.completion.take(),
            self.switch_listener.take(),
            self.daily_reset.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

async fn settle_task(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        handle.abort();
        let _ = handle.await;
    }
}

pub struct RuntimeSensor {
    entry_id: String,
    host: Arc<dyn EntityHost>,
    clock: Arc<dyn Clock>,
    store: JsonStore,
    shutdown: watch::Receiver<bool>,
    inner: Mutex<SensorInner>,
    tasks: Mutex<SensorTasks>,
    op_lock: tokio::sync::Mutex<()>,
    runtime_tx: watch::Sender<i64>,
    timer_tx: watch::Sender<TimerStatus>,
}

impl RuntimeSensor {
    pub fn new(
        config: EntryConfig,
        host: Arc<dyn EntityHost>,
        clock: Arc<dyn Clock>,
        store_dir: &Path,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let entry_id = config.entry_id.clone();
        let schedule = ResetSchedule::from_config(&config.reset_time, &entry_id);
        let store = JsonStore::new(store_dir, record::store_key(&entry_id), record::STORE_VERSION)
            .with_migration(record::migrate);
        let (runtime_tx, _) = watch::channel(0);
        let (timer_tx, _) = watch::channel(TimerStatus::inactive());

        Self {
            entry_id,
            host,
            clock,
            store,
            shutdown,
            inner: Mutex::new(SensorInner {
                config,
                runtime: RuntimeAccumulator::new(0),
                phase: TimerPhase::Idle,
                last_on: None,
                watchdog: None,
                schedule,
                catch_up_info: None,
                alarm_override: None,
            }),
            tasks: Mutex::new(SensorTasks::default()),
            op_lock: tokio::sync::Mutex::new(()),
            runtime_tx,
            timer_tx,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn config(&self) -> EntryConfig {
        self.inner().config.clone()
    }

    pub fn runtime_seconds(&self) -> i64 {
        self.inner().runtime.value()
    }

    pub fn subscribe_runtime(&self) -> watch::Receiver<i64> {
        self.runtime_tx.subscribe()
    }

    pub fn subscribe_timer(&self) -> watch::Receiver<TimerStatus> {
        self.timer_tx.subscribe()
    }

    pub fn reset_time_label(&self) -> String {
        self.inner().schedule.time_label()
    }

    /// Instant of the next scheduled reset
    pub fn next_reset(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let inner = self.inner();
        inner
            .schedule
            .next_reset()
            .unwrap_or_else(|| inner.schedule.next_after(now, self.clock.offset()))
    }

    /// Current view; a pending catch-up notice is reported once
    pub fn snapshot(&self) -> SensorSnapshot {
        let now = self.clock.now();
        let mut inner = self.inner();
        let catch_up = inner.catch_up_info.take();
        let timer = inner.phase.timer();

        SensorSnapshot {
            entry_id: self.entry_id.clone(),
            runtime_seconds: inner.runtime.value(),
            timer_state: inner.phase.label(),
            timer_finishes_at: timer.map(|t| t.finishes_at),
            timer_duration: timer.map(|t| t.duration_minutes).unwrap_or(0.0),
            timer_remaining: match &inner.phase {
                TimerPhase::Active(t) => t.remaining_seconds(now),
                _ => 0,
            },
            watchdog_message: inner.watchdog.clone(),
            switch_entity_id: inner.config.switch_entity_id.clone(),
            last_on_timestamp: inner.last_on,
            instance_title: inner.config.instance_title().to_string(),
            next_reset_date: inner.schedule.next_reset(),
            reset_time: inner.schedule.time_label(),
            timer_start_method: timer.map(|t| t.start_method),
            show_seconds: inner.config.show_seconds,
            reverse_mode: timer.map(|t| t.reverse).unwrap_or(false),
            alarm_enabled: inner.config.alarm_enabled,
            last_reset_type: catch_up.as_ref().map(|_| "catch-up"),
            reset_info: catch_up,
        }
    }

    fn inner(&self) -> MutexGuard<'_, SensorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, SensorTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn switch_entity_id(&self) -> Option<String> {
        self.inner().config.switch_entity().map(str::to_string)
    }

    fn switch_state(&self) -> Option<EntityState> {
        let entity_id = self.switch_entity_id()?;
        self.host.state(&entity_id)
    }

    fn switch_is_on(&self) -> bool {
        self.switch_state().map(|s| s.is_on()).unwrap_or(false)
    }

    fn publish_runtime(&self, value: i64) {
        self.runtime_tx.send_replace(value);
    }

    /// Formatted usage plus unit label, e.g. `01:20 (hh:mm)`
    fn usage_text(&self) -> String {
        let inner = self.inner();
        let (formatted, label) = notify::format_usage(inner.runtime.value(), inner.config.show_seconds);
        format!("{} {}", formatted, label)
    }

    // Accumulation

    /// Begin counting unless already counting.
    ///
    /// A normal countdown anchors to its own start and base. Otherwise
    /// (no countdown, or a reverse one) counting anchors to `anchor` on top
    /// of the current value.
    fn start_accumulation(self: &Arc<Self>, anchor: DateTime<Utc>) {
        if self.is_shutting_down() {
            return;
        }

        {
            let mut inner = self.inner();
            if !inner.runtime.is_running() {
                match inner.phase.timer().filter(|t| !t.reverse) {
                    Some(timer) => {
                        let (started_at, base) = (timer.started_at, timer.runtime_at_start);
                        inner.runtime.start(started_at, base);
                    }
                    None => {
                        let base = inner.runtime.value();
                        inner.runtime.start(anchor, base);
                    }
                }
            }
        }

        let mut tasks = self.tasks();
        let running = tasks
            .accumulation
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false);
        if !running {
            tasks.accumulation = Some(tokio::spawn(accumulation_task(
                Arc::clone(self),
                self.shutdown.clone(),
            )));
        }
    }

    /// Cancel the poll loop, wait for it, then settle the counter
    async fn stop_accumulation(&self, settle: Settle) {
        let handle = self.tasks().accumulation.take();
        settle_task(handle).await;

        let mut inner = self.inner();
        if !inner.runtime.is_running() {
            return;
        }
        let value = match settle {
            Settle::Halt => {
                inner.runtime.halt();
                return;
            }
            Settle::Freeze(at) => inner.runtime.freeze(at),
            Settle::CancelTimer(at) => match inner.phase.timer().filter(|t| !t.reverse) {
                Some(timer) => {
                    let value = timer.cancelled_runtime(at);
                    inner.runtime.set(value);
                    value
                }
                None => inner.runtime.freeze(at),
            },
        };
        self.publish_runtime(value);
    }

    /// One poll of the accumulation loop
    pub fn accumulation_tick(&self) -> AccumulationTick {
        let now = self.clock.now();
        let reading = self.switch_state();

        let mut inner = self.inner();
        if !inner.runtime.is_running() {
            return AccumulationTick::Stop;
        }
        match reading {
            Some(state) if state.is_on() || state.is_indeterminate() => {}
            // The change is on its way to the switch listener, which settles
            // the run at the instant of the change
            Some(_) => return AccumulationTick::Stop,
            None => {
                let value = inner.runtime.freeze(now);
                self.publish_runtime(value);
                return AccumulationTick::Stop;
            }
        }

        if let Some(value) = inner.runtime.observe(now) {
            self.publish_runtime(value);
        }

        if let TimerPhase::Active(timer) = &inner.phase {
            if !timer.reverse && (timer.finishes_at - now).num_milliseconds() <= TIMER_END_MARGIN_MS {
                return AccumulationTick::Stop;
            }
        }
        AccumulationTick::Continue
    }

    // Timer tasks

    fn spawn_timer_tasks(self: &Arc<Self>, finishes_at: DateTime<Utc>) {
        let mut tasks = self.tasks();
        tasks.timer_update = Some(tokio::spawn(timer_update_task(
            Arc::clone(self),
            self.shutdown.clone(),
        )));
        tasks.completion = Some(tokio::spawn(timer_completion_task(
            Arc::clone(self),
            finishes_at,
            self.shutdown.clone(),
        )));
    }

    async fn stop_timer_tasks(&self) {
        let (update, completion) = {
            let mut tasks = self.tasks();
            (tasks.timer_update.take(), tasks.completion.take())
        };
        settle_task(update).await;
        settle_task(completion).await;
        self.timer_tx.send_replace(TimerStatus::inactive());
    }

    /// Publish the remaining seconds; `None` once no timer is active
    pub fn publish_timer_status(&self) -> Option<u64> {
        let now = self.clock.now();
        let inner = self.inner();
        let TimerPhase::Active(timer) = &inner.phase else {
            return None;
        };
        let remaining = timer.remaining_seconds(now).max(0) as u64;
        self.timer_tx.send_replace(TimerStatus::active(remaining));
        Some(remaining)
    }

    // Listeners and schedules

    async fn bind_switch_listener(self: &Arc<Self>) {
        let previous = self.tasks().switch_listener.take();
        settle_task(previous).await;

        let entity_id = self.switch_entity_id();
        let Some(entity_id) = entity_id else {
            warn!("[{}] No switch entity configured", self.entry_id);
            return;
        };

        let changes = self.host.subscribe();
        let handle = tokio::spawn(switch_listener_task(
            Arc::clone(self),
            entity_id,
            changes,
            self.shutdown.clone(),
        ));
        self.tasks().switch_listener = Some(handle);
    }

    async fn restart_daily_reset(self: &Arc<Self>) {
        let previous = self.tasks().daily_reset.take();
        settle_task(previous).await;

        let handle = tokio::spawn(daily_reset_task(Arc::clone(self), self.shutdown.clone()));
        self.tasks().daily_reset = Some(handle);
    }

    /// React to a transition of the monitored switch
    pub async fn handle_switch_change(self: &Arc<Self>, change: StateChange) {
        if self.is_shutting_down() {
            return;
        }
        let Some(new_state) = change.new_state else {
            return;
        };

        let _op = self.op_lock.lock().await;
        let at = new_state.last_updated;

        if new_state.is_on() {
            let was_on = change.old_state.as_ref().map(|s| s.is_on()).unwrap_or(false);
            if was_on {
                return;
            }
            {
                let mut inner = self.inner();
                inner.watchdog = None;
                inner.last_on = Some(at);
            }
            self.start_accumulation(at);
            return;
        }

        if new_state.is_indeterminate() {
            debug!("[{}] Switch reported {}, still counting", self.entry_id, new_state.state);
            return;
        }

        if !new_state.is_off() {
            // Any other reading stops counting but leaves the timer alone
            self.stop_accumulation(Settle::Freeze(at)).await;
            self.persist().await;
            return;
        }

        let auto_cancel = matches!(&self.inner().phase, TimerPhase::Active(t) if !t.reverse);
        if auto_cancel {
            info!("[{}] Auto-cancelling timer due to external switch off", self.entry_id);
            self.stop_accumulation(Settle::CancelTimer(at)).await;
            {
                let mut inner = self.inner();
                inner.phase = TimerPhase::Idle;
                inner.watchdog = None;
            }
            self.stop_timer_tasks().await;
        } else {
            self.stop_accumulation(Settle::Freeze(at)).await;
        }
        self.inner().last_on = None;
        self.persist().await;
    }

    /// Settle an open run whose stopping change the listener never saw:
    /// changes made before it subscribed, or skipped after a lag
    pub async fn resync_switch(self: &Arc<Self>) {
        let Some(current) = self.switch_state() else {
            return;
        };
        let running = self.inner().runtime.is_running();
        if !running || current.is_on() || current.is_indeterminate() {
            return;
        }
        self.handle_switch_change(StateChange {
            entity_id: current.entity_id.clone(),
            old_state: None,
            new_state: Some(current),
        })
        .await;
    }

    // Host side effects

    async fn switch_service(&self, service: &str) -> Result<(), HostError> {
        let Some(entity_id) = self.switch_entity_id() else {
            return Ok(());
        };
        self.host
            .call_service("homeassistant", service, json!({ "entity_id": entity_id }), true)
            .await
    }

    /// Drive the switch to `desired`, verify after a settle delay and warn
    /// the operator when it did not follow
    async fn ensure_switch_state(&self, desired: &str, description: &str) {
        let Some(entity_id) = self.switch_entity_id() else {
            return;
        };
        let Some(current) = self.host.state(&entity_id) else {
            return;
        };
        if current.state == desired {
            return;
        }

        let service = if desired == STATE_ON { "turn_on" } else { "turn_off" };
        if let Err(e) = self.switch_service(service).await {
            let message = format!("Warning: {} - failed to set switch to '{}': {}", description, desired, e);
            warn!("[{}] {}", self.entry_id, message);
            self.send_notification(&message).await;
            return;
        }

        sleep(SWITCH_SETTLE).await;

        if let Some(updated) = self.host.state(&entity_id) {
            if updated.state != desired {
                let message = format!(
                    "Warning: {} - switch should be '{}' but remains '{}'. Check switch connectivity.",
                    description, desired, updated.state
                );
                warn!("[{}] {}", self.entry_id, message);
                self.send_notification(&message).await;
            }
        }
    }

    /// Send an operator notification to the entry's targets
    async fn send_notification(&self, message: &str) {
        let (enabled, targets, title) = {
            let inner = self.inner();
            (
                inner.config.alarm_enabled,
                inner.config.notification_entities.clone(),
                inner.config.instance_title().to_string(),
            )
        };

        if !enabled {
            debug!("[{}] Alarm disabled - staying silent", self.entry_id);
            return;
        }
        if targets.is_empty() {
            debug!("[{}] No notification entities configured - staying silent", self.entry_id);
            return;
        }

        notify::dispatch(self.host.as_ref(), &targets, message, &title, &self.entry_id).await;
    }

    async fn persist(&self) {
        let record = {
            let inner = self.inner();
            let mut record = SensorRecord {
                next_reset_date: inner.schedule.next_reset(),
                runtime_seconds: inner.runtime.value(),
                last_on_timestamp: inner.last_on,
                alarm_enabled: inner.alarm_override,
                last_updated: Some(self.clock.now()),
                ..SensorRecord::default()
            };
            record.set_timer(inner.phase.timer());
            record
        };

        if let Err(e) = self.store.save(&record).await {
            error!("[{}] Failed to persist sensor state: {}", self.entry_id, e);
        }
    }

    /// Stop every loop and persist the counter
    pub async fn shutdown(&self) {
        info!("[{}] Shutdown - cancelling tasks", self.entry_id);
        let handles = self.tasks().drain();
        for handle in handles {
            settle_task(Some(handle)).await;
        }

        {
            let now = self.clock.now();
            let mut inner = self.inner();
            if let Some(value) = inner.runtime.observe(now) {
                self.publish_runtime(value);
            }
        }
        self.persist().await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn on_intervals_sum_with_floor_at_each_stop() {
        let f = Fixture::start("off").await;

        f.switch_to("on").await;
        advance(Duration::from_millis(2700)).await;
        f.switch_to("off").await;
        assert_eq!(f.runtime(), 2);

        advance(Duration::from_secs(10)).await;
        assert_eq!(f.runtime(), 2);

        f.switch_to("on").await;
        advance(Duration::from_millis(3600)).await;
        f.switch_to("off").await;
        assert_eq!(f.runtime(), 5);
        assert!(f.sensor.snapshot().last_on_timestamp.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn live_counter_updates_while_on() {
        let f = Fixture::start("off").await;
        let mut updates = f.sensor.subscribe_runtime();

        f.switch_to("on").await;
        advance(Duration::from_millis(3020)).await;
        assert_eq!(f.runtime(), 3);
        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn indeterminate_states_keep_counting() {
        let f = Fixture::start("off").await;

        f.switch_to("on").await;
        advance(Duration::from_secs(5)).await;
        f.switch_to("unavailable").await;
        advance(Duration::from_secs(5)).await;
        assert_eq!(f.runtime(), 10);

        f.switch_to("on").await;
        advance(Duration::from_secs(5)).await;
        f.switch_to("off").await;
        assert_eq!(f.runtime(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn other_states_stop_counting_without_cancelling_timer() {
        let f = Fixture::start("on").await;
        f.sensor
            .start_timer(10.0, crate::state::DurationUnit::Minutes, false, StartMethod::Button)
            .await
            .unwrap();

        advance(Duration::from_secs(5)).await;
        f.switch_to("standby").await;
        assert_eq!(f.runtime(), 5);
        advance(Duration::from_secs(5)).await;
        assert_eq!(f.runtime(), 5);
        assert_eq!(f.sensor.snapshot().timer_state, "active");
    }

    #[tokio::test(start_paused = true)]
    async fn turning_on_clears_watchdog() {
        let f = Fixture::start("off").await;
        f.sensor.inner().watchdog = Some(WATCHDOG_MESSAGE.to_string());

        f.switch_to("on").await;
        assert!(f.sensor.snapshot().watchdog_message.is_none());
        assert!(f.sensor.snapshot().last_on_timestamp.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_switch_triggers_warning() {
        let f = Fixture::start("off").await;
        f.host.set_unresponsive(SWITCH, true);

        f.sensor.manual_power_toggle(PowerAction::TurnOn).await;

        assert_eq!(
            f.messages(),
            vec![
                "Warning: Manual turn-on - switch should be 'on' but remains 'off'. Check switch connectivity.",
                "Timer started",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failing_switch_call_is_reported() {
        let f = Fixture::start("on").await;
        f.host.fail_domain("homeassistant");

        f.sensor.manual_power_toggle(PowerAction::TurnOff).await;

        let messages = f.messages();
        assert!(messages[0].starts_with("Warning: Manual turn-off - failed to set switch to 'off'"));
        assert!(messages[1].starts_with("Timer was turned off - daily usage 00:00:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_alarm_silences_notifications() {
        let f = Fixture::start("off").await;
        f.sensor.test_notification(None).await;
        assert_eq!(f.messages(), vec!["Test notification"]);

        f.sensor.set_alarm_enabled(false).await;
        f.sensor.test_notification(Some("ping")).await;
        assert_eq!(f.messages().len(), 1);
        assert!(!f.sensor.snapshot().alarm_enabled);

        let title = &f.host.calls_to("notify", "phone")[0].data["title"];
        assert_eq!(title, "Boiler");
    }

    #[tokio::test(start_paused = true)]
    async fn switch_entity_can_be_rebound() {
        let f = Fixture::start("off").await;
        f.host.set_state("switch.pump", "on", serde_json::Map::new());

        f.sensor.update_switch_entity("switch.pump").await.unwrap();
        settle().await;
        advance(Duration::from_secs(4)).await;
        assert_eq!(f.runtime(), 4);

        // The old switch no longer drives the counter
        f.switch_to("on").await;
        f.switch_to("off").await;
        advance(Duration::from_secs(1)).await;
        assert_eq!(f.runtime(), 5);

        f.host.set_state("switch.pump", "off", serde_json::Map::new());
        settle().await;
        advance(Duration::from_secs(3)).await;
        assert_eq!(f.runtime(), 5);
        assert_eq!(f.sensor.snapshot().switch_entity_id.as_deref(), Some("switch.pump"));
    }

    #[tokio::test(start_paused = true)]
    async fn config_update_reschedules_reset() {
        let f = Fixture::start("off").await;
        let before = f.sensor.snapshot().next_reset_date.unwrap();
        assert_eq!(before, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());

        let mut config = entry();
        config.reset_time = "18:30".into();
        config.name = Some("Boiler room".into());
        f.sensor.update_config(config).await.unwrap();

        let snapshot = f.sensor.snapshot();
        assert_eq!(snapshot.reset_time, "18:30:00");
        assert_eq!(snapshot.instance_title, "Boiler room");
        assert_eq!(snapshot.next_reset_date, Some(Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap()));

        let mut foreign = entry();
        foreign.entry_id = "other".into();
        assert!(f.sensor.update_config(foreign).await.is_err());
    }
}
