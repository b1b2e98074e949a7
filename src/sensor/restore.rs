//! Startup recovery of a [`RuntimeSensor`]

use std::sync::Arc;
use tracing::{error, info, warn};

use super::{RuntimeSensor, SensorRecord, WATCHDOG_MESSAGE};
use crate::{
    services::host::{STATE_OFF, STATE_ON},
    state::{ActiveTimer, TimerPhase},
};

impl RuntimeSensor {
    /// Restore persisted state and start the listeners.
    ///
    /// Order matters: a countdown that ran out while offline completes
    /// first, then a missed daily reset is caught up (rebasing a countdown
    /// that is still running), and finally a live countdown is resumed.
    pub async fn initialize(self: &Arc<Self>) {
        let _op = self.op_lock.lock().await;
        info!("[{}] Completing initialization", self.entry_id);

        let record = self.load_record().await;
        let now = self.clock.now();
        let restored_timer = record.timer();
        let has_stored_reset = record.next_reset_date.is_some();

        {
            let mut inner = self.inner();
            inner.runtime.set(record.runtime_seconds);
            inner.last_on = record.last_on_timestamp;
            if let Some(enabled) = record.alarm_enabled {
                inner.config.alarm_enabled = enabled;
                inner.alarm_override = Some(enabled);
            }
            match record.next_reset_date {
                Some(next) => inner.schedule.set_next_reset(next),
                None => {
                    let next = inner.schedule.advance(now, self.clock.offset());
                    info!("[{}] First reset scheduled for {}", self.entry_id, next);
                }
            }
        }
        self.publish_runtime(record.runtime_seconds);
        info!("[{}] Restored runtime: {}s", self.entry_id, record.runtime_seconds);

        let mut live_timer = false;
        if let Some(timer) = restored_timer {
            if timer.finishes_at <= now {
                info!(
                    "[{}] Timer expired while offline (finished at {})",
                    self.entry_id, timer.finishes_at
                );
                self.complete_expired_timer(timer).await;
            } else {
                self.inner().phase = TimerPhase::Active(timer);
                live_timer = true;
            }
        }

        if has_stored_reset {
            self.catch_up_missed_reset().await;
        }

        if live_timer {
            self.resume_active_timer().await;
        } else {
            self.resume_manual_accumulation();
        }

        self.persist().await;
        self.bind_switch_listener().await;
        self.restart_daily_reset().await;
        info!("[{}] Initialization completed", self.entry_id);
    }

    async fn load_record(&self) -> SensorRecord {
        match self.store.load::<SensorRecord>().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("[{}] No stored state, starting fresh", self.entry_id);
                SensorRecord::default()
            }
            Err(e) => {
                error!("[{}] Error loading stored state: {}", self.entry_id, e);
                SensorRecord::default()
            }
        }
    }

    /// Apply the end-of-countdown effects of a timer that ran out offline
    async fn complete_expired_timer(self: &Arc<Self>, timer: ActiveTimer) {
        {
            let mut inner = self.inner();
            if !timer.reverse {
                inner.runtime.set(timer.completed_runtime());
            }
            inner.watchdog = Some(WATCHDOG_MESSAGE.to_string());
            inner.phase = TimerPhase::Finishing(timer.clone());
        }
        let value = self.runtime_seconds();
        self.publish_runtime(value);

        if timer.reverse {
            self.inner().phase = TimerPhase::Idle;
            self.switch_on_after_delay("Expired reverse timer completion turn-on")
                .await;
            self.send_notification("Delayed start timer completed - device turned ON")
                .await;
            return;
        }

        info!(
            "[{}] Expired timer completed with runtime {}s (start {}s + duration {}s)",
            self.entry_id,
            value,
            timer.runtime_at_start,
            timer.duration_seconds()
        );
        let usage = self.usage_text();
        self.inner().phase = TimerPhase::Idle;
        self.inner().last_on = None;

        if self.switch_entity_id().is_some() {
            if let Err(e) = self.switch_service("turn_off").await {
                warn!("[{}] Failed to turn off switch for expired timer: {}", self.entry_id, e);
            }
            self.ensure_switch_state(STATE_OFF, "Expired timer turn-off").await;
        }
        self.send_notification(&format!("Timer was turned off - daily usage {}", usage))
            .await;
    }

    async fn catch_up_missed_reset(self: &Arc<Self>) {
        let now = self.clock.now();
        let (expected, missed) = {
            let inner = self.inner();
            (inner.schedule.next_reset(), inner.schedule.missed_resets(now))
        };
        let Some(missed) = missed else {
            return;
        };

        warn!(
            "[{}] Detected missed reset. Expected at {:?}, now {}, missed {}",
            self.entry_id, expected, now, missed
        );
        self.perform_reset("catch-up").await;

        let mut inner = self.inner();
        let next = inner.schedule.advance(now, self.clock.offset());
        inner.catch_up_info = Some(format!("Reset performed on startup (missed {} reset(s))", missed));
        info!("[{}] Next reset scheduled for {}", self.entry_id, next);
    }

    async fn resume_active_timer(self: &Arc<Self>) {
        let timer = self.inner().phase.timer().cloned();
        let Some(timer) = timer else {
            return;
        };
        info!(
            "[{}] Timer still active with {}s remaining",
            self.entry_id,
            timer.remaining_seconds(self.clock.now())
        );

        self.inner().watchdog = Some(WATCHDOG_MESSAGE.to_string());
        self.spawn_timer_tasks(timer.finishes_at);
        self.publish_timer_status();

        if timer.reverse {
            self.ensure_switch_state(STATE_OFF, "Reverse timer state verification on restart")
                .await;
            return;
        }

        self.ensure_switch_state(STATE_ON, "Active timer state verification on restart")
            .await;
        if self.switch_is_on() {
            let now = self.clock.now();
            self.inner().last_on.get_or_insert(now);
            self.start_accumulation(now);
        }
    }

    /// Offline time is not counted: manual accumulation restarts at now
    fn resume_manual_accumulation(self: &Arc<Self>) {
        if !self.switch_is_on() {
            return;
        }
        let now = self.clock.now();
        self.inner().last_on.get_or_insert(now);
        self.start_accumulation(now);
    }
}
