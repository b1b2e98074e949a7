//! Countdown completion and remaining-time update tasks

use std::{sync::Arc, time::Duration};
use chrono::{DateTime, Utc};
use tokio::{sync::watch, time::sleep};
use tracing::{debug, info};

use crate::{sensor::RuntimeSensor, services::clock::sleep_until};

/// Ticks published at the slow rate before switching to one per second
const SLOW_TICKS: u32 = 12;
const SLOW_PERIOD: Duration = Duration::from_secs(5);
const FAST_PERIOD: Duration = Duration::from_secs(1);

/// Sleep until the countdown's finish instant, then complete it
pub async fn timer_completion_task(
    sensor: Arc<RuntimeSensor>,
    finishes_at: DateTime<Utc>,
    mut shutdown: watch::Receiver<bool>,
) {
    let clock = sensor.clock();
    tokio::select! {
        _ = sleep_until(clock.as_ref(), finishes_at) => {
            info!("[{}] Timer finished", sensor.entry_id());
            sensor.finish_timer().await;
        }
        _ = shutdown.changed() => {}
    }
}

/// Publish the remaining countdown seconds while a timer is active
pub async fn timer_update_task(sensor: Arc<RuntimeSensor>, mut shutdown: watch::Receiver<bool>) {
    let mut iteration: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        iteration += 1;
        let Some(remaining) = sensor.publish_timer_status() else {
            break;
        };
        if remaining == 0 {
            break;
        }

        let period = if iteration <= SLOW_TICKS { SLOW_PERIOD } else { FAST_PERIOD };
        tokio::select! {
            _ = sleep(period) => {}
            _ = shutdown.changed() => break,
        }
    }

    debug!("[{}] Timer update loop exited after {} ticks", sensor.entry_id(), iteration);
}
