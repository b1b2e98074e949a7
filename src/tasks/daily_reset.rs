//! Scheduled daily reset task

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::{sensor::RuntimeSensor, services::clock::sleep_until};

/// Reset the counter every day at the configured time-of-day
pub async fn daily_reset_task(sensor: Arc<RuntimeSensor>, mut shutdown: watch::Receiver<bool>) {
    info!(
        "[{}] Scheduling daily reset at {}",
        sensor.entry_id(),
        sensor.reset_time_label()
    );
    let clock = sensor.clock();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = sensor.next_reset();
        tokio::select! {
            _ = sleep_until(clock.as_ref(), next) => sensor.scheduled_reset().await,
            _ = shutdown.changed() => break,
        }
    }
}
