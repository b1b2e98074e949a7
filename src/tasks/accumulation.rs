//! Sub-second runtime accumulation loop

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::sleep};
use tracing::debug;

use crate::sensor::{AccumulationTick, RuntimeSensor};

/// Poll period of the accumulation loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Recompute the live counter until the switch stops counting, the timer is
/// about to complete or the service shuts down
pub async fn accumulation_task(sensor: Arc<RuntimeSensor>, mut shutdown: watch::Receiver<bool>) {
    debug!("[{}] Accumulation started", sensor.entry_id());

    loop {
        if *shutdown.borrow() {
            break;
        }

        if sensor.accumulation_tick() == AccumulationTick::Stop {
            break;
        }

        tokio::select! {
            _ = sleep(POLL_INTERVAL) => {}
            _ = shutdown.changed() => break,
        }
    }

    debug!("[{}] Accumulation loop exited", sensor.entry_id());
}
