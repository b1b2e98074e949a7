//! Monitored switch listener task

use std::sync::Arc;
use tokio::sync::{broadcast, broadcast::error::RecvError, watch};
use tracing::{info, warn};

use crate::{sensor::RuntimeSensor, services::StateChange};

/// Deliver transitions of the monitored switch to its runtime sensor
pub async fn switch_listener_task(
    sensor: Arc<RuntimeSensor>,
    entity_id: String,
    mut changes: broadcast::Receiver<StateChange>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("[{}] Setting up switch listener for: {}", sensor.entry_id(), entity_id);
    sensor.resync_switch().await;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            received = changes.recv() => match received {
                Ok(change) if change.entity_id == entity_id => sensor.handle_switch_change(change).await,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[{}] Switch listener lagged, {} state changes skipped", sensor.entry_id(), skipped);
                    sensor.resync_switch().await;
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}
