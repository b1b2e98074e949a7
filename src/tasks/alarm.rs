//! Alarm card listener and held-open timer tasks

use std::{sync::Arc, time::Duration};
use tokio::sync::{broadcast, broadcast::error::RecvError, watch};
use tracing::{debug, info, warn};

use crate::{alarm::AlarmConfigManager, services::StateChange};

/// Forward state changes of one target entity to the alarm manager
pub async fn alarm_listener_task(
    manager: Arc<AlarmConfigManager>,
    config_id: String,
    target: String,
    mut changes: broadcast::Receiver<StateChange>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("[{}] Alarm listener started for {}", config_id, target);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            received = changes.recv() => match received {
                Ok(change) if change.entity_id == target => {
                    manager
                        .process_state_change(&config_id, change.old_state, change.new_state)
                        .await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[{}] Alarm listener lagged, {} state changes skipped", config_id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    info!("[{}] Alarm listener stopped", config_id);
}

/// Wait out the held-open delay, then let the manager re-check the target
pub async fn held_open_task(
    manager: Arc<AlarmConfigManager>,
    config_id: String,
    delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {
            debug!("[{}] Held-open delay of {:?} elapsed", config_id, delay);
            manager.fire_if_still_open(&config_id).await;
        }
        _ = shutdown.changed() => {}
    }
}
