//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/entries", get(list_entries_handler))
        .route("/entries/:entry_id", get(get_entry_handler).put(put_entry_handler))
        .route("/states/:entity_id", post(post_state_handler))
        // Services
        .route("/services/start_timer", post(start_timer_handler))
        .route("/services/cancel_timer", post(cancel_timer_handler))
        .route("/services/reset_daily_usage", post(reset_daily_usage_handler))
        .route("/services/manual_power_toggle", post(manual_power_toggle_handler))
        .route("/services/test_notification", post(test_notification_handler))
        .route("/services/update_switch_entity", post(update_switch_entity_handler))
        .route("/services/set_alarm_enabled", post(set_alarm_enabled_handler))
        .route("/services/set_card_config", post(set_card_config_handler))
        .route("/services/set_responsible_people", post(set_responsible_people_handler))
        .route("/alarms", get(alarms_handler))
        .route("/alarms/configs", get(configs_handler))
        .route("/responsible", get(responsible_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
