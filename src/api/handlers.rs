//! HTTP endpoint handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::responses::*;
use crate::{
    config::EntryConfig,
    error::EngineError,
    sensor::{PowerAction, SensorSnapshot},
    services::EntityState,
    state::{AppState, DurationUnit, StartMethod},
};

/// Map an engine error to the status returned to the caller
fn reject(e: EngineError) -> StatusCode {
    match e {
        EngineError::UnknownEntry(_) => {
            warn!("{}", e);
            StatusCode::NOT_FOUND
        }
        EngineError::InvalidRequest(_) => {
            warn!("Rejected request: {}", e);
            StatusCode::BAD_REQUEST
        }
        other => {
            error!("Request failed: {}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Handle GET /status - Server overview
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let mut active_alarms: Vec<String> = state
        .alarm_states
        .all()
        .into_iter()
        .filter(|(_, firing)| firing.active)
        .map(|(config_id, _)| config_id)
        .collect();
    active_alarms.sort();

    Json(StatusResponse {
        uptime: state.get_uptime(),
        port: state.port,
        host: state.bind_host.clone(),
        entries: state.sensors().iter().map(|s| s.entry_id().to_string()).collect(),
        alarm_configs: state.alarms.configs().len(),
        active_alarms,
    })
}

/// Handle GET /entries
pub async fn list_entries_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SensorSnapshot>> {
    Json(state.sensors().iter().map(|s| s.snapshot()).collect())
}

/// Handle GET /entries/:entry_id
pub async fn get_entry_handler(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<String>,
) -> Result<Json<SensorSnapshot>, StatusCode> {
    let sensor = state.sensor(&entry_id).map_err(reject)?;
    Ok(Json(sensor.snapshot()))
}

/// Handle PUT /entries/:entry_id - Create an entry or replace its configuration
pub async fn put_entry_handler(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<String>,
    Json(config): Json<EntryConfig>,
) -> Result<Json<ApiResponse>, StatusCode> {
    if config.entry_id != entry_id {
        warn!("Entry id mismatch: path {} body {}", entry_id, config.entry_id);
        return Err(StatusCode::BAD_REQUEST);
    }

    let (sensor, created) = state.upsert_entry(config).await.map_err(reject)?;
    let message = if created { "Entry created" } else { "Entry updated" };
    Ok(Json(ApiResponse::ok(message.to_string(), sensor.snapshot())))
}

/// Handle POST /states/:entity_id - Ingest a host entity state
pub async fn post_state_handler(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(request): Json<StateRequest>,
) -> Json<EntityState> {
    Json(state.host.set_state(&entity_id, &request.state, request.attributes))
}

/// Handle POST /services/start_timer
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartTimerRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let sensor = state.sensor(&request.entry_id).map_err(reject)?;
    let unit = match request.unit.as_deref() {
        Some(unit) => unit.parse::<DurationUnit>().map_err(reject)?,
        None => DurationUnit::default(),
    };
    let start_method = match request.start_method.as_deref() {
        Some(method) => method.parse::<StartMethod>().map_err(reject)?,
        None => StartMethod::default(),
    };

    sensor
        .start_timer(request.duration, unit, request.reverse_mode, start_method)
        .await
        .map_err(reject)?;
    info!("[{}] Timer started via API", request.entry_id);
    Ok(Json(ApiResponse::ok("Timer started".to_string(), sensor.snapshot())))
}

/// Handle POST /services/cancel_timer
pub async fn cancel_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EntryRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let sensor = state.sensor(&request.entry_id).map_err(reject)?;
    sensor.cancel_timer().await.map_err(reject)?;
    Ok(Json(ApiResponse::ok("Timer cancelled".to_string(), sensor.snapshot())))
}

/// Handle POST /services/reset_daily_usage
pub async fn reset_daily_usage_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EntryRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let sensor = state.sensor(&request.entry_id).map_err(reject)?;
    sensor.reset_daily_usage().await;
    Ok(Json(ApiResponse::ok("Daily usage reset".to_string(), sensor.snapshot())))
}

/// Handle POST /services/manual_power_toggle
pub async fn manual_power_toggle_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ManualPowerRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let sensor = state.sensor(&request.entry_id).map_err(reject)?;
    let action = request.action.parse::<PowerAction>().map_err(reject)?;
    sensor.manual_power_toggle(action).await;
    Ok(Json(ApiResponse::ok(format!("Manual {} done", request.action), sensor.snapshot())))
}

/// Handle POST /services/test_notification
pub async fn test_notification_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestNotificationRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let sensor = state.sensor(&request.entry_id).map_err(reject)?;
    sensor.test_notification(request.message.as_deref()).await;
    Ok(Json(ApiResponse::ok("Test notification sent".to_string(), sensor.snapshot())))
}

/// Handle POST /services/update_switch_entity
pub async fn update_switch_entity_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSwitchRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let sensor = state.sensor(&request.entry_id).map_err(reject)?;
    sensor.update_switch_entity(&request.entity_id).await.map_err(reject)?;
    Ok(Json(ApiResponse::ok("Switch entity updated".to_string(), sensor.snapshot())))
}

/// Handle POST /services/set_alarm_enabled
pub async fn set_alarm_enabled_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetAlarmEnabledRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let sensor = state.sensor(&request.entry_id).map_err(reject)?;
    sensor.set_alarm_enabled(request.enabled).await;
    Ok(Json(ApiResponse::ok("Alarm setting updated".to_string(), sensor.snapshot())))
}

/// Handle POST /services/set_card_config
pub async fn set_card_config_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetCardConfigRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let config = state
        .alarms
        .set_config(&request.config_id, &request.config)
        .await
        .map_err(reject)?;
    info!("[{}] Card config stored", config.config_id());
    Ok(Json(ApiResponse::done(format!("Config {} saved", request.config_id))))
}

/// Handle POST /services/set_responsible_people
pub async fn set_responsible_people_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResponsibleResponse>,
) -> Json<ApiResponse> {
    let count = request.services.len();
    state.responsible.set_services(request.services).await;
    Json(ApiResponse::done(format!("{} responsible people services saved", count)))
}

/// Handle GET /alarms - Current firing state of every card
pub async fn alarms_handler(State(state): State<Arc<AppState>>) -> Json<AlarmsResponse> {
    Json(AlarmsResponse {
        alarms: state.alarm_states.all(),
    })
}

/// Handle GET /alarms/configs
pub async fn configs_handler(State(state): State<Arc<AppState>>) -> Json<ConfigsResponse> {
    Json(ConfigsResponse {
        configs: state.alarms.configs(),
    })
}

/// Handle GET /responsible
pub async fn responsible_handler(State(state): State<Arc<AppState>>) -> Json<ResponsibleResponse> {
    Json(ResponsibleResponse {
        services: state.responsible.services(),
    })
}
