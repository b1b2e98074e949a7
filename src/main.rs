//! alarm-runtime - runtime accounting and alarm triggers for smart-home switches
//!
//! This is the main entry point for the alarm-runtime server.

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use alarm_runtime::{
    api::create_router,
    config::{load_entries, Config},
    services::SystemClock,
    state::AppState,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("alarm_runtime={},tower_http=info", config.log_level()))
        .init();

    info!("Starting alarm-runtime server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, storage={}",
        config.host,
        config.port,
        config.storage_dir.display()
    );

    let entries = match &config.entries {
        Some(path) => load_entries(path)
            .await
            .with_context(|| format!("loading entries from {}", path.display()))?,
        None => {
            warn!("No entries file given; add entries with PUT /entries/:entry_id");
            Vec::new()
        }
    };

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("creating storage directory {}", config.storage_dir.display()))?;

    // Create application state and restore every entry
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        config.storage_dir.clone(),
        Arc::new(SystemClock),
    ));
    state.load(entries).await;

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health, /status");
    info!("  GET  /entries, /entries/:entry_id");
    info!("  PUT  /entries/:entry_id");
    info!("  POST /states/:entity_id");
    info!("  POST /services/{{start_timer,cancel_timer,reset_daily_usage,manual_power_toggle}}");
    info!("  POST /services/{{test_notification,update_switch_entity,set_alarm_enabled}}");
    info!("  POST /services/{{set_card_config,set_responsible_people}}");
    info!("  GET  /alarms, /alarms/configs, /responsible");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}
