// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tank_telemetry::application::cached_store::CachedReadingStore;
use tank_telemetry::application::control_service::ControlService;
use tank_telemetry::application::dashboard_service::DashboardService;
use tank_telemetry::application::streaming_service::StreamingDashboardService;
use tank_telemetry::infrastructure::config::load_tank_config;
use tank_telemetry::infrastructure::firebase_repository::FirebaseRepository;
use tank_telemetry::presentation::app_state::AppState;
use tank_telemetry::presentation::handlers::{
    delete_refill, get_dashboard, health_check, mark_refill, pump_off, pump_on, recent_events,
    stream_dashboard,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_tank_config()?;
    let offset = config.display.offset()?;

    // Create repository (infrastructure layer) behind the query cache
    let repository = Arc::new(FirebaseRepository::new(config.firebase.clone(), offset));
    let store = Arc::new(CachedReadingStore::new(
        repository,
        config.cache.ttl(),
        config.cache.all_ttl(),
    ));

    // Create services (application layer)
    let dashboard_service = DashboardService::new(store.clone(), config.engine, config.levels, offset);
    let streaming_service = StreamingDashboardService::new(dashboard_service.clone());
    let control_service = ControlService::new(store);

    let state = Arc::new(AppState {
        dashboard_service,
        streaming_service,
        control_service,
    });

    // Build router (presentation layer)
    // Responses are compressed by the handlers, so no CompressionLayer here
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/stream", get(stream_dashboard))
        .route("/events", get(recent_events))
        .route("/refills", post(mark_refill))
        .route("/refills/:timestamp", delete(delete_refill))
        .route("/pump/on", post(pump_on))
        .route("/pump/off", post(pump_off))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    tracing::info!("Starting tank-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
