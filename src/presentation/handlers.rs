// HTTP request handlers
use crate::application::control_service::{ControlError, ManualRefill};
use crate::application::dashboard_service::DEFAULT_RECENT_EVENTS;
use crate::application::reading_store::StoreError;
use crate::domain::tank::Period;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct PeriodQuery {
    pub period: Option<Period>,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

fn store_error_response(e: &StoreError) -> Response {
    match e {
        StoreError::Unavailable(_) | StoreError::Malformed(_) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "data unavailable")
        }
        StoreError::NotFound(what) => error_response(StatusCode::NOT_FOUND, format!("not found: {}", what)),
    }
}

fn control_error_response(e: &ControlError) -> Response {
    match e {
        ControlError::Store(store_error) => store_error_response(store_error),
        ControlError::NoOpenActivation => error_response(StatusCode::CONFLICT, e.to_string()),
        ControlError::InvalidDuration { .. } => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Full dashboard for one period
pub async fn get_dashboard(
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let period = query.period.unwrap_or_default();

    match state.dashboard_service.get_dashboard(period, now_ms()).await {
        Ok(dashboard) => match json_response(StatusCode::OK, &dashboard, accepts_brotli(&headers)).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => {
            tracing::error!("Error building dashboard for {}: {}", period.as_str(), e);
            store_error_response(&e)
        }
    }
}

/// Stream the dashboard for one period (progressive loading)
pub async fn stream_dashboard(
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let period = query.period.unwrap_or_default();
    let rx = state.streaming_service.stream_dashboard(period, now_ms()).await;
    stream_from_receiver(rx, accepts_brotli(&headers)).await
}

/// Most recent inferred refill events
pub async fn recent_events(
    Query(query): Query<EventsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_EVENTS);
    match state.dashboard_service.recent_events(limit, now_ms()).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => {
            tracing::error!("Error fetching recent events: {}", e);
            store_error_response(&e)
        }
    }
}

pub async fn mark_refill(
    State(state): State<Arc<AppState>>,
    Json(refill): Json<ManualRefill>,
) -> Response {
    if refill.timestamp_ms <= 0 {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "timestamp must be positive");
    }
    match state.control_service.mark_refill(refill).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => {
            tracing::error!("Error marking refill: {}", e);
            control_error_response(&e)
        }
    }
}

pub async fn delete_refill(
    Path(timestamp_ms): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.control_service.delete_refill(timestamp_ms).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!("Error deleting refill {}: {}", timestamp_ms, e);
            control_error_response(&e)
        }
    }
}

pub async fn pump_on(State(state): State<Arc<AppState>>) -> Response {
    match state.control_service.activate_pump(now_ms()).await {
        Ok(toggle) => Json(toggle).into_response(),
        Err(e) => {
            tracing::error!("Error activating pump: {}", e);
            control_error_response(&e)
        }
    }
}

pub async fn pump_off(State(state): State<Arc<AppState>>) -> Response {
    match state.control_service.deactivate_pump(now_ms()).await {
        Ok(toggle) => Json(toggle).into_response(),
        Err(e) => {
            tracing::error!("Error deactivating pump: {}", e);
            control_error_response(&e)
        }
    }
}
