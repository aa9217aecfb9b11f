use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use super::state::AppState;
use crate::models::meeting::MeetingResponse;
use crate::services::request_log::RequestLogEntry;
use crate::utils::redact::redact_sensitive_data;

pub const SERVICE_NAME: &str = "AI Scheduling Assistant";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub message: String,
    pub endpoints: Vec<&'static str>,
    pub total_requests_processed: usize,
}

/// POST /receive
///
/// Schedules the meeting described by the body. Always answers 200; scheduling
/// failures are reported inside the response metadata.
pub async fn receive(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Json<MeetingResponse> {
    let received_at = Utc::now();
    info!(
        target: "app::http",
        request_id = payload.get("Request_id").and_then(JsonValue::as_str).unwrap_or("<missing>"),
        "received scheduling request"
    );
    if let Ok(sanitized) = redact_sensitive_data(&payload) {
        tracing::debug!(target: "app::http", payload = %sanitized, "request payload");
    }

    let response = state.scheduler.schedule_meeting(&payload).await;

    match serde_json::to_value(&response) {
        Ok(output) => state.request_log.append(RequestLogEntry {
            received_at,
            input: payload,
            output,
        }),
        Err(err) => error!(target: "app::http", error = %err, "could not record response"),
    }

    Json(response)
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

/// GET /test
pub async fn test_endpoint(State(state): State<AppState>) -> Json<TestResponse> {
    Json(TestResponse {
        message: format!("{SERVICE_NAME} is running"),
        endpoints: vec!["/receive", "/health", "/test"],
        total_requests_processed: state.request_log.len(),
    })
}
