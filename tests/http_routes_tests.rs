use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, FixedOffset};
use meeting_assistant::http::{create_router, AppState};
use meeting_assistant::models::ai_types::{PreferenceExtractor, SelectionContext, SlotChoice};
use meeting_assistant::models::interval::Interval;
use meeting_assistant::models::preference::PreferenceSignal;
use meeting_assistant::services::calendar_service::InMemoryCalendarProvider;
use meeting_assistant::services::meeting_scheduler::MeetingScheduler;
use meeting_assistant::services::request_log::{InMemoryRequestLog, RequestLog};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

struct DefaultsOnly;

#[async_trait::async_trait]
impl PreferenceExtractor for DefaultsOnly {
    async fn parse_preferences(&self, _email_content: &str) -> PreferenceSignal {
        PreferenceSignal::parse_default()
    }

    async fn extract_datetime_preference(
        &self,
        _email_content: &str,
        _reference: DateTime<FixedOffset>,
    ) -> PreferenceSignal {
        PreferenceSignal {
            is_tomorrow: true,
            ..Default::default()
        }
    }

    async fn select_best_slot(
        &self,
        _candidates: &[Interval],
        _duration_minutes: u32,
        _context: &SelectionContext,
    ) -> SlotChoice {
        SlotChoice::default()
    }
}

fn app() -> (Router, Arc<InMemoryRequestLog>) {
    let scheduler = MeetingScheduler::new(
        Arc::new(DefaultsOnly),
        Arc::new(InMemoryCalendarProvider::new()),
    )
    .with_collaborator_timeout(StdDuration::from_millis(500));
    let log = Arc::new(InMemoryRequestLog::new(16));
    let state = AppState::new(Arc::new(scheduler), log.clone());
    (create_router(state), log)
}

async fn read_json(response: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

fn post_receive(body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/receive")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request builds")
}

#[tokio::test]
async fn health_reports_service_name() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).expect("request builds"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body, json!({"status": "healthy", "service": "AI Scheduling Assistant"}));
}

#[tokio::test]
async fn receive_schedules_and_records_the_request() {
    let (app, log) = app();
    let payload = json!({
        "Request_id": "6118b54f-907b-4451-8d48-dd13d76033a5",
        "Datetime": "19-07-2025T12:34:55",
        "Location": "IISc Bangalore",
        "From": "userone.amd@gmail.com",
        "Attendees": [{"email": "usertwo.amd@gmail.com"}],
        "Subject": "Agentic AI Project Status Update",
        "EmailContent": "Hi team, let's meet tomorrow for 30 minutes."
    });

    let response = app
        .clone()
        .oneshot(post_receive(payload.to_string()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    // Saturday request; "tomorrow" rolls past the weekend to Monday.
    assert_eq!(body["EventStart"], "2025-07-21T09:00:00+05:30");
    assert_eq!(body["EventEnd"], "2025-07-21T09:30:00+05:30");
    assert_eq!(body["Duration_mins"], "30");
    assert_eq!(body["MetaData"]["scheduling_method"], "ai_optimized");
    assert_eq!(body["Attendees"].as_array().map(Vec::len), Some(2));

    assert_eq!(log.len(), 1);
    let recorded = &log.recent(1)[0];
    assert_eq!(recorded.input, payload);
    assert_eq!(recorded.output["EventStart"], body["EventStart"]);

    let response = app
        .oneshot(Request::get("/test").body(Body::empty()).expect("request builds"))
        .await
        .expect("router responds");
    let body = read_json(response).await;
    assert_eq!(body["total_requests_processed"], 1);
    assert_eq!(body["endpoints"], json!(["/receive", "/health", "/test"]));
}

#[tokio::test]
async fn malformed_request_still_answers_ok() {
    let (app, log) = app();
    let response = app
        .oneshot(post_receive(json!({"Request_id": "r-9", "Subject": "Sync"}).to_string()))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["Request_id"], "r-9");
    assert_eq!(body["EventStart"], "");
    assert_eq!(body["MetaData"]["scheduling_method"], "error_fallback");
    assert!(body["MetaData"]["error"].as_str().is_some());
    assert_eq!(log.len(), 1);
}
