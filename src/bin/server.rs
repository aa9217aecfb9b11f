//! HTTP server binary for the meeting scheduling assistant.

use std::sync::Arc;

use meeting_assistant::http::{create_router, AppState};
use meeting_assistant::services::ai_service::LlmPreferenceExtractor;
use meeting_assistant::services::calendar_service::GoogleCalendarProvider;
use meeting_assistant::services::meeting_scheduler::MeetingScheduler;
use meeting_assistant::services::request_log::InMemoryRequestLog;
use meeting_assistant::services::settings_service::SchedulerSettings;
use meeting_assistant::utils::logger::init_logging;

#[tokio::main]
async fn main() {
    if let Err(error) = try_run().await {
        eprintln!("failed to launch server: {error}");
        std::process::exit(1);
    }
}

async fn try_run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = SchedulerSettings::from_env();
    init_logging(settings.log_dir.as_deref())?;

    tracing::info!(
        target: "app::http",
        llm_base_url = %settings.llm.base_url,
        llm_model = %settings.llm.model,
        keys_dir = %settings.calendar.keys_dir.display(),
        "starting meeting assistant"
    );

    let extractor = Arc::new(LlmPreferenceExtractor::try_from_settings(&settings.llm)?);
    let calendar = Arc::new(GoogleCalendarProvider::try_new(&settings.calendar)?);
    let scheduler = MeetingScheduler::new(extractor, calendar)
        .with_collaborator_timeout(settings.collaborator_timeout);

    let state = AppState::new(
        Arc::new(scheduler),
        Arc::new(InMemoryRequestLog::new(settings.request_log_capacity)),
    );
    let app = create_router(state);

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(target: "app::http", %addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
