use std::sync::Arc;

use crate::services::meeting_scheduler::MeetingScheduler;
use crate::services::request_log::RequestLog;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<MeetingScheduler>,
    pub request_log: Arc<dyn RequestLog>,
}

impl AppState {
    pub fn new(scheduler: Arc<MeetingScheduler>, request_log: Arc<dyn RequestLog>) -> Self {
        Self {
            scheduler,
            request_log,
        }
    }
}
