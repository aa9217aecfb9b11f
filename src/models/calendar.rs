use chrono::{DateTime, FixedOffset};

use crate::models::interval::BusyInterval;

/// Source of per-attendee busy periods.
///
/// Implementations return an empty list when an attendee's calendar cannot be
/// read; the reason is logged, never propagated.
#[async_trait::async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn fetch_busy(
        &self,
        attendee: &str,
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> Vec<BusyInterval>;
}
