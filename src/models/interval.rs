use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::services::schedule_utils;

/// Half-open time range `[start, end)` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Interval {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> AppResult<Self> {
        if end < start {
            return Err(AppError::validation_with_details(
                "interval end precedes its start",
                json!({
                    "start": schedule_utils::format_datetime(start),
                    "end": schedule_utils::format_datetime(end),
                }),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn with_minutes(start: DateTime<FixedOffset>, minutes: i64) -> AppResult<Self> {
        let end = schedule_utils::add_minutes(start, minutes)?;
        Self::new(start, end)
    }

    pub fn duration(&self) -> Duration {
        self.end.signed_duration_since(self.start)
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A busy period reported by the calendar, with who is busy and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyInterval {
    pub interval: Interval,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl BusyInterval {
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            attendees: Vec::new(),
            summary: None,
        }
    }
}

impl From<Interval> for BusyInterval {
    fn from(interval: Interval) -> Self {
        BusyInterval::new(interval)
    }
}
