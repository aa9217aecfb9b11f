use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::{AppError, AppResult};
use crate::models::interval::{BusyInterval, Interval};
use crate::services::schedule_utils;

pub const META_SCHEDULING_METHOD: &str = "scheduling_method";
pub const META_CONSTRAINTS: &str = "constraints_considered";
pub const META_WINDOW_START: &str = "search_window_start";
pub const META_WINDOW_END: &str = "search_window_end";
pub const META_SELECTION_REASON: &str = "selection_reason";
pub const META_SELECTED_SCORE: &str = "selected_score";
pub const META_PARSED_WEEKDAY: &str = "parsed_weekday";
pub const META_PARSED_TIME: &str = "parsed_time";
pub const META_ERROR: &str = "error";

const SELF_ATTENDEE: &str = "SELF";
const UNTITLED_EVENT: &str = "No Title";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeRef {
    pub email: String,
}

/// Incoming scheduling request, keyed the way the submission endpoint sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRequest {
    #[serde(rename = "Request_id")]
    pub request_id: String,
    #[serde(rename = "Datetime")]
    pub datetime: String,
    #[serde(rename = "Location", default)]
    pub location: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Attendees")]
    pub attendees: Vec<AttendeeRef>,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "EmailContent")]
    pub email_content: String,
}

impl MeetingRequest {
    pub fn from_value(value: &JsonValue) -> AppResult<Self> {
        serde_json::from_value(value.clone()).map_err(|err| {
            AppError::validation_with_details(
                format!("malformed meeting request: {err}"),
                json!({ "reason": err.to_string() }),
            )
        })
    }

    /// Listed attendees plus the requester, trimmed and de-duplicated in order.
    pub fn attendee_emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = Vec::with_capacity(self.attendees.len() + 1);
        let listed = self.attendees.iter().map(|attendee| attendee.email.as_str());
        for email in listed.chain(std::iter::once(self.from.as_str())) {
            let email = email.trim();
            if !email.is_empty() && !emails.iter().any(|known| known == email) {
                emails.push(email.to_string());
            }
        }
        emails
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(rename = "StartTime")]
    pub start_time: String,
    #[serde(rename = "EndTime")]
    pub end_time: String,
    #[serde(rename = "NumAttendees")]
    pub num_attendees: usize,
    #[serde(rename = "Attendees")]
    pub attendees: Vec<String>,
    #[serde(rename = "Summary")]
    pub summary: String,
}

impl CalendarEvent {
    pub fn from_busy(busy: &BusyInterval) -> Self {
        let attendees = if busy.attendees.is_empty() {
            vec![SELF_ATTENDEE.to_string()]
        } else {
            busy.attendees.clone()
        };
        Self {
            start_time: schedule_utils::format_datetime(busy.interval.start),
            end_time: schedule_utils::format_datetime(busy.interval.end),
            num_attendees: attendees.len(),
            attendees,
            summary: busy
                .summary
                .clone()
                .unwrap_or_else(|| UNTITLED_EVENT.to_string()),
        }
    }

    pub fn scheduled(slot: &Interval, attendees: &[String], subject: &str) -> Self {
        Self {
            start_time: schedule_utils::format_datetime(slot.start),
            end_time: schedule_utils::format_datetime(slot.end),
            num_attendees: attendees.len(),
            attendees: attendees.to_vec(),
            summary: subject.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeSchedule {
    pub email: String,
    pub events: Vec<CalendarEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingResponse {
    #[serde(rename = "Request_id")]
    pub request_id: String,
    #[serde(rename = "Datetime")]
    pub datetime: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Attendees")]
    pub attendees: Vec<AttendeeSchedule>,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "EmailContent")]
    pub email_content: String,
    #[serde(rename = "EventStart")]
    pub event_start: String,
    #[serde(rename = "EventEnd")]
    pub event_end: String,
    #[serde(rename = "Duration_mins")]
    pub duration_mins: String,
    #[serde(rename = "MetaData")]
    pub metadata: BTreeMap<String, String>,
}

impl MeetingResponse {
    /// Minimal but structurally valid answer for requests the pipeline could not handle.
    pub fn error_fallback(raw: &JsonValue, error: &AppError) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let attendees = raw
            .get("Attendees")
            .and_then(JsonValue::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("email").and_then(JsonValue::as_str))
                    .map(|email| AttendeeSchedule {
                        email: email.to_string(),
                        events: Vec::new(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut metadata = BTreeMap::new();
        metadata.insert(
            META_SCHEDULING_METHOD.to_string(),
            SchedulingTier::ERROR_FALLBACK.to_string(),
        );
        metadata.insert(META_ERROR.to_string(), error.to_string());

        Self {
            request_id: text("Request_id"),
            datetime: text("Datetime"),
            location: text("Location"),
            from: text("From"),
            attendees,
            subject: text("Subject"),
            email_content: text("EmailContent"),
            event_start: String::new(),
            event_end: String::new(),
            duration_mins: String::new(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub slot: Interval,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingTier {
    FirstPass,
    ExpandedWindow,
    BusinessHourFallback,
}

impl SchedulingTier {
    pub const ERROR_FALLBACK: &'static str = "error_fallback";

    pub fn as_str(self) -> &'static str {
        match self {
            SchedulingTier::FirstPass => "ai_optimized",
            SchedulingTier::ExpandedWindow => "expanded_window",
            SchedulingTier::BusinessHourFallback => "business_hour_fallback",
        }
    }
}

/// Outcome of slot selection; one variant per fallback tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotDecision {
    FirstPass {
        slot: Interval,
        score: i64,
        reason: String,
    },
    ExpandedWindow {
        slot: Interval,
    },
    BusinessHourFallback {
        slot: Interval,
    },
}

impl SlotDecision {
    pub fn slot(&self) -> Interval {
        match self {
            SlotDecision::FirstPass { slot, .. }
            | SlotDecision::ExpandedWindow { slot }
            | SlotDecision::BusinessHourFallback { slot } => *slot,
        }
    }

    pub fn tier(&self) -> SchedulingTier {
        match self {
            SlotDecision::FirstPass { .. } => SchedulingTier::FirstPass,
            SlotDecision::ExpandedWindow { .. } => SchedulingTier::ExpandedWindow,
            SlotDecision::BusinessHourFallback { .. } => SchedulingTier::BusinessHourFallback,
        }
    }
}
