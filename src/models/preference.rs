use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::services::schedule_utils;

pub const DEFAULT_DURATION_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "urgent" | "high" | "asap" | "immediate" => Some(Urgency::Urgent),
            "normal" | "medium" | "low" => Some(Urgency::Normal),
            _ => None,
        }
    }
}

/// Clock range such as `14:00-17:00`; only the hours take part in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn parse(raw: &str) -> Option<Self> {
        let (start, end) = raw.split_once('-')?;
        Some(Self {
            start: schedule_utils::parse_clock_time(start)?,
            end: schedule_utils::parse_clock_time(end)?,
        })
    }

    pub fn start_hour(&self) -> u32 {
        self.start.hour()
    }

    pub fn end_hour(&self) -> u32 {
        self.end.hour()
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Best-effort scheduling hints extracted from the request text.
///
/// Every field is optional; absence means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSignal {
    pub duration_minutes: Option<u32>,
    pub urgency: Option<Urgency>,
    pub is_today: bool,
    pub is_tomorrow: bool,
    pub day_of_week: Option<Weekday>,
    pub is_specific_time: bool,
    pub preferred_time: Option<NaiveTime>,
    pub time_range: Option<TimeRange>,
    /// Raw constraint phrase ("next Thursday", "Monday at 9:00 AM").
    pub time_constraints: Option<String>,
}

impl PreferenceSignal {
    /// Fallback for a failed email parse: 30 minutes, normal urgency.
    pub fn parse_default() -> Self {
        Self {
            duration_minutes: Some(DEFAULT_DURATION_MINUTES),
            urgency: Some(Urgency::Normal),
            ..Default::default()
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.urgency == Some(Urgency::Urgent)
    }

    pub fn duration_or_default(&self) -> u32 {
        self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    /// Reads the email-parse payload (`duration_mins`, `urgency`, `time_constraints`).
    pub fn from_parse_response(value: &JsonValue) -> Self {
        let duration_minutes = ["duration_mins", "duration_minutes", "duration"]
            .iter()
            .find_map(|key| value.get(*key).and_then(positive_minutes));

        Self {
            duration_minutes,
            urgency: value.get("urgency").and_then(urgency_from),
            time_constraints: value
                .get("time_constraints")
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(ToOwned::to_owned),
            ..Default::default()
        }
    }

    /// Reads the date/time extraction payload. Malformed fields are dropped one by one.
    pub fn from_datetime_response(value: &JsonValue) -> Self {
        Self {
            urgency: value.get("urgency").and_then(urgency_from),
            is_today: value.get("is_today").map(flag_from).unwrap_or(false),
            is_tomorrow: value.get("is_tomorrow").map(flag_from).unwrap_or(false),
            day_of_week: value
                .get("day_of_week")
                .and_then(JsonValue::as_str)
                .and_then(|raw| raw.trim().parse::<Weekday>().ok()),
            is_specific_time: value.get("is_specific_time").map(flag_from).unwrap_or(false),
            preferred_time: value
                .get("preferred_time")
                .and_then(JsonValue::as_str)
                .and_then(schedule_utils::parse_clock_time),
            time_range: value
                .get("time_range")
                .and_then(JsonValue::as_str)
                .and_then(TimeRange::parse),
            ..Default::default()
        }
    }

    /// Duration and constraint text come from the email parse, calendar hints from
    /// the date/time extraction. Urgency prefers the date/time result.
    pub fn combine(parsed: PreferenceSignal, datetime: PreferenceSignal) -> Self {
        Self {
            duration_minutes: parsed.duration_minutes,
            urgency: datetime.urgency.or(parsed.urgency),
            time_constraints: parsed.time_constraints,
            ..datetime
        }
    }
}

fn positive_minutes(value: &JsonValue) -> Option<u32> {
    let minutes = match value {
        JsonValue::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f.round() as u64)),
        JsonValue::String(text) => text
            .trim()
            .trim_end_matches("mins")
            .trim_end_matches("min")
            .trim()
            .parse::<u64>()
            .ok(),
        _ => None,
    }?;
    u32::try_from(minutes).ok().filter(|minutes| *minutes > 0)
}

fn urgency_from(value: &JsonValue) -> Option<Urgency> {
    value.as_str().and_then(Urgency::parse)
}

fn flag_from(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(flag) => *flag,
        JsonValue::String(text) => matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        JsonValue::Number(number) => number.as_i64() == Some(1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_response_accepts_stringly_typed_duration() {
        let signal = PreferenceSignal::from_parse_response(&json!({
            "participants": "userone@amd.com",
            "duration_mins": "45",
            "time_constraints": " next Thursday ",
            "urgency": "URGENT"
        }));
        assert_eq!(signal.duration_minutes, Some(45));
        assert_eq!(signal.urgency, Some(Urgency::Urgent));
        assert_eq!(signal.time_constraints.as_deref(), Some("next Thursday"));
    }

    #[test]
    fn parse_response_drops_non_positive_duration() {
        let signal = PreferenceSignal::from_parse_response(&json!({"duration_mins": 0}));
        assert_eq!(signal.duration_minutes, None);
        assert_eq!(signal.duration_or_default(), DEFAULT_DURATION_MINUTES);
    }

    #[test]
    fn datetime_response_ignores_malformed_fields_individually() {
        let signal = PreferenceSignal::from_datetime_response(&json!({
            "preferred_time": "around lunch",
            "is_specific_time": true,
            "day_of_week": "Thursday",
            "time_range": "14:00-17:00",
            "is_tomorrow": "true",
            "unexpected": {"nested": 1}
        }));
        assert_eq!(signal.preferred_time, None);
        assert!(signal.is_specific_time);
        assert_eq!(signal.day_of_week, Some(Weekday::Thu));
        assert!(signal.is_tomorrow);
        let range = signal.time_range.expect("range parsed");
        assert_eq!((range.start_hour(), range.end_hour()), (14, 17));
        assert_eq!(range.to_string(), "14:00-17:00");
    }

    #[test]
    fn combine_prefers_datetime_urgency_and_keeps_parse_duration() {
        let parsed = PreferenceSignal {
            duration_minutes: Some(60),
            urgency: Some(Urgency::Urgent),
            time_constraints: Some("Monday".into()),
            ..Default::default()
        };
        let datetime = PreferenceSignal {
            urgency: Some(Urgency::Normal),
            day_of_week: Some(Weekday::Mon),
            ..Default::default()
        };
        let combined = PreferenceSignal::combine(parsed.clone(), datetime);
        assert_eq!(combined.duration_minutes, Some(60));
        assert_eq!(combined.urgency, Some(Urgency::Normal));
        assert_eq!(combined.day_of_week, Some(Weekday::Mon));

        let fallback = PreferenceSignal::combine(parsed, PreferenceSignal::default());
        assert!(fallback.is_urgent());
    }
}
