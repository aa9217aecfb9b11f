use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value as JsonValue};

use crate::models::ai_types::SelectionContext;
use crate::models::interval::Interval;
use crate::services::schedule_utils::format_datetime;
use crate::services::slot_selector::TOP_K;

/// System prompt for pulling meeting parameters out of a request email.
pub fn preference_parsing_system_prompt() -> &'static str {
    r#"You are an assistant that helps schedule meetings. Read the email in the user message
and extract:
1. participant email addresses (comma-separated; append @amd.com to bare names)
2. meeting duration in minutes
3. time constraints exactly as phrased (e.g. "next week", "Thursday", "Monday at 9:00 AM")
4. urgency, either "normal" or "urgent"

Respond with ONLY a JSON object with the keys "participants", "duration_mins",
"time_constraints" and "urgency". Do not add commentary.

Example response:
{"participants": "usertwo.amd@gmail.com", "duration_mins": 30, "time_constraints": "Thursday", "urgency": "normal"}"#
}

/// System prompt for day and time hints relative to the request timestamp.
pub fn datetime_extraction_system_prompt() -> &'static str {
    r#"You extract the preferred meeting day and time from an email, relative to the
"currentDatetime" given in the user message. Typical phrases: "next Thursday",
"Monday at 9:00 AM", "Tuesday at 11:00 A.M", "tomorrow", "today", "between 2 and 5 pm",
"ASAP" or "urgent" (schedule at the earliest opportunity).

Respond with ONLY a JSON object with these keys:
- "is_today": true if the meeting should happen today
- "is_tomorrow": true if the meeting should happen tomorrow
- "day_of_week": lowercase weekday name if one is mentioned, otherwise null
- "is_specific_time": true if a clock time such as "9:00 AM" is mentioned
- "preferred_time": that time as 24-hour "HH:MM", otherwise null
- "time_range": a window such as "14:00-17:00" in 24-hour time, otherwise null
- "urgency": "urgent" for words like URGENT, ASAP, promptly, otherwise "normal""#
}

/// System prompt for choosing among the ranked candidate slots.
pub fn slot_selection_system_prompt() -> &'static str {
    r#"You are a meeting scheduler. Pick the BEST slot from the numbered "slots" in the user
message for the meeting described there.

Selection criteria:
1. Urgent meetings take the earliest slot.
2. A requested clock time wins over everything else.
3. A requested weekday comes next.
4. Business hours are 09:00-18:00; prefer 09:00-11:00 and avoid 12:00-13:00.

Respond with ONLY a JSON object:
{"selected_slot_number": <1-based slot number>, "reason": "<one short sentence>"}"#
}

pub fn build_preference_parse_payload(email_content: &str) -> JsonValue {
    json!({
        "operation": "parsePreferences",
        "email": email_content,
    })
}

pub fn build_datetime_extraction_payload(
    email_content: &str,
    reference: DateTime<FixedOffset>,
) -> JsonValue {
    json!({
        "operation": "extractDatetimePreference",
        "currentDatetime": format_datetime(reference),
        "email": email_content,
    })
}

/// Lists at most the top five slots, numbered from 1.
pub fn build_slot_selection_payload(
    candidates: &[Interval],
    duration_minutes: u32,
    context: &SelectionContext,
) -> JsonValue {
    let slots: Vec<JsonValue> = candidates
        .iter()
        .take(TOP_K)
        .enumerate()
        .map(|(idx, slot)| {
            json!({
                "number": idx + 1,
                "start": format_datetime(slot.start),
                "end": format_datetime(slot.end),
            })
        })
        .collect();

    json!({
        "operation": "selectBestSlot",
        "meetingRequest": context.email_content,
        "slots": slots,
        "details": {
            "durationMinutes": duration_minutes,
            "urgency": context.urgency.as_str(),
            "timeConstraints": context.time_constraints,
            "preferredTime": context.preferred_time.map(|time| time.format("%H:%M").to_string()),
            "timeRange": context.time_range.map(|range| range.to_string()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::preference::Urgency;
    use crate::services::schedule_utils::{add_minutes, default_offset};
    use chrono::TimeZone;

    #[test]
    fn selection_payload_numbers_at_most_five_slots() {
        let base = default_offset()
            .with_ymd_and_hms(2025, 7, 21, 9, 0, 0)
            .single()
            .expect("valid datetime");
        let candidates: Vec<Interval> = (0..7)
            .map(|step| {
                let start = add_minutes(base, step * 30).expect("in range");
                Interval::with_minutes(start, 30).expect("valid slot")
            })
            .collect();
        let context = SelectionContext {
            urgency: Urgency::Urgent,
            email_content: "Need to sync ASAP".into(),
            ..Default::default()
        };

        let payload = build_slot_selection_payload(&candidates, 30, &context);
        let slots = payload["slots"].as_array().expect("slots array");
        assert_eq!(slots.len(), 5);
        assert_eq!(slots[0]["number"], 1);
        assert_eq!(slots[0]["start"], "2025-07-21T09:00:00+05:30");
        assert_eq!(slots[4]["end"], "2025-07-21T11:30:00+05:30");
        assert_eq!(payload["details"]["urgency"], "urgent");
        assert!(payload["details"]["preferredTime"].is_null());
    }
}
