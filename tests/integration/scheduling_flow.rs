use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone};
use meeting_assistant::models::ai_types::{PreferenceExtractor, SelectionContext, SlotChoice};
use meeting_assistant::models::interval::{BusyInterval, Interval};
use meeting_assistant::models::meeting::{MeetingResponse, META_SCHEDULING_METHOD};
use meeting_assistant::models::preference::{PreferenceSignal, Urgency};
use meeting_assistant::services::calendar_service::InMemoryCalendarProvider;
use meeting_assistant::services::free_slots::free_slots;
use meeting_assistant::services::interval_merger::merge;
use meeting_assistant::services::meeting_scheduler::MeetingScheduler;
use meeting_assistant::services::schedule_utils::{self, default_offset};
use meeting_assistant::services::slot_filter::filter_slots;
use meeting_assistant::services::slot_scorer::score_all;
use meeting_assistant::services::slot_selector::rank;
use serde_json::{json, Value as JsonValue};

// July 2025: Monday the 21st, Wednesday the 23rd, Friday the 25th.
fn at(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    default_offset()
        .with_ymd_and_hms(2025, month, day, hour, minute, 0)
        .single()
        .expect("valid datetime")
}

fn july(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    at(7, day, hour, minute)
}

fn interval(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Interval {
    Interval::new(start, end).expect("ordered interval")
}

struct FixedExtractor {
    preference: PreferenceSignal,
}

#[async_trait::async_trait]
impl PreferenceExtractor for FixedExtractor {
    async fn parse_preferences(&self, _email_content: &str) -> PreferenceSignal {
        self.preference.clone()
    }

    async fn extract_datetime_preference(
        &self,
        _email_content: &str,
        _reference: DateTime<FixedOffset>,
    ) -> PreferenceSignal {
        PreferenceSignal::default()
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

fn meeting_request(datetime: &str) -> JsonValue {
    json!({
        "Request_id": "0c6b3b2e-5f1a-4d8e-9d0b-3a6f4f1f2c11",
        "Datetime": datetime,
        "Location": "IISc Bangalore",
        "From": "userone.amd@gmail.com",
        "Attendees": [
            {"email": "usertwo.amd@gmail.com"},
            {"email": "userthree.amd@gmail.com"}
        ],
        "Subject": "Weekly sync",
        "EmailContent": "Hi team, can we find 30 minutes this week?"
    })
}

async fn schedule_fully_booked(
    datetime: &str,
    busy_from: DateTime<FixedOffset>,
    busy_until: DateTime<FixedOffset>,
) -> MeetingResponse {
    let booked = vec![BusyInterval::new(interval(busy_from, busy_until))];
    let calendar = ["userone.amd@gmail.com", "usertwo.amd@gmail.com", "userthree.amd@gmail.com"]
        .into_iter()
        .fold(InMemoryCalendarProvider::new(), |calendar, email| {
            calendar.with_busy(email, booked.clone())
        });
    let extractor = FixedExtractor {
        preference: PreferenceSignal::parse_default(),
    };

    MeetingScheduler::new(Arc::new(extractor), Arc::new(calendar))
        .with_collaborator_timeout(StdDuration::from_millis(500))
        .schedule_meeting(&meeting_request(datetime))
        .await
}

#[test]
fn empty_day_offers_nine_oclock_first() {
    let window_start = july(21, 0, 0);
    let window_end = july(22, 0, 0);

    let free = free_slots(&[], window_start, window_end, 30);
    assert_eq!(free, vec![interval(window_start, window_end)]);

    let candidates = filter_slots(&free, 30, None).expect("candidates");
    assert_eq!(candidates.first(), Some(&interval(july(21, 9, 0), july(21, 9, 30))));
    assert_eq!(
        candidates.last(),
        Some(&interval(july(21, 17, 30), july(21, 18, 0)))
    );
    assert_eq!(candidates.len(), 18);
}

#[test]
fn specific_time_preference_selects_exact_slot() {
    let window_start = july(21, 0, 0);
    let window_end = july(22, 0, 0);
    let busy = merge(&[interval(july(21, 9, 0), july(21, 10, 0))]);
    let preference = PreferenceSignal {
        is_specific_time: true,
        preferred_time: NaiveTime::from_hms_opt(10, 0, 0),
        ..PreferenceSignal::parse_default()
    };

    let free = free_slots(&busy, window_start, window_end, 30);
    let candidates = filter_slots(&free, 30, Some(&preference)).expect("candidates");
    assert!(candidates
        .iter()
        .all(|slot| schedule_utils::local_hour(slot.start) == 10));

    let ranked = rank(score_all(&candidates, Some(&preference), july(21, 8, 0)));
    assert_eq!(ranked[0].slot, interval(july(21, 10, 0), july(21, 10, 30)));
    assert!(ranked[0].score >= 200);
}

#[test]
fn urgent_preference_ranks_the_sooner_day_first() {
    let preference = PreferenceSignal {
        urgency: Some(Urgency::Urgent),
        ..PreferenceSignal::parse_default()
    };
    let monday = interval(july(21, 10, 0), july(21, 10, 30));
    let wednesday = interval(july(23, 10, 0), july(23, 10, 30));

    let ranked = rank(score_all(&[wednesday, monday], Some(&preference), july(21, 8, 0)));

    assert_eq!(ranked[0].slot, monday);
    assert_eq!(ranked[0].score, 130);
    assert_eq!(ranked[1].slot, wednesday);
    assert_eq!(ranked[1].score, 55);
}

#[tokio::test]
async fn fully_booked_week_falls_back_to_next_business_day() {
    let response =
        schedule_fully_booked("2025-07-21T08:00:00+05:30", july(20, 0, 0), at(8, 5, 0, 0)).await;

    assert_eq!(
        response.metadata.get(META_SCHEDULING_METHOD).map(String::as_str),
        Some("business_hour_fallback")
    );
    assert_eq!(response.event_start, "2025-07-22T10:00:00+05:30");
    assert_eq!(response.event_end, "2025-07-22T10:30:00+05:30");
    assert_eq!(response.attendees.len(), 3);
    for attendee in &response.attendees {
        assert_eq!(attendee.events.last().map(|e| e.start_time.as_str()), Some("2025-07-22T10:00:00+05:30"));
    }
}

#[tokio::test]
async fn fully_booked_from_friday_falls_back_to_monday() {
    let response =
        schedule_fully_booked("2025-07-25T08:00:00+05:30", july(24, 0, 0), at(8, 9, 0, 0)).await;

    assert_eq!(
        response.metadata.get(META_SCHEDULING_METHOD).map(String::as_str),
        Some("business_hour_fallback")
    );
    assert_eq!(response.event_start, "2025-07-28T10:00:00+05:30");
    assert_eq!(response.duration_mins, "30");
}
