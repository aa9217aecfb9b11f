use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, FixedOffset};
use serde_json::Value as JsonValue;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::models::ai_types::{PreferenceExtractor, SelectionContext, SlotChoice};
use crate::models::calendar::CalendarProvider;
use crate::models::interval::Interval;
use crate::models::meeting::{
    AttendeeSchedule, CalendarEvent, MeetingRequest, MeetingResponse, SlotDecision,
    META_CONSTRAINTS, META_PARSED_TIME, META_PARSED_WEEKDAY, META_SCHEDULING_METHOD,
    META_SELECTED_SCORE, META_SELECTION_REASON, META_WINDOW_END, META_WINDOW_START,
};
use crate::models::preference::PreferenceSignal;
use crate::services::calendar_service::{fetch_all, AttendeeBusy};
use crate::services::constraint_parser::parse_time_constraint;
use crate::services::free_slots::free_slots;
use crate::services::interval_merger::merge_busy;
use crate::services::schedule_utils::{add_days, format_datetime, parse_datetime};
use crate::services::slot_filter::filter_slots;
use crate::services::slot_scorer::score_all;
use crate::services::slot_selector::{apply_choice, business_hour_fallback, rank, top_candidates};
use crate::services::window_planner::{self, SearchWindow};
use crate::utils::redact::redact_text;

pub const DEFAULT_COLLABORATOR_TIMEOUT: StdDuration = StdDuration::from_secs(60);
pub const EXPANSION_DAYS: i64 = 7;

const EXPANDED_WINDOW_REASON: &str = "first available slot in expanded window";
const FALLBACK_REASON: &str = "no common free time; next business day at 10:00";

/// Runs one request through planning, availability, filtering, scoring and
/// selection. Always produces a response; failures surface only in metadata.
pub struct MeetingScheduler {
    extractor: Arc<dyn PreferenceExtractor>,
    calendar: Arc<dyn CalendarProvider>,
    collaborator_timeout: StdDuration,
}

impl MeetingScheduler {
    pub fn new(extractor: Arc<dyn PreferenceExtractor>, calendar: Arc<dyn CalendarProvider>) -> Self {
        Self {
            extractor,
            calendar,
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    pub fn with_collaborator_timeout(mut self, collaborator_timeout: StdDuration) -> Self {
        self.collaborator_timeout = collaborator_timeout;
        self
    }

    pub async fn schedule_meeting(&self, raw: &JsonValue) -> MeetingResponse {
        match self.try_schedule(raw).await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    target: "app::scheduler",
                    request_id = raw.get("Request_id").and_then(JsonValue::as_str).unwrap_or("<missing>"),
                    error = %err,
                    "scheduling failed; returning error fallback"
                );
                MeetingResponse::error_fallback(raw, &err)
            }
        }
    }

    async fn try_schedule(&self, raw: &JsonValue) -> AppResult<MeetingResponse> {
        let request = MeetingRequest::from_value(raw)?;
        let reference = parse_datetime(&request.datetime)?;
        let attendees = request.attendee_emails();

        info!(
            target: "app::scheduler",
            request_id = %request.request_id,
            attendees = attendees.len(),
            subject = %redact_text(&request.subject),
            "scheduling request received"
        );

        let preference = self.extract_preferences(&request.email_content, reference).await;
        let duration = preference.duration_or_default();
        debug!(target: "app::scheduler", request_id = %request.request_id, ?preference, "preferences resolved");

        let window = window_planner::plan(reference, &preference)?;
        let mut fetched = fetch_all(
            self.calendar.as_ref(),
            &attendees,
            window.start,
            window.end,
            self.collaborator_timeout,
        )
        .await;

        let merged = merge_busy(fetched.iter().flat_map(|entry| entry.busy.iter()));
        let free = free_slots(&merged, window.start, window.end, duration);
        let candidates = filter_slots(&free, duration, Some(&preference))?;
        debug!(
            target: "app::scheduler",
            request_id = %request.request_id,
            busy = merged.len(),
            free = free.len(),
            candidates = candidates.len(),
            "availability computed"
        );

        let decision = if candidates.is_empty() {
            self.fallback_decision(&attendees, &window, duration, &mut fetched)
                .await?
        } else {
            self.first_pass_decision(&request, &preference, &candidates, duration, reference)
                .await
        };

        info!(
            target: "app::scheduler",
            request_id = %request.request_id,
            method = decision.tier().as_str(),
            start = %format_datetime(decision.slot().start),
            "slot selected"
        );

        Ok(build_response(request, attendees, fetched, &preference, &window, duration, &decision))
    }

    async fn extract_preferences(
        &self,
        email_content: &str,
        reference: DateTime<FixedOffset>,
    ) -> PreferenceSignal {
        let (parsed, datetime) = tokio::join!(
            timeout(self.collaborator_timeout, self.extractor.parse_preferences(email_content)),
            timeout(
                self.collaborator_timeout,
                self.extractor.extract_datetime_preference(email_content, reference),
            ),
        );

        let parsed = parsed.unwrap_or_else(|_| {
            warn!(target: "app::scheduler", "preference parsing timed out; using defaults");
            PreferenceSignal::parse_default()
        });
        let datetime = datetime.unwrap_or_else(|_| {
            warn!(target: "app::scheduler", "datetime extraction timed out; no date constraints");
            PreferenceSignal::default()
        });
        PreferenceSignal::combine(parsed, datetime)
    }

    async fn first_pass_decision(
        &self,
        request: &MeetingRequest,
        preference: &PreferenceSignal,
        candidates: &[Interval],
        duration: u32,
        reference: DateTime<FixedOffset>,
    ) -> SlotDecision {
        let ranked = rank(score_all(candidates, Some(preference), reference));
        let top = top_candidates(&ranked);
        for (position, candidate) in top.iter().enumerate() {
            debug!(
                target: "app::scheduler",
                rank = position + 1,
                score = candidate.score,
                start = %format_datetime(candidate.slot.start),
                "ranked candidate"
            );
        }

        let slots: Vec<Interval> = top.iter().map(|candidate| candidate.slot).collect();
        let context = SelectionContext::from_preference(preference, &request.email_content);
        let choice = timeout(
            self.collaborator_timeout,
            self.extractor.select_best_slot(&slots, duration, &context),
        )
        .await
        .unwrap_or_else(|_| {
            warn!(target: "app::scheduler", "slot selection timed out; taking the top ranked slot");
            SlotChoice::default()
        });

        // `top` is non-empty because candidates were.
        apply_choice(top, &choice).unwrap_or_else(|| SlotDecision::FirstPass {
            slot: ranked[0].slot,
            score: ranked[0].score,
            reason: choice.reason,
        })
    }

    async fn fallback_decision(
        &self,
        attendees: &[String],
        window: &SearchWindow,
        duration: u32,
        fetched: &mut Vec<AttendeeBusy>,
    ) -> AppResult<SlotDecision> {
        let expanded_end = add_days(window.end, EXPANSION_DAYS)?;
        warn!(
            target: "app::scheduler",
            expanded_end = %format_datetime(expanded_end),
            "no candidates in planned window; expanding search"
        );

        let extension = fetch_all(
            self.calendar.as_ref(),
            attendees,
            window.end,
            expanded_end,
            self.collaborator_timeout,
        )
        .await;
        for (entry, extra) in fetched.iter_mut().zip(extension) {
            for busy in extra.busy {
                if !entry.busy.contains(&busy) {
                    entry.busy.push(busy);
                }
            }
        }

        let merged = merge_busy(fetched.iter().flat_map(|entry| entry.busy.iter()));
        let free = free_slots(&merged, window.start, expanded_end, duration);
        if let Some(slot) = filter_slots(&free, duration, None)?.first() {
            return Ok(SlotDecision::ExpandedWindow { slot: *slot });
        }

        warn!(target: "app::scheduler", "expanded window exhausted; using business-hour fallback");
        Ok(SlotDecision::BusinessHourFallback {
            slot: business_hour_fallback(window.start, duration)?,
        })
    }
}

fn build_response(
    request: MeetingRequest,
    attendees: Vec<String>,
    fetched: Vec<AttendeeBusy>,
    preference: &PreferenceSignal,
    window: &SearchWindow,
    duration: u32,
    decision: &SlotDecision,
) -> MeetingResponse {
    let slot = decision.slot();
    let scheduled = CalendarEvent::scheduled(&slot, &attendees, &request.subject);

    let schedules = fetched
        .into_iter()
        .map(|entry| {
            let mut events: Vec<CalendarEvent> =
                entry.busy.iter().map(CalendarEvent::from_busy).collect();
            events.push(scheduled.clone());
            AttendeeSchedule {
                email: entry.email,
                events,
            }
        })
        .collect();

    MeetingResponse {
        event_start: format_datetime(slot.start),
        event_end: format_datetime(slot.end),
        duration_mins: duration.to_string(),
        metadata: build_metadata(preference, window, decision),
        request_id: request.request_id,
        datetime: request.datetime,
        location: request.location,
        from: request.from,
        attendees: schedules,
        subject: request.subject,
        email_content: request.email_content,
    }
}

fn build_metadata(
    preference: &PreferenceSignal,
    window: &SearchWindow,
    decision: &SlotDecision,
) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        metadata.insert(key.to_string(), value);
    };

    put(META_SCHEDULING_METHOD, decision.tier().as_str().to_string());
    put(
        META_CONSTRAINTS,
        preference.time_constraints.clone().unwrap_or_default(),
    );
    put(META_WINDOW_START, format_datetime(window.start));
    put(META_WINDOW_END, format_datetime(window.end));

    match decision {
        SlotDecision::FirstPass { score, reason, .. } => {
            put(META_SELECTION_REASON, reason.clone());
            put(META_SELECTED_SCORE, score.to_string());
        }
        SlotDecision::ExpandedWindow { .. } => {
            put(META_SELECTION_REASON, EXPANDED_WINDOW_REASON.to_string());
        }
        SlotDecision::BusinessHourFallback { .. } => {
            put(META_SELECTION_REASON, FALLBACK_REASON.to_string());
        }
    }

    if let Some(text) = preference.time_constraints.as_deref() {
        let parsed = parse_time_constraint(text);
        if let Some(weekday) = parsed.weekday {
            put(META_PARSED_WEEKDAY, weekday.to_string());
        }
        if let Some(time) = parsed.time {
            put(META_PARSED_TIME, time.format("%H:%M").to_string());
        }
    }
    metadata
}
