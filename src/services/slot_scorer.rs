use chrono::{DateTime, Duration, FixedOffset, Timelike};

use crate::models::interval::Interval;
use crate::models::meeting::ScoredCandidate;
use crate::models::preference::PreferenceSignal;
use crate::services::schedule_utils::{local_hour, local_minute, weekday_of};

const URGENT_WITHIN_DAY: i64 = 100;
const URGENT_WITHIN_TWO_DAYS: i64 = 50;
const URGENT_LATER: i64 = 25;
const EXACT_TIME_MATCH: i64 = 200;
const HOUR_MATCH: i64 = 100;
const IN_TIME_RANGE: i64 = 150;
const URGENT_RANGE_OPENING: i64 = 50;
const DAY_OF_WEEK_MATCH: i64 = 150;
const MORNING_BONUS: i64 = 30;
const EARLY_PENALTY: i64 = -20;
const LATE_AFTERNOON_PENALTY: i64 = -10;
const POST_LUNCH_PENALTY: i64 = -15;

/// Additive desirability score for one candidate. Unbounded in both directions.
pub fn score(
    candidate: &Interval,
    preference: Option<&PreferenceSignal>,
    reference: DateTime<FixedOffset>,
) -> i64 {
    let hour = local_hour(candidate.start);
    let minute = local_minute(candidate.start);
    let mut total = time_of_day_shaping(hour);

    let Some(preference) = preference else {
        return total;
    };
    let urgent = preference.is_urgent();

    if urgent {
        let lead = candidate.start.signed_duration_since(reference);
        total += if lead < Duration::hours(24) {
            URGENT_WITHIN_DAY
        } else if lead < Duration::hours(48) {
            URGENT_WITHIN_TWO_DAYS
        } else {
            URGENT_LATER
        };
    }

    if let Some(preferred) = preference.preferred_time {
        if preferred.hour() == hour {
            total += if preferred.minute() == minute {
                EXACT_TIME_MATCH
            } else {
                HOUR_MATCH
            };
        }
    }

    if let Some(range) = preference.time_range {
        if (range.start_hour()..range.end_hour()).contains(&hour) {
            total += IN_TIME_RANGE;
            if urgent && hour == range.start_hour() {
                total += URGENT_RANGE_OPENING;
            }
        }
    }

    if preference.day_of_week == Some(weekday_of(candidate.start)) {
        total += DAY_OF_WEEK_MATCH;
    }

    total
}

pub fn score_all(
    candidates: &[Interval],
    preference: Option<&PreferenceSignal>,
    reference: DateTime<FixedOffset>,
) -> Vec<ScoredCandidate> {
    candidates
        .iter()
        .map(|slot| ScoredCandidate {
            slot: *slot,
            score: score(slot, preference, reference),
        })
        .collect()
}

fn time_of_day_shaping(hour: u32) -> i64 {
    let mut shaping = if (9..11).contains(&hour) {
        MORNING_BONUS
    } else if hour < 9 {
        EARLY_PENALTY
    } else if hour >= 16 {
        LATE_AFTERNOON_PENALTY
    } else {
        0
    };
    if hour == 13 {
        shaping += POST_LUNCH_PENALTY;
    }
    shaping
}
