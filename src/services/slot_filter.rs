use chrono::{Duration, Timelike};

use crate::error::AppResult;
use crate::models::interval::Interval;
use crate::models::preference::PreferenceSignal;
use crate::services::schedule_utils::{add_minutes, local_hour};

pub const GRANULARITY_MINUTES: i64 = 30;
pub const BUSINESS_DAY_START_HOUR: u32 = 9;
pub const BUSINESS_DAY_END_HOUR: u32 = 18;

pub fn is_business_hour(hour: u32) -> bool {
    (BUSINESS_DAY_START_HOUR..BUSINESS_DAY_END_HOUR).contains(&hour)
}

/// Enumerates `duration_minutes` candidates on a 30 minute grid inside each free
/// interval and keeps those starting in business hours.
///
/// With a specific-time preference the start hour must also equal the preferred
/// hour; minutes are left to the scorer. An unparseable preferred time applies
/// no constraint.
pub fn filter_slots(
    free: &[Interval],
    duration_minutes: u32,
    preference: Option<&PreferenceSignal>,
) -> AppResult<Vec<Interval>> {
    let duration = i64::from(duration_minutes);
    let required_hour = preference
        .filter(|preference| preference.is_specific_time)
        .and_then(|preference| preference.preferred_time)
        .map(|time| time.hour());

    let mut candidates = Vec::new();
    for interval in free {
        if interval.duration() < Duration::minutes(duration) {
            continue;
        }

        let mut cursor = interval.start;
        loop {
            let end = add_minutes(cursor, duration)?;
            if end > interval.end {
                break;
            }
            let hour = local_hour(cursor);
            if is_business_hour(hour) && required_hour.map_or(true, |wanted| wanted == hour) {
                candidates.push(Interval { start: cursor, end });
            }
            cursor = add_minutes(cursor, GRANULARITY_MINUTES)?;
        }
    }
    Ok(candidates)
}
