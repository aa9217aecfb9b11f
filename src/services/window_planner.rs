use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::error::AppResult;
use crate::models::preference::PreferenceSignal;
use crate::services::constraint_parser::parse_time_constraint;
use crate::services::schedule_utils::{self, add_days, day_start, next_weekday, roll_past_weekend};

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const NARROW_WINDOW_DAYS: i64 = 3;
pub const URGENT_WINDOW_DAYS: i64 = 3;

/// Which preference signal decided the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBasis {
    Today,
    Tomorrow,
    DayOfWeek,
    ConstraintText,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub basis: WindowBasis,
}

/// Derives the search window from the request instant and preference signals.
///
/// First match wins: today, tomorrow, explicit weekday, weekday found in the raw
/// constraint text, then the default week. Urgency caps the window at three
/// days from its start.
pub fn plan(reference: DateTime<FixedOffset>, preference: &PreferenceSignal) -> AppResult<SearchWindow> {
    let reference = schedule_utils::normalize(reference);

    let (start, end, basis) = if preference.is_today {
        let day = day_start(roll_past_weekend(reference)?)?;
        (day, add_days(day, 1)?, WindowBasis::Today)
    } else if preference.is_tomorrow {
        let day = day_start(roll_past_weekend(add_days(reference, 1)?)?)?;
        (day, add_days(day, 1)?, WindowBasis::Tomorrow)
    } else if let Some(weekday) = preference.day_of_week {
        let day = day_start(next_weekday(reference, weekday)?)?;
        (day, add_days(day, NARROW_WINDOW_DAYS)?, WindowBasis::DayOfWeek)
    } else {
        let parsed_weekday = preference
            .time_constraints
            .as_deref()
            .and_then(|text| parse_time_constraint(text).weekday);
        match parsed_weekday {
            Some(weekday) => {
                let day = day_start(next_weekday(reference, weekday)?)?;
                (day, add_days(day, NARROW_WINDOW_DAYS)?, WindowBasis::ConstraintText)
            }
            None => {
                let day = day_start(reference)?;
                (day, add_days(day, DEFAULT_WINDOW_DAYS)?, WindowBasis::Default)
            }
        }
    };

    let end = if preference.is_urgent() {
        add_days(start, URGENT_WINDOW_DAYS)?
    } else {
        end
    };

    debug!(
        target: "app::scheduler",
        start = %schedule_utils::format_datetime(start),
        end = %schedule_utils::format_datetime(end),
        basis = ?basis,
        "search window planned"
    );

    Ok(SearchWindow { start, end, basis })
}
