use chrono::{DateTime, FixedOffset, Weekday};

use crate::error::AppResult;
use crate::models::ai_types::SlotChoice;
use crate::models::interval::Interval;
use crate::models::meeting::{ScoredCandidate, SlotDecision};
use crate::services::schedule_utils::{add_days, at_clock, next_weekday, weekday_of};

pub const TOP_K: usize = 5;
pub const FALLBACK_HOUR: u32 = 10;

/// Highest score first; equal scores keep their chronological order.
pub fn rank(mut scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

pub fn top_candidates(ranked: &[ScoredCandidate]) -> &[ScoredCandidate] {
    &ranked[..ranked.len().min(TOP_K)]
}

/// Maps a 1-based pick onto `0..len`. Any pick outside `1..=len` clamps to the last slot.
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match usize::try_from(index) {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => Some(len - 1),
    }
}

pub fn apply_choice(top: &[ScoredCandidate], choice: &SlotChoice) -> Option<SlotDecision> {
    let picked = top.get(resolve_index(choice.index, top.len())?)?;
    Some(SlotDecision::FirstPass {
        slot: picked.slot,
        score: picked.score,
        reason: choice.reason.clone(),
    })
}

/// Next business day at 10:00 for `duration_minutes`.
///
/// A Friday, Saturday or Sunday base day goes straight to the following Monday.
pub fn business_hour_fallback(
    base: DateTime<FixedOffset>,
    duration_minutes: u32,
) -> AppResult<Interval> {
    let day = match weekday_of(base) {
        Weekday::Fri | Weekday::Sat | Weekday::Sun => next_weekday(base, Weekday::Mon)?,
        _ => add_days(base, 1)?,
    };
    let start = at_clock(day, FALLBACK_HOUR, 0)?;
    Interval::with_minutes(start, i64::from(duration_minutes))
}
