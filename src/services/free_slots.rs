use chrono::{DateTime, Duration, FixedOffset};

use crate::models::interval::Interval;

/// Gaps in `busy` inside `[window_start, window_end)` that fit `min_duration_minutes`.
///
/// `busy` must be sorted and disjoint (see `interval_merger::merge`). Busy
/// periods that start before the window only push the cursor forward; those at
/// or after `window_end` are ignored.
pub fn free_slots(
    busy: &[Interval],
    window_start: DateTime<FixedOffset>,
    window_end: DateTime<FixedOffset>,
    min_duration_minutes: u32,
) -> Vec<Interval> {
    let min_duration = Duration::minutes(i64::from(min_duration_minutes));
    let mut free = Vec::new();
    if window_end <= window_start {
        return free;
    }

    let mut cursor = window_start;
    for interval in busy {
        if interval.start >= window_end {
            break;
        }
        if interval.start > cursor && interval.start - cursor >= min_duration {
            free.push(Interval {
                start: cursor,
                end: interval.start,
            });
        }
        cursor = cursor.max(interval.end);
    }

    if window_end > cursor && window_end - cursor >= min_duration {
        free.push(Interval {
            start: cursor,
            end: window_end,
        });
    }
    free
}
