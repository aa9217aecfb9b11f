use crate::models::interval::{BusyInterval, Interval};

/// Collapses overlapping or touching intervals into a sorted, disjoint set.
pub fn merge(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|interval| interval.start);

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for current in sorted {
        match merged.last_mut() {
            Some(last) if current.start <= last.end => {
                last.end = last.end.max(current.end);
            }
            _ => merged.push(current),
        }
    }
    merged
}

/// Drops attendee attribution and merges across every attendee's busy periods.
pub fn merge_busy<'a, I>(busy: I) -> Vec<Interval>
where
    I: IntoIterator<Item = &'a BusyInterval>,
{
    let intervals: Vec<Interval> = busy.into_iter().map(|entry| entry.interval).collect();
    merge(&intervals)
}
