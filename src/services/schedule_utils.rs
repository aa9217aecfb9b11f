use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    Timelike, Weekday,
};
use serde_json::json;

use crate::error::{AppError, AppResult};

/// +05:30, applied to every naive instant and used for all day-boundary math.
pub const DEFAULT_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_OFFSET_SECONDS).expect("+05:30 must be a valid offset")
}

pub fn normalize(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_timezone(&default_offset())
}

/// Parses the timestamp shapes seen on requests and calendar payloads.
///
/// Accepts RFC 3339, `DD-MM-YYYYTHH:MM:SS`, offset-less ISO datetimes and
/// plain dates. The result is always expressed in the default offset.
pub fn parse_datetime(value: &str) -> AppResult<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("timestamp must not be empty"));
    }

    let candidate = reorder_day_first(trimmed).unwrap_or_else(|| trimmed.to_string());

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&candidate) {
        return Ok(normalize(parsed));
    }
    if let Ok(parsed) = DateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(normalize(parsed));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, format) {
            return attach_default_offset(naive, value);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&candidate, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return attach_default_offset(midnight, value);
        }
    }

    Err(AppError::validation_with_details(
        "unrecognised timestamp format",
        json!({ "value": value }),
    ))
}

fn attach_default_offset(naive: NaiveDateTime, original: &str) -> AppResult<DateTime<FixedOffset>> {
    naive
        .and_local_timezone(default_offset())
        .single()
        .ok_or_else(|| {
            AppError::validation_with_details(
                "timestamp cannot be placed in the default offset",
                json!({ "value": original }),
            )
        })
}

/// `19-07-2025T12:34:55` -> `2025-07-19T12:34:55`.
fn reorder_day_first(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    if bytes.len() < 10 || bytes[2] != b'-' || bytes[5] != b'-' {
        return None;
    }
    let all_digits = [0, 1, 3, 4, 6, 7, 8, 9]
        .iter()
        .all(|&idx| bytes[idx].is_ascii_digit());
    if !all_digits {
        return None;
    }
    Some(format!(
        "{}-{}-{}{}",
        &value[6..10],
        &value[3..5],
        &value[0..2],
        &value[10..]
    ))
}

pub fn format_datetime(dt: DateTime<FixedOffset>) -> String {
    normalize(dt).to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub fn add_minutes(dt: DateTime<FixedOffset>, minutes: i64) -> AppResult<DateTime<FixedOffset>> {
    dt.checked_add_signed(Duration::minutes(minutes))
        .ok_or_else(|| AppError::validation("time arithmetic out of range"))
}

pub fn add_days(dt: DateTime<FixedOffset>, days: i64) -> AppResult<DateTime<FixedOffset>> {
    dt.checked_add_signed(Duration::days(days))
        .ok_or_else(|| AppError::validation("date arithmetic out of range"))
}

/// Midnight of the instant's calendar day in the default offset.
pub fn day_start(dt: DateTime<FixedOffset>) -> AppResult<DateTime<FixedOffset>> {
    at_clock(dt, 0, 0)
}

/// Same calendar day (default offset) at `hour:minute`.
pub fn at_clock(dt: DateTime<FixedOffset>, hour: u32, minute: u32) -> AppResult<DateTime<FixedOffset>> {
    let local = normalize(dt);
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::validation(format!("invalid clock time {hour}:{minute:02}")))?;
    attach_default_offset(local.date_naive().and_time(time), &local.to_rfc3339())
}

pub fn local_hour(dt: DateTime<FixedOffset>) -> u32 {
    normalize(dt).hour()
}

pub fn local_minute(dt: DateTime<FixedOffset>) -> u32 {
    normalize(dt).minute()
}

pub fn weekday_of(dt: DateTime<FixedOffset>) -> Weekday {
    normalize(dt).weekday()
}

/// Saturday moves two days, Sunday one; weekdays are returned unchanged.
pub fn roll_past_weekend(dt: DateTime<FixedOffset>) -> AppResult<DateTime<FixedOffset>> {
    match weekday_of(dt) {
        Weekday::Sat => add_days(dt, 2),
        Weekday::Sun => add_days(dt, 1),
        _ => Ok(dt),
    }
}

/// Next occurrence of `target` strictly after the reference day.
pub fn next_weekday(
    reference: DateTime<FixedOffset>,
    target: Weekday,
) -> AppResult<DateTime<FixedOffset>> {
    let current = weekday_of(reference).num_days_from_monday() as i64;
    let mut days_ahead = target.num_days_from_monday() as i64 - current;
    if days_ahead <= 0 {
        days_ahead += 7;
    }
    add_days(reference, days_ahead)
}

/// Parses `HH:MM`, `H`, `HH:MM:SS` and `H:MM am/pm` style clock strings.
///
/// Anything unparseable yields `None`, which callers treat as "no constraint".
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let lowered = value.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let (body, meridiem) = split_meridiem(&lowered);
    let mut parts = body.trim().split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(raw) => raw.trim().parse().ok()?,
        None => 0,
    };

    clock_from_parts(hour, minute, meridiem)
}

/// 12-hour values must be 1..=12 when a meridiem is present.
pub(crate) fn clock_from_parts(
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
) -> Option<NaiveTime> {
    let hour = match meridiem {
        Some(_) if hour == 0 || hour > 12 => return None,
        Some(Meridiem::Pm) if hour < 12 => hour + 12,
        Some(Meridiem::Am) if hour == 12 => 0,
        _ => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Meridiem {
    Am,
    Pm,
}

pub(crate) fn meridiem_from(raw: &str) -> Option<Meridiem> {
    match raw.trim().to_ascii_lowercase().replace('.', "").as_str() {
        "am" => Some(Meridiem::Am),
        "pm" => Some(Meridiem::Pm),
        _ => None,
    }
}

fn split_meridiem(value: &str) -> (&str, Option<Meridiem>) {
    for suffix in ["a.m.", "p.m.", "a.m", "p.m", "am", "pm"] {
        if let Some(body) = value.strip_suffix(suffix) {
            return (body, meridiem_from(suffix));
        }
    }
    (value, None)
}
