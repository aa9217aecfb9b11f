use chrono::{NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::services::schedule_utils::{clock_from_parts, meridiem_from};

static WEEKDAY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("weekday pattern compiles")
});

static CLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(a\.m\.|p\.m\.|am\b|pm\b)?")
        .expect("clock pattern compiles")
});

static BARE_HOUR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(a\.m\.|p\.m\.|am\b|pm\b)")
        .expect("bare hour pattern compiles")
});

/// Day and clock time found in a free-text phrase such as "Monday at 9:00 AM".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedConstraint {
    pub weekday: Option<Weekday>,
    pub time: Option<NaiveTime>,
}

impl ParsedConstraint {
    pub fn is_empty(&self) -> bool {
        self.weekday.is_none() && self.time.is_none()
    }
}

pub fn parse_time_constraint(text: &str) -> ParsedConstraint {
    ParsedConstraint {
        weekday: parse_weekday(text),
        time: parse_time(text),
    }
}

fn parse_weekday(text: &str) -> Option<Weekday> {
    WEEKDAY_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|name| name.as_str().parse::<Weekday>().ok())
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    if let Some(caps) = CLOCK_PATTERN.captures(text) {
        let hour = number(&caps, 1)?;
        let minute = number(&caps, 2)?;
        let meridiem = caps.get(3).and_then(|m| meridiem_from(m.as_str()));
        return clock_from_parts(hour, minute, meridiem);
    }

    let caps = BARE_HOUR_PATTERN.captures(text)?;
    clock_from_parts(number(&caps, 1)?, 0, meridiem_from(caps.get(2)?.as_str()))
}

fn number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}
