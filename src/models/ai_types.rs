use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::interval::Interval;
use crate::models::preference::{PreferenceSignal, TimeRange, Urgency};

pub const DEFAULT_SELECTION_REASON: &str = "default";

/// Context handed to the slot-selection step alongside the ranked slots.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SelectionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_constraints: Option<String>,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    pub email_content: String,
}

impl SelectionContext {
    pub fn from_preference(preference: &PreferenceSignal, email_content: &str) -> Self {
        Self {
            time_constraints: preference.time_constraints.clone(),
            urgency: preference.urgency.unwrap_or_default(),
            preferred_time: preference.preferred_time,
            time_range: preference.time_range,
            email_content: email_content.to_string(),
        }
    }
}

/// 1-based pick among the offered slots. The index is not trusted; callers clamp it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotChoice {
    pub index: i64,
    pub reason: String,
}

impl Default for SlotChoice {
    fn default() -> Self {
        Self {
            index: 1,
            reason: DEFAULT_SELECTION_REASON.to_string(),
        }
    }
}

impl SlotChoice {
    pub fn from_response(value: &JsonValue) -> Option<Self> {
        let index = ["selected_slot_number", "slot_number", "index"]
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(|raw| match raw {
                JsonValue::Number(number) => number.as_i64(),
                JsonValue::String(text) => text.trim().parse().ok(),
                _ => None,
            })?;
        let reason = value
            .get("reason")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self { index, reason })
    }
}

/// Natural-language side of scheduling. Implementations never fail: they hand back
/// the documented defaults instead.
#[async_trait::async_trait]
pub trait PreferenceExtractor: Send + Sync {
    /// Duration, urgency and the raw constraint phrase. Defaults to 30 minutes, normal.
    async fn parse_preferences(&self, email_content: &str) -> PreferenceSignal;

    /// Day/time hints relative to `reference`. Defaults to an empty signal.
    async fn extract_datetime_preference(
        &self,
        email_content: &str,
        reference: DateTime<FixedOffset>,
    ) -> PreferenceSignal;

    /// Picks one of `candidates` by 1-based index. Defaults to index 1.
    async fn select_best_slot(
        &self,
        candidates: &[Interval],
        duration_minutes: u32,
        context: &SelectionContext,
    ) -> SlotChoice;
}
