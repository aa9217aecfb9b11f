use crate::error::AppResult;
use serde_json::Value as JsonValue;

const REDACTED: &str = "[REDACTED]";

/// Masks free text (email bodies, subjects, event titles) before a payload is logged.
/// Structure, numbers and timestamps are left intact.
pub fn redact_sensitive_data(data: &JsonValue) -> AppResult<JsonValue> {
    Ok(redact_value(data))
}

/// Short form for a log field: character count only.
pub fn redact_text(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("{REDACTED} ({} chars)", text.chars().count())
    }
}

fn redact_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut redacted_map = serde_json::Map::new();
            for (key, val) in map {
                let redacted_val = if is_sensitive_field(key) {
                    redact_string_value(val)
                } else {
                    redact_value(val)
                };
                redacted_map.insert(key.clone(), redacted_val);
            }
            JsonValue::Object(redacted_map)
        }
        JsonValue::Array(arr) => JsonValue::Array(arr.iter().map(redact_value).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(field_name: &str) -> bool {
    let lower = field_name.to_lowercase();
    matches!(
        lower.as_str(),
        "email"
            | "emailcontent"
            | "meetingrequest"
            | "subject"
            | "summary"
            | "content"
            | "body"
            | "text"
    )
}

fn redact_string_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) if !s.is_empty() => JsonValue::String(REDACTED.to_string()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redact_request_text_fields() {
        let data = json!({
            "Request_id": "6118b54f",
            "Subject": "Budget review",
            "EmailContent": "Hi team, can we meet Thursday?",
            "Datetime": "19-07-2025T12:34:55"
        });

        let redacted = redact_sensitive_data(&data).unwrap();

        assert_eq!(redacted["Request_id"], "6118b54f");
        assert_eq!(redacted["Subject"], "[REDACTED]");
        assert_eq!(redacted["EmailContent"], "[REDACTED]");
        assert_eq!(redacted["Datetime"], "19-07-2025T12:34:55");
    }

    #[test]
    fn test_redact_nested_payloads() {
        let data = json!({
            "operation": "selectBestSlot",
            "meetingRequest": "Let's sync on the launch",
            "slots": [{"number": 1, "start": "2025-07-21T09:00:00+05:30"}],
            "messages": [{"role": "user", "content": "private"}]
        });

        let redacted = redact_sensitive_data(&data).unwrap();

        assert_eq!(redacted["operation"], "selectBestSlot");
        assert_eq!(redacted["meetingRequest"], "[REDACTED]");
        assert_eq!(redacted["slots"][0]["number"], 1);
        assert_eq!(redacted["messages"][0]["role"], "user");
        assert_eq!(redacted["messages"][0]["content"], "[REDACTED]");
    }

    #[test]
    fn test_redact_text_keeps_length_only() {
        assert_eq!(redact_text(""), "");
        assert_eq!(redact_text("hello"), "[REDACTED] (5 chars)");
    }
}
