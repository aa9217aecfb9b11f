use std::path::PathBuf;
use std::time::Duration as StdDuration;

use tracing::warn;

pub const ENV_PREFIX: &str = "MEETING_ASSISTANT_";

const DEFAULT_LLM_BASE_URL: &str = "http://localhost:3000/v1";
const DEFAULT_LLM_MODEL: &str = "deepseek-ai/deepseek-llm-7b-chat";
const DEFAULT_LLM_API_KEY: &str = "NULL";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LLM_MAX_RETRIES: usize = 2;
const DEFAULT_LLM_RETRY_BASE_MS: u64 = 1_000;
const DEFAULT_CALENDAR_KEYS_DIR: &str = "Keys";
const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_CALENDAR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5001;
const DEFAULT_REQUEST_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub http_timeout: StdDuration,
    pub max_retries: usize,
    /// First retry delay; later retries double it (1s, 2s, 4s by default).
    pub retry_base: StdDuration,
}

impl LlmSettings {
    pub fn retry_delays(&self) -> Vec<StdDuration> {
        (0..self.max_retries)
            .map(|attempt| self.retry_base.saturating_mul(1u32 << attempt.min(16) as u32))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSettings {
    pub keys_dir: PathBuf,
    pub api_base: String,
    pub http_timeout: StdDuration,
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub llm: LlmSettings,
    pub calendar: CalendarSettings,
    pub collaborator_timeout: StdDuration,
    pub host: String,
    pub port: u16,
    pub log_dir: Option<PathBuf>,
    pub request_log_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SchedulerSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    /// `lookup` receives the variable name without the `MEETING_ASSISTANT_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            llm: LlmSettings {
                base_url: text("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
                model: text("LLM_MODEL", DEFAULT_LLM_MODEL),
                api_key: text("LLM_API_KEY", DEFAULT_LLM_API_KEY),
                http_timeout: StdDuration::from_secs(numeric(
                    &lookup,
                    "LLM_TIMEOUT_SECS",
                    DEFAULT_LLM_TIMEOUT_SECS,
                )),
                max_retries: numeric(&lookup, "LLM_MAX_RETRIES", DEFAULT_LLM_MAX_RETRIES),
                retry_base: StdDuration::from_millis(DEFAULT_LLM_RETRY_BASE_MS),
            },
            calendar: CalendarSettings {
                keys_dir: PathBuf::from(text("CALENDAR_KEYS_DIR", DEFAULT_CALENDAR_KEYS_DIR)),
                api_base: text("CALENDAR_API_BASE", DEFAULT_CALENDAR_API_BASE),
                http_timeout: StdDuration::from_secs(numeric(
                    &lookup,
                    "CALENDAR_TIMEOUT_SECS",
                    DEFAULT_CALENDAR_TIMEOUT_SECS,
                )),
            },
            collaborator_timeout: StdDuration::from_secs(numeric(
                &lookup,
                "COLLABORATOR_TIMEOUT_SECS",
                DEFAULT_COLLABORATOR_TIMEOUT_SECS,
            )),
            host: text("HOST", DEFAULT_HOST),
            port: numeric(&lookup, "PORT", DEFAULT_PORT),
            log_dir: lookup("LOG_DIR")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            request_log_capacity: numeric(
                &lookup,
                "REQUEST_LOG_CAPACITY",
                DEFAULT_REQUEST_LOG_CAPACITY,
            ),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn numeric<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    target: "app::settings",
                    variable = %format!("{ENV_PREFIX}{name}"),
                    value = %raw,
                    default = %default,
                    "ignoring unparseable setting"
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> SchedulerSettings {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        SchedulerSettings::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.llm.base_url, "http://localhost:3000/v1");
        assert_eq!(settings.llm.model, "deepseek-ai/deepseek-llm-7b-chat");
        assert_eq!(settings.llm.api_key, "NULL");
        assert_eq!(settings.llm.http_timeout, StdDuration::from_secs(30));
        assert_eq!(settings.calendar.keys_dir, PathBuf::from("Keys"));
        assert_eq!(settings.collaborator_timeout, StdDuration::from_secs(60));
        assert_eq!(settings.bind_address(), "0.0.0.0:5001");
        assert_eq!(settings.log_dir, None);
        assert_eq!(settings.request_log_capacity, 500);
        assert_eq!(
            settings.llm.retry_delays(),
            vec![StdDuration::from_secs(1), StdDuration::from_secs(2)]
        );
    }

    #[test]
    fn overrides_are_applied_and_bad_numbers_fall_back() {
        let settings = settings_from(&[
            ("LLM_BASE_URL", "http://vllm.internal:8000/v1"),
            ("LLM_MAX_RETRIES", "3"),
            ("PORT", "not-a-port"),
            ("COLLABORATOR_TIMEOUT_SECS", " 5 "),
            ("LOG_DIR", "/var/log/meeting-assistant"),
            ("HOST", "   "),
        ]);
        assert_eq!(settings.llm.base_url, "http://vllm.internal:8000/v1");
        assert_eq!(settings.llm.retry_delays().len(), 3);
        assert_eq!(settings.port, 5001);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.collaborator_timeout, StdDuration::from_secs(5));
        assert_eq!(
            settings.log_dir,
            Some(PathBuf::from("/var/log/meeting-assistant"))
        );
    }
}
