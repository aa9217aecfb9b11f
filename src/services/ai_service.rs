use std::collections::HashMap;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AiErrorCode, AppError, AppResult};
use crate::models::ai_types::{PreferenceExtractor, SelectionContext, SlotChoice};
use crate::models::interval::Interval;
use crate::models::preference::{PreferenceSignal, Urgency, DEFAULT_DURATION_MINUTES};
use crate::services::prompt_templates::{
    build_datetime_extraction_payload, build_preference_parse_payload,
    build_slot_selection_payload, datetime_extraction_system_prompt,
    preference_parsing_system_prompt, slot_selection_system_prompt,
};
use crate::services::settings_service::LlmSettings;
use crate::utils::redact::redact_sensitive_data;

static JSON_OBJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json object pattern compiles"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatOperation {
    ParsePreferences,
    ExtractDatetime,
    SelectSlot,
}

impl ChatOperation {
    fn as_str(self) -> &'static str {
        match self {
            ChatOperation::ParsePreferences => "parsePreferences",
            ChatOperation::ExtractDatetime => "extractDatetimePreference",
            ChatOperation::SelectSlot => "selectBestSlot",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            ChatOperation::ParsePreferences => preference_parsing_system_prompt(),
            ChatOperation::ExtractDatetime => datetime_extraction_system_prompt(),
            ChatOperation::SelectSlot => slot_selection_system_prompt(),
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            ChatOperation::ParsePreferences | ChatOperation::ExtractDatetime => 200,
            ChatOperation::SelectSlot => 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatInvocationResult {
    pub content: JsonValue,
    pub tokens_used: HashMap<String, u64>,
    pub latency_ms: u128,
    pub correlation_id: String,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint (vLLM, DeepSeek).
pub struct ChatCompletionClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    retry_delays: Vec<StdDuration>,
}

impl ChatCompletionClient {
    pub fn try_new(settings: &LlmSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(StdDuration::from_secs(90)))
            .build()
            .map_err(|err| AppError::other(format!("failed to build LLM HTTP client: {err}")))?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            endpoint: chat_endpoint(&settings.base_url),
            model: settings.model.clone(),
            retry_delays: settings.retry_delays(),
        })
    }

    pub async fn invoke_chat(
        &self,
        operation: ChatOperation,
        payload: JsonValue,
    ) -> AppResult<ChatInvocationResult> {
        let correlation_id = Uuid::new_v4().to_string();
        let sanitized_payload = redact_sensitive_data(&payload)
            .unwrap_or_else(|_| JsonValue::String("<redacted>".to_string()));
        let sanitized_payload_str = serde_json::to_string(&sanitized_payload)
            .unwrap_or_else(|_| "\"<redacted>\"".to_string());

        let request_body = self.build_request_body(operation, &payload);
        let schedule: Vec<StdDuration> = std::iter::once(StdDuration::ZERO)
            .chain(self.retry_delays.iter().copied())
            .collect();

        let mut last_error: Option<AppError> = None;

        for (attempt, delay) in schedule.iter().enumerate() {
            if !delay.is_zero() {
                sleep(*delay).await;
            }
            let is_last = attempt == schedule.len() - 1;

            debug!(
                target: "app::ai::llm",
                operation = operation.as_str(),
                attempt = attempt + 1,
                correlation_id = %correlation_id,
                payload = %sanitized_payload_str,
                "invoking chat completion"
            );

            let start = Instant::now();
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let resp = match response {
                Ok(resp) => resp,
                Err(err) => {
                    let (error, retryable) = Self::error_from_reqwest(err, &correlation_id);
                    warn!(
                        target: "app::ai::llm",
                        correlation_id = %correlation_id,
                        retryable,
                        "chat completion request failed"
                    );
                    if !retryable || is_last {
                        return Err(error);
                    }
                    last_error = Some(error);
                    continue;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let (error, retryable) = Self::map_http_error(status, &correlation_id);
                warn!(
                    target: "app::ai::llm",
                    correlation_id = %correlation_id,
                    status = status.as_u16(),
                    retryable,
                    "chat completion returned non-success status"
                );
                if !retryable || is_last {
                    return Err(error);
                }
                last_error = Some(error);
                continue;
            }

            let latency_ms = start.elapsed().as_millis();
            let body: JsonValue = match resp.json().await {
                Ok(body) => body,
                Err(err) => {
                    let (error, retryable) = if err.is_timeout() {
                        Self::error_from_reqwest(err, &correlation_id)
                    } else {
                        (
                            AppError::ai_with_details(
                                AiErrorCode::InvalidResponse,
                                "failed to decode chat completion response",
                                Some(correlation_id.as_str()),
                                Some(json!({ "reason": err.to_string() })),
                            ),
                            false,
                        )
                    };
                    if !retryable || is_last {
                        return Err(error);
                    }
                    last_error = Some(error);
                    continue;
                }
            };

            let content = body
                .pointer("/choices/0/message/content")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| {
                    AppError::ai_with_details(
                        AiErrorCode::InvalidResponse,
                        "chat completion response has no message content",
                        Some(correlation_id.as_str()),
                        Some(json!({ "reason": "missing_message_content" })),
                    )
                })?;
            let content_value = Self::parse_content(content, &correlation_id)?;
            let tokens_used = Self::extract_tokens(&body);

            debug!(
                target: "app::ai::llm",
                operation = operation.as_str(),
                correlation_id = %correlation_id,
                latency_ms,
                tokens = ?tokens_used,
                "chat completion succeeded"
            );

            return Ok(ChatInvocationResult {
                content: content_value,
                tokens_used,
                latency_ms,
                correlation_id,
            });
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::ai_with_details(
                AiErrorCode::ProviderUnavailable,
                "chat completion failed",
                Some(correlation_id.as_str()),
                None,
            )
        }))
    }

    fn build_request_body(&self, operation: ChatOperation, payload: &JsonValue) -> JsonValue {
        let user_content = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
        json!({
            "model": self.model,
            "temperature": 0.0,
            "max_tokens": operation.max_tokens(),
            "messages": [
                { "role": "system", "content": operation.system_prompt() },
                { "role": "user", "content": user_content }
            ]
        })
    }

    /// Takes the outermost `{...}` in the reply; fences and chatter around it are ignored.
    fn parse_content(content: &str, correlation_id: &str) -> AppResult<JsonValue> {
        let object = JSON_OBJECT_PATTERN.find(content).ok_or_else(|| {
            AppError::ai_with_details(
                AiErrorCode::InvalidResponse,
                "chat completion content contains no JSON object",
                Some(correlation_id),
                Some(json!({ "reason": "missing_json_object" })),
            )
        })?;

        serde_json::from_str(object.as_str()).map_err(|err| {
            AppError::ai_with_details(
                AiErrorCode::InvalidResponse,
                format!("chat completion content is not valid JSON: {err}"),
                Some(correlation_id),
                Some(json!({ "reason": "invalid_json" })),
            )
        })
    }

    fn extract_tokens(body: &JsonValue) -> HashMap<String, u64> {
        let mut tokens = HashMap::new();
        if let Some(usage) = body.get("usage") {
            for (field, key) in [
                ("prompt_tokens", "prompt"),
                ("completion_tokens", "completion"),
                ("total_tokens", "total"),
            ] {
                if let Some(value) = usage.get(field).and_then(JsonValue::as_u64) {
                    tokens.insert(key.to_string(), value);
                }
            }
        }
        tokens
    }

    fn map_http_error(status: StatusCode, correlation_id: &str) -> (AppError, bool) {
        let (code, message, retryable) = match status {
            StatusCode::UNAUTHORIZED => (
                AiErrorCode::MissingApiKey,
                "LLM API key is invalid or unauthorised".to_string(),
                false,
            ),
            StatusCode::FORBIDDEN => (
                AiErrorCode::Forbidden,
                "LLM API access forbidden".to_string(),
                false,
            ),
            StatusCode::TOO_MANY_REQUESTS => (
                AiErrorCode::RateLimited,
                "LLM API rate limit reached".to_string(),
                true,
            ),
            status if status.is_server_error() => (
                AiErrorCode::ProviderUnavailable,
                format!("LLM service unavailable (status {})", status.as_u16()),
                true,
            ),
            StatusCode::BAD_REQUEST => (
                AiErrorCode::InvalidRequest,
                "LLM rejected the request format".to_string(),
                false,
            ),
            StatusCode::NOT_FOUND => (
                AiErrorCode::InvalidRequest,
                "LLM endpoint not found".to_string(),
                false,
            ),
            status => (
                AiErrorCode::Unknown,
                format!("LLM returned status {}", status.as_u16()),
                false,
            ),
        };
        (
            AppError::ai_with_details(code, message, Some(correlation_id), None),
            retryable,
        )
    }

    fn error_from_reqwest(err: reqwest::Error, correlation_id: &str) -> (AppError, bool) {
        if err.is_timeout() {
            (
                AppError::ai_with_details(
                    AiErrorCode::HttpTimeout,
                    "LLM request timed out",
                    Some(correlation_id),
                    None,
                ),
                true,
            )
        } else if err.is_connect() {
            (
                AppError::ai_with_details(
                    AiErrorCode::ProviderUnavailable,
                    "could not connect to LLM service",
                    Some(correlation_id),
                    None,
                ),
                true,
            )
        } else if let Some(status) = err.status() {
            Self::map_http_error(status, correlation_id)
        } else {
            (
                AppError::ai_with_details(
                    AiErrorCode::Unknown,
                    format!("LLM request failed: {err}"),
                    Some(correlation_id),
                    None,
                ),
                false,
            )
        }
    }
}

/// `.../v1` bases get `/chat/completions`; bare hosts get `/v1/chat/completions`.
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// Preference extraction backed by the chat model. Every failure is logged and
/// replaced by the operation's default.
pub struct LlmPreferenceExtractor {
    client: ChatCompletionClient,
}

impl LlmPreferenceExtractor {
    pub fn new(client: ChatCompletionClient) -> Self {
        Self { client }
    }

    pub fn try_from_settings(settings: &LlmSettings) -> AppResult<Self> {
        Ok(Self::new(ChatCompletionClient::try_new(settings)?))
    }
}

#[async_trait::async_trait]
impl PreferenceExtractor for LlmPreferenceExtractor {
    async fn parse_preferences(&self, email_content: &str) -> PreferenceSignal {
        let payload = build_preference_parse_payload(email_content);
        match self
            .client
            .invoke_chat(ChatOperation::ParsePreferences, payload)
            .await
        {
            Ok(result) => {
                let mut signal = PreferenceSignal::from_parse_response(&result.content);
                signal.duration_minutes.get_or_insert(DEFAULT_DURATION_MINUTES);
                signal.urgency.get_or_insert(Urgency::Normal);
                signal
            }
            Err(err) => {
                warn!(
                    target: "app::ai::llm",
                    error = %err,
                    "preference parsing failed; using defaults"
                );
                PreferenceSignal::parse_default()
            }
        }
    }

    async fn extract_datetime_preference(
        &self,
        email_content: &str,
        reference: DateTime<FixedOffset>,
    ) -> PreferenceSignal {
        let payload = build_datetime_extraction_payload(email_content, reference);
        match self
            .client
            .invoke_chat(ChatOperation::ExtractDatetime, payload)
            .await
        {
            Ok(result) => PreferenceSignal::from_datetime_response(&result.content),
            Err(err) => {
                warn!(
                    target: "app::ai::llm",
                    error = %err,
                    "datetime extraction failed; no date constraints applied"
                );
                PreferenceSignal::default()
            }
        }
    }

    async fn select_best_slot(
        &self,
        candidates: &[Interval],
        duration_minutes: u32,
        context: &SelectionContext,
    ) -> SlotChoice {
        if candidates.is_empty() {
            return SlotChoice::default();
        }

        let payload = build_slot_selection_payload(candidates, duration_minutes, context);
        match self.client.invoke_chat(ChatOperation::SelectSlot, payload).await {
            Ok(result) => SlotChoice::from_response(&result.content).unwrap_or_else(|| {
                warn!(
                    target: "app::ai::llm",
                    correlation_id = %result.correlation_id,
                    "slot selection reply has no usable index"
                );
                SlotChoice::default()
            }),
            Err(err) => {
                warn!(
                    target: "app::ai::llm",
                    error = %err,
                    "slot selection failed; taking the top ranked slot"
                );
                SlotChoice::default()
            }
        }
    }
}

pub mod testing {
    use super::*;

    /// Exposes status mapping to integration tests without widening the public API.
    pub fn map_http_error(status: StatusCode) -> (AppError, bool) {
        ChatCompletionClient::map_http_error(status, "test-correlation-id")
    }

    pub fn parse_content(content: &str) -> AppResult<JsonValue> {
        ChatCompletionClient::parse_content(content, "test-correlation-id")
    }

    pub fn chat_endpoint(base_url: &str) -> String {
        super::chat_endpoint(base_url)
    }

    /// Settings pointing at a mock server, with retries that do not sleep.
    pub fn settings_for(base_url: &str, timeout: StdDuration, max_retries: usize) -> LlmSettings {
        LlmSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: "deepseek-ai/deepseek-llm-7b-chat".to_string(),
            api_key: "test-key".to_string(),
            http_timeout: timeout,
            max_retries,
            retry_base: StdDuration::ZERO,
        }
    }
}
