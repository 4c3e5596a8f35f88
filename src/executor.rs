//! Request execution against the inference endpoint.
//!
//! One call per prompt. Transport-level failures (connect, DNS, timeout)
//! are retried a bounded number of times; application errors (any non-2xx)
//! are recorded as-is and never retried.

use anyhow::Context;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::HarnessConfig;
use crate::corpus::Prompt;
use crate::record::{Outcome, RequestRecord};

/// Raw error text kept on failed records, truncated to this many bytes.
const ERROR_TEXT_MAX: usize = 512;

/// Base delay for exponential retry backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Token and timing telemetry extracted from a success body.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UsageStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub prompt_eval_duration_s: f64,
    pub eval_duration_s: f64,
}

/// Issues one HTTP request per prompt with timeout and bounded retry.
pub struct RequestExecutor {
    client: Client,
    config: HarnessConfig,
}

impl RequestExecutor {
    pub fn new(config: HarnessConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.concurrency)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Execute one request. Never fails: every failure mode folds into the
    /// returned record's outcome.
    pub async fn execute(&self, seq: u64, prompt: &Prompt) -> RequestRecord {
        let body = build_request_body(&self.config, prompt);
        let start_iso = Utc::now();
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            let result = self
                .client
                .post(&self.config.endpoint)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        // A malformed or truncated success body still counts
                        // as success with zero token counts: the request
                        // did succeed at the transport and application level.
                        let text = response.text().await.unwrap_or_default();
                        let usage = parse_usage(&text);
                        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                        tracing::debug!(seq, latency_ms, "request succeeded");
                        return RequestRecord {
                            seq,
                            start_iso,
                            end_iso: Utc::now(),
                            latency_ms,
                            outcome: Outcome::Success,
                            http_code: Some(status.as_u16()),
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                            prompt_eval_duration_s: usage.prompt_eval_duration_s,
                            eval_duration_s: usage.eval_duration_s,
                            error: None,
                        };
                    }

                    // Application error: record immediately, never retry.
                    let code = status.as_u16();
                    let text = response.text().await.unwrap_or_default();
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    tracing::debug!(seq, code, "request rejected by server");
                    return RequestRecord {
                        seq,
                        start_iso,
                        end_iso: Utc::now(),
                        latency_ms,
                        outcome: Outcome::HttpError,
                        http_code: Some(code),
                        prompt_tokens: 0,
                        completion_tokens: 0,
                        prompt_eval_duration_s: 0.0,
                        eval_duration_s: 0.0,
                        error: Some(truncate_error(&text)),
                    };
                }

                Err(e) => {
                    if attempt < self.config.max_retries {
                        let delay = RETRY_BASE_DELAY_MS * 2_u64.pow(attempt);
                        tracing::warn!(
                            seq,
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            error = %e,
                            "transport failure, retrying after {}ms",
                            delay
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    let outcome = if e.is_timeout() {
                        Outcome::Timeout
                    } else {
                        Outcome::TransportError
                    };
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    tracing::warn!(seq, outcome = %outcome, error = %e, "request failed");
                    return RequestRecord {
                        seq,
                        start_iso,
                        end_iso: Utc::now(),
                        latency_ms,
                        outcome,
                        http_code: None,
                        prompt_tokens: 0,
                        completion_tokens: 0,
                        prompt_eval_duration_s: 0.0,
                        eval_duration_s: 0.0,
                        error: Some(truncate_error(&e.to_string())),
                    };
                }
            }
        }
    }
}

/// Build the request body: model, prompt content, a do-not-stream flag and
/// the generation-length cap.
pub fn build_request_body(config: &HarnessConfig, prompt: &Prompt) -> Value {
    let options = serde_json::json!({
        "num_predict": config.max_tokens,
        "temperature": config.temperature,
    });

    match prompt {
        Prompt::Text(text) => serde_json::json!({
            "model": config.model,
            "prompt": text,
            "stream": false,
            "options": options,
        }),
        Prompt::Chat(turns) => serde_json::json!({
            "model": config.model,
            "messages": turns,
            "stream": false,
            "options": options,
        }),
    }
}

/// Parse a success body permissively.
///
/// Accepts an OpenAI-style `usage` block or native
/// `eval_count`/`prompt_eval_count`/`eval_duration`/`prompt_eval_duration`
/// fields (durations in nanoseconds). Absent fields yield zero, never a
/// failure.
pub fn parse_usage(body: &str) -> UsageStats {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return UsageStats::default();
    };

    let mut usage = UsageStats::default();

    if let Some(block) = value.get("usage") {
        usage.prompt_tokens = block
            .get("prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        usage.completion_tokens = block
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
    }

    if let Some(n) = value.get("eval_count").and_then(Value::as_u64) {
        usage.completion_tokens = n;
    }
    if let Some(n) = value.get("prompt_eval_count").and_then(Value::as_u64) {
        usage.prompt_tokens = n;
    }
    if let Some(ns) = value.get("eval_duration").and_then(Value::as_u64) {
        usage.eval_duration_s = ns as f64 / 1e9;
    }
    if let Some(ns) = value.get("prompt_eval_duration").and_then(Value::as_u64) {
        usage.prompt_eval_duration_s = ns as f64 / 1e9;
    }

    usage
}

fn truncate_error(text: &str) -> String {
    if text.len() <= ERROR_TEXT_MAX {
        return text.to_string();
    }
    // Truncate on a char boundary.
    let mut end = ERROR_TEXT_MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
