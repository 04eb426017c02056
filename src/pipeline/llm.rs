//! LLM interaction: the provider capability and the retrying JSON client.
//!
//! This module is intentionally thin. Prompt text lives in
//! [`crate::prompts`], transport details live in [`crate::providers`], and
//! this file only knows how to turn "prompt in" into "JSON value out".
//!
//! ## Retry Strategy
//!
//! The whole call is retried: the HTTP request, fence stripping and the JSON
//! parse. Models under load return truncated or prose-wrapped JSON about as
//! often as they return 503s, and both usually clear on the next attempt.
//! Backoff is linear (`base_delay × n` before attempt `n + 1`); with the
//! default 2 s base and 3 attempts the waits are 2 s → 4 s.
//!
//! Sleeping uses `tokio::time::sleep`, so a backing-off request never blocks
//! a worker thread.

use crate::error::LlmError;
use crate::progress::ProgressCallback;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// A text-generation backend.
///
/// Implementations send one prompt and return the model's raw text. They do
/// not retry and do not parse; [`LlmClient`] does both.
pub trait LlmProvider: Send + Sync {
    /// Short provider identifier used in logs and errors (`"gemini"`).
    fn name(&self) -> &str;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Send `prompt` and return the generated text.
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>>;
}

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retrying.
    pub max_attempts: u32,
    /// Unit of the linear backoff.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait after the 1-indexed `attempt` has failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// A parsed response plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub value: Value,
    pub attempts: u32,
}

/// Calls a provider and parses its answer as JSON, retrying per [`RetryPolicy`].
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    progress: Option<ProgressCallback>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send `prompt` and return the parsed JSON value.
    pub async fn call(&self, prompt: &str) -> Result<Value, LlmError> {
        self.call_counted(prompt).await.map(|r| r.value)
    }

    /// Like [`call`](Self::call), also reporting how many attempts were used.
    pub async fn call_counted(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let name = self.provider.name().to_string();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let start = Instant::now();
            let result = match self.provider.complete(prompt).await {
                Ok(text) => parse_json_response(&name, &text),
                Err(e) => Err(e),
            };

            let err = match result {
                Ok(value) => {
                    debug!(
                        provider = %name,
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "LLM response parsed"
                    );
                    return Ok(LlmResponse { value, attempts: attempt });
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                warn!(provider = %name, attempt, "LLM call failed, not retrying: {err}");
                return Err(err);
            }
            if attempt == max_attempts {
                warn!(provider = %name, attempt, "LLM call failed, attempts exhausted: {err}");
                return Err(LlmError::RetriesExhausted {
                    provider: name,
                    attempts: max_attempts,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                provider = %name,
                "LLM error (attempt {attempt}/{max_attempts}): {err}. Retrying in {}ms",
                delay.as_millis()
            );
            if let Some(ref cb) = self.progress {
                cb.on_retry(attempt, max_attempts, delay, &err.to_string());
            }
            sleep(delay).await;
        }
    }
}

// ── Response cleanup ─────────────────────────────────────────────────────

/// Leading fence with an optional language tag (```` ```json ````).
static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*").expect("valid regex"));

/// Remove a surrounding markdown code fence.
///
/// Trims, drops a leading ```` ``` ```` with or without a language tag and a
/// trailing ```` ``` ````, then trims again. Text without fences is returned
/// trimmed and otherwise untouched.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(m) = RE_LEADING_FENCE.find(s) {
        s = &s[m.end()..];
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Strip fences and parse the remainder as JSON.
pub fn parse_json_response(provider: &str, text: &str) -> Result<Value, LlmError> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err(LlmError::EmptyResponse {
            provider: provider.to_string(),
        });
    }
    serde_json::from_str(cleaned).map_err(|e| LlmError::InvalidJson {
        provider: provider.to_string(),
        detail: e.to_string(),
        raw: cleaned.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of results and counts calls.
    struct Scripted {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test-model"
        }

        fn complete<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
            *self.calls.lock().unwrap() += 1;
            let next = self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(LlmError::Transport {
                    provider: "scripted".into(),
                    detail: "script exhausted".into(),
                })
            });
            Box::pin(async move { next })
        }
    }

    fn transport() -> Result<String, LlmError> {
        Err(LlmError::Transport {
            provider: "scripted".into(),
            detail: "connection reset".into(),
        })
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_fences("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
    }

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let plain = parse_json_response("p", "{\"a\": [1, 2]}").unwrap();
        let fenced = parse_json_response("p", "```json\n{\"a\": [1, 2]}\n```").unwrap();
        let bare = parse_json_response("p", "```\n{\"a\": [1, 2]}\n```").unwrap();
        assert_eq!(plain, fenced);
        assert_eq!(plain, bare);
    }

    #[test]
    fn unfenced_text_only_trimmed() {
        assert_eq!(strip_code_fences("\n  {\"x\": \"```\"}  \n"), "{\"x\": \"```\"}");
    }

    #[test]
    fn invalid_json_keeps_raw_text() {
        match parse_json_response("gemini", "```json\nnot json\n```") {
            Err(LlmError::InvalidJson { provider, raw, .. }) => {
                assert_eq!(provider, "gemini");
                assert_eq!(raw, "not json");
            }
            other => panic!("expected InvalidJson, got {other:?}"),
        }
    }

    #[test]
    fn blank_response_is_empty() {
        assert!(matches!(
            parse_json_response("groq", "```\n```"),
            Err(LlmError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn linear_delays() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_after(1), Duration::from_secs(2));
        assert_eq!(p.delay_after(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let provider = Scripted::new(vec![
            transport(),
            Ok("```json\n{\"ok\": true}\n```".into()),
        ]);
        let client = LlmClient::new(provider.clone(), RetryPolicy::default());
        let r = client.call_counted("prompt").await.unwrap();
        assert_eq!(r.value, json!({"ok": true}));
        assert_eq!(r.attempts, 2);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts_with_linear_backoff() {
        let provider = Scripted::new(vec![transport(), transport(), transport(), transport()]);
        let client = LlmClient::new(provider.clone(), RetryPolicy::default());

        let start = tokio::time::Instant::now();
        let err = client.call("prompt").await.unwrap_err();
        let waited = start.elapsed();

        assert_eq!(provider.calls(), 3);
        // 2 s after the first failure, 4 s after the second, none after the last.
        assert!(waited >= Duration::from_secs(6), "waited {waited:?}");
        assert!(waited < Duration::from_secs(7), "waited {waited:?}");
        match err {
            LlmError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, LlmError::Transport { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn parse_failures_are_retried() {
        let provider = Scripted::new(vec![Ok("Sure! Here is the JSON:".into()), Ok("{}".into())]);
        let client = LlmClient::new(provider.clone(), RetryPolicy::default());
        assert_eq!(client.call("p").await.unwrap(), json!({}));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_is_not_retried() {
        let provider = Scripted::new(vec![Err(LlmError::Auth {
            provider: "scripted".into(),
            status: 401,
        })]);
        let client = LlmClient::new(provider.clone(), RetryPolicy::default());
        let err = client.call("p").await.unwrap_err();
        assert!(matches!(err, LlmError::Auth { status: 401, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy() {
        let provider = Scripted::new(vec![transport()]);
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_secs(2),
        };
        let client = LlmClient::new(provider.clone(), policy);
        let err = client.call("p").await.unwrap_err();
        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(provider.calls(), 1);
    }
}
