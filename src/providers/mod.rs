//! Concrete [`LlmProvider`] implementations and the dispatcher that picks one.
//!
//! | Provider | Module | Wire format |
//! |----------|--------|-------------|
//! | `gemini` | [`gemini`] | Generative Language `generateContent` |
//! | `groq`   | [`openai_compat`] | OpenAI-compatible `chat/completions` |
//! | `openai` | [`openai_compat`] | OpenAI `chat/completions` |
//!
//! Providers only speak HTTP. Retrying, fence stripping and JSON parsing
//! happen in [`crate::pipeline::llm::LlmClient`].

pub mod gemini;
pub mod openai_compat;

use crate::config::{AnalyzerConfig, ProviderKind};
use crate::error::LlmError;
use crate::pipeline::llm::LlmProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

/// Sampling and transport settings shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl GenerationSettings {
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            timeout: config.request_timeout(),
        }
    }
}

/// Build the provider selected by the configuration.
///
/// A pre-built [`AnalyzerConfig::provider`] wins. Otherwise the provider name
/// is parsed (unknown → [`LlmError::UnsupportedProvider`]) and its credential
/// must be present (absent → [`LlmError::MissingCredential`]); there is no
/// fallback to another provider.
pub fn create_provider(config: &AnalyzerConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let (kind, settings) = config.active_settings()?;
    let api_key = settings
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| LlmError::MissingCredential {
            provider: kind.as_str().to_string(),
            env_var: kind.key_env_var().to_string(),
        })?;
    let model = config.model.clone().unwrap_or_else(|| settings.model.clone());
    let generation = GenerationSettings::from_config(config);

    info!(provider = %kind, model = %model, "LLM provider selected");

    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(
            &settings.base_url,
            api_key,
            model,
            generation,
        )?),
        ProviderKind::Groq | ProviderKind::OpenAi => Arc::new(OpenAiCompatProvider::new(
            kind.as_str(),
            &settings.base_url,
            api_key,
            model,
            generation,
        )?),
    };
    Ok(provider)
}

// ── Shared HTTP helpers ──────────────────────────────────────────────────

fn build_http_client(provider: &str, timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Transport {
            provider: provider.to_string(),
            detail: e.to_string(),
        })
}

fn transport_error(provider: &str, timeout: Duration, e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout {
            provider: provider.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        LlmError::Transport {
            provider: provider.to_string(),
            detail: e.to_string(),
        }
    }
}

/// Longest error body kept in an [`LlmError::Http`].
const MAX_ERROR_BODY: usize = 2_000;

fn status_error(provider: &str, status: reqwest::StatusCode, body: String) -> LlmError {
    let code = status.as_u16();
    if code == 401 || code == 403 {
        return LlmError::Auth {
            provider: provider.to_string(),
            status: code,
        };
    }
    let mut body = body;
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    LlmError::Http {
        provider: provider.to_string(),
        status: code,
        body,
    }
}

/// Send a prepared request and return the response body on 2xx.
async fn send_json(
    provider: &str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
) -> Result<String, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, timeout, e))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, timeout, e))?;
    if !status.is_success() {
        return Err(status_error(provider, status, body));
    }
    Ok(body)
}
