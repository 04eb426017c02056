//! Configuration types for prospectus analysis.
//!
//! All analysis behaviour is controlled through [`AnalyzerConfig`], built via
//! its [`AnalyzerConfigBuilder`] or read from the environment with
//! [`AnalyzerConfig::from_env`]. The config is immutable once built and is
//! shared (by reference or `Arc`) across concurrent requests.
//!
//! # Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LLM_PROVIDER` | `gemini` |
//! | `GEMINI_API_KEY` / `GEMINI_MODEL` | — / `gemini-2.0-flash` |
//! | `GROQ_API_KEY` / `GROQ_MODEL` | — / `groq/compound-mini` |
//! | `OPENAI_API_KEY` / `OPENAI_MODEL` | — / `gpt-4o-mini` |
//! | `RHP_REQUEST_TIMEOUT_SECS` | `30` |
//! | `RHP_MAX_ATTEMPTS` | `3` |
//! | `RHP_RETRY_DELAY_MS` | `2000` |
//! | `PDFIUM_LIB_PATH` | system library |

use crate::error::{AnalysisError, LlmError};
use crate::pipeline::llm::{LlmProvider, RetryPolicy};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// The LLM providers we can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Google Gemini (`generateContent` REST API).
    Gemini,
    /// Groq (OpenAI-compatible chat completions).
    Groq,
    /// OpenAI chat completions.
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn key_env_var(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAi),
            _ => Err(LlmError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Model, credential and endpoint for one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ProviderSettings {
    fn new(model: &str, base_url: &str) -> Self {
        Self {
            model: model.to_string(),
            api_key: None,
            base_url: base_url.to_string(),
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration for a prospectus analysis.
///
/// Built via [`AnalyzerConfig::builder()`], [`AnalyzerConfig::from_env()`] or
/// [`AnalyzerConfig::default()`].
///
/// # Example
/// ```rust
/// use rhp_analyst::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .provider_name("groq")
///     .api_key("groq", "gsk-test")
///     .max_attempts(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.provider_name, "groq");
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Active provider name. Parsed lazily so an unsupported name surfaces as
    /// an upstream [`LlmError::UnsupportedProvider`] on first use.
    pub provider_name: String,

    /// Overrides the active provider's model when set.
    pub model: Option<String>,

    pub gemini: ProviderSettings,
    pub groq: ProviderSettings,
    pub openai: ProviderSettings,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LlmProvider>>,

    /// Sampling temperature. Default: 1.0.
    pub temperature: f32,

    /// Nucleus sampling. Default: 1.0.
    pub top_p: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// The analysis JSON for a large prospectus routinely runs past 4 000
    /// tokens once yearly metrics are included.
    pub max_tokens: u32,

    /// Per-request timeout for provider calls, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Total attempts per LLM call, including the first. Default: 3.
    pub max_attempts: u32,

    /// Base delay between attempts in milliseconds. Default: 2000.
    ///
    /// The wait before attempt `n + 1` is `retry_delay_ms × n`.
    pub retry_delay_ms: u64,

    /// Full path to the PDFium shared library. `None` binds the system library.
    pub pdfium_library: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            provider_name: ProviderKind::Gemini.as_str().to_string(),
            model: None,
            gemini: ProviderSettings::new(
                "gemini-2.0-flash",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            groq: ProviderSettings::new("groq/compound-mini", "https://api.groq.com/openai/v1"),
            openai: ProviderSettings::new("gpt-4o-mini", "https://api.openai.com/v1"),
            provider: None,
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 8192,
            request_timeout_secs: 30,
            max_attempts: 3,
            retry_delay_ms: 2000,
            pdfium_library: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("gemini", &self.gemini)
            .field("groq", &self.groq)
            .field("openai", &self.openai)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LlmProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("pdfium_library", &self.pdfium_library)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from process environment variables.
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(name) = get("LLM_PROVIDER") {
            builder = builder.provider_name(name);
        }
        for kind in [ProviderKind::Gemini, ProviderKind::Groq, ProviderKind::OpenAi] {
            if let Some(key) = get(kind.key_env_var()) {
                builder = builder.api_key(kind.as_str(), key);
            }
        }
        if let Some(model) = get("GEMINI_MODEL") {
            builder.config.gemini.model = model;
        }
        if let Some(model) = get("GROQ_MODEL") {
            builder.config.groq.model = model;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            builder.config.openai.model = model;
        }
        if let Some(v) = get("RHP_REQUEST_TIMEOUT_SECS") {
            builder = builder.request_timeout_secs(parse_env("RHP_REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("RHP_MAX_ATTEMPTS") {
            builder = builder.max_attempts(parse_env("RHP_MAX_ATTEMPTS", &v)?);
        }
        if let Some(v) = get("RHP_RETRY_DELAY_MS") {
            builder = builder.retry_delay_ms(parse_env("RHP_RETRY_DELAY_MS", &v)?);
        }
        if let Some(path) = get("PDFIUM_LIB_PATH") {
            builder = builder.pdfium_library(path);
        }

        builder.build()
    }

    /// Settings of the provider named by `provider_name`.
    pub fn active_settings(&self) -> Result<(ProviderKind, &ProviderSettings), LlmError> {
        let kind: ProviderKind = self.provider_name.parse()?;
        let settings = match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Groq => &self.groq,
            ProviderKind::OpenAi => &self.openai,
        };
        Ok((kind, settings))
    }

    /// Model that will be requested from the active provider.
    pub fn effective_model(&self) -> Option<String> {
        if let Some(ref provider) = self.provider {
            return Some(provider.model().to_string());
        }
        if let Some(ref m) = self.model {
            return Some(m.clone());
        }
        self.active_settings().ok().map(|(_, s)| s.model.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, AnalysisError> {
    value
        .trim()
        .parse()
        .map_err(|_| AnalysisError::InvalidConfig(format!("{key}: cannot parse '{value}'")))
}

/// Builder for [`AnalyzerConfig`].
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl fmt::Debug for AnalyzerConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalyzerConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Set the credential for a named provider. Unknown names are ignored
    /// here and rejected when the provider is dispatched.
    pub fn api_key(mut self, provider: &str, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match provider.parse::<ProviderKind>() {
            Ok(ProviderKind::Gemini) => self.config.gemini.api_key = key,
            Ok(ProviderKind::Groq) => self.config.groq.api_key = key,
            Ok(ProviderKind::OpenAi) => self.config.openai.api_key = key,
            Err(_) => {}
        }
        self
    }

    /// Override a provider's endpoint (proxies, self-hosted gateways, tests).
    pub fn base_url(mut self, provider: &str, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        match provider.parse::<ProviderKind>() {
            Ok(ProviderKind::Gemini) => self.config.gemini.base_url = url,
            Ok(ProviderKind::Groq) => self.config.groq.base_url = url,
            Ok(ProviderKind::OpenAi) => self.config.openai.base_url = url,
            Err(_) => {}
        }
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalysisError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(AnalysisError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AnalysisError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
