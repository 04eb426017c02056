//! Error types for the rhp-analyst library.
//!
//! Two error types mirror the two places a request can fail:
//!
//! * [`LlmError`] — **Upstream**: everything that goes wrong between the
//!   prompt leaving this process and a validated analysis coming back
//!   (provider not configured, transport failure, unparsable or incomplete
//!   response). Only some variants are worth retrying; see
//!   [`LlmError::is_retryable`].
//!
//! * [`AnalysisError`] — **Fatal per request**: the top-level error returned
//!   by the `analyze*` entry points. Wraps [`LlmError`] and adds the input and
//!   extraction failures that happen before the provider is ever contacted.
//!
//! [`AnalysisError::category`] collapses both into the three buckets a caller
//! actually acts on: fix the upload, try again later, or report a bug.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the LLM layer: provider dispatch, transport, parsing and
/// schema validation.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    // ── Dispatch ──────────────────────────────────────────────────────────
    /// The configured provider name is not one we can talk to.
    #[error("Unsupported LLM provider: '{0}' (expected one of: gemini, groq, openai)")]
    UnsupportedProvider(String),

    /// The selected provider has no credential configured.
    #[error("{env_var} is not set. Configure a credential for provider '{provider}'.")]
    MissingCredential { provider: String, env_var: String },

    // ── Transport ─────────────────────────────────────────────────────────
    /// Connection, TLS or body-read failure.
    #[error("{provider} request failed: {detail}")]
    Transport { provider: String, detail: String },

    /// The request exceeded the configured timeout.
    #[error("{provider} request timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// Non-success HTTP status other than an authentication failure.
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// HTTP 401/403 — retrying with the same key will not help.
    #[error("{provider} rejected the credential (HTTP {status})")]
    Auth { provider: String, status: u16 },

    // ── Response ──────────────────────────────────────────────────────────
    /// The provider answered but produced no text.
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    /// The response text is not valid JSON, even after fence stripping.
    #[error("Failed to parse JSON from {provider}: {detail}\nRaw: {raw}")]
    InvalidJson {
        provider: String,
        detail: String,
        raw: String,
    },

    /// A required top-level key is absent from the parsed response.
    #[error("LLM response missing key: {0}")]
    MissingKey(&'static str),

    /// All keys are present but at least one has the wrong shape.
    #[error("LLM response has an unexpected shape: {0}")]
    InvalidShape(String),

    // ── Retry ─────────────────────────────────────────────────────────────
    /// Every attempt failed with a retryable error.
    #[error("{provider} error after {attempts} attempts: {last}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        last: Box<LlmError>,
    },
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport and parse failures are retried (a malformed response is
    /// often transient), as are HTTP 408, 429 and 5xx. Other statuses,
    /// configuration and credential problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            LlmError::Transport { .. }
            | LlmError::Timeout { .. }
            | LlmError::EmptyResponse { .. }
            | LlmError::InvalidJson { .. } => true,
            LlmError::UnsupportedProvider(_)
            | LlmError::MissingCredential { .. }
            | LlmError::Auth { .. }
            | LlmError::MissingKey(_)
            | LlmError::InvalidShape(_)
            | LlmError::RetriesExhausted { .. } => false,
        }
    }
}

/// All fatal errors returned by the rhp-analyst library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload or request arguments are unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The bytes do not start with the PDF magic number.
    #[error("'{source_name}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    /// HTTP download of a URL input failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Extraction produced no usable text.
    #[error("RHP PDF appears to be empty or unreadable.")]
    EmptyDocument,

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDFium could not be bound or the document could not be parsed.
    #[error("Failed to read PDF: {detail}")]
    Extraction { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// Anything raised by the provider layer or the schema validator.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used for HTTP status codes and process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller should fix the upload or arguments.
    BadInput,
    /// A dependency (the LLM provider) failed; try again later.
    Upstream,
    /// Anything else; report it.
    Internal,
}

impl AnalysisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::InvalidInput(_)
            | AnalysisError::FileNotFound { .. }
            | AnalysisError::NotAPdf { .. }
            | AnalysisError::DownloadFailed { .. }
            | AnalysisError::EmptyDocument => ErrorCategory::BadInput,
            AnalysisError::Llm(_) => ErrorCategory::Upstream,
            AnalysisError::Extraction { .. }
            | AnalysisError::InvalidConfig(_)
            | AnalysisError::Internal(_) => ErrorCategory::Internal,
        }
    }
}
