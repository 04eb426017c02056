//! # rhp-analyst
//!
//! Analyse IPO prospectuses (Red Herring Prospectus PDFs) with an LLM, then
//! sanity-check the model's scores and verdict with deterministic rules.
//!
//! ## Why rules on top of the model?
//!
//! A model asked for a verdict on a 400-page prospectus is fluent but not
//! always consistent: it may describe falling revenue at length and still
//! score financial strength 8. The rule layer catches those contradictions
//! with a handful of cheap, auditable checks and only ever makes a verdict
//! more cautious.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract   all-page text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Prompt    text + market inputs + JSON schema
//!  ├─ 3. LLM       Gemini / Groq / OpenAI, bounded retry, fence stripping
//!  ├─ 4. Validate  12 required keys, then typed shape
//!  ├─ 5. Rules     decline cap, QIB and weak-score downgrades
//!  └─ 6. Assemble  AnalysisResult + per-request stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rhp_analyst::{analyze_path, AnalysisInputs, AnalyzerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider and key from LLM_PROVIDER / GEMINI_API_KEY / GROQ_API_KEY / OPENAI_API_KEY
//!     let config = AnalyzerConfig::from_env()?;
//!     let inputs = AnalysisInputs::default()
//!         .with_issue_price(420.0)
//!         .with_subscription(3.1, 7.4, 0.4);
//!     let output = analyze_path("rhp.pdf", inputs, &config).await?;
//!     println!("{}", output.result.final_verdict);
//!     for adj in &output.stats.adjustments {
//!         eprintln!("rule: {adj}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | `rhp-analyst` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | [`server`] module (axum + tower-http) |
//!
//! Disable both when using only the library:
//! ```toml
//! rhp-analyst = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod providers;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze_bytes, analyze_bytes_with_id, analyze_path, analyze_sync, analyze_text, extract_only,
    AnalysisOutput, AnalysisStats,
};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, ProviderKind, ProviderSettings};
pub use error::{AnalysisError, ErrorCategory, LlmError};
pub use model::{
    AnalysisInputs, AnalysisResult, ExtractedText, FinancialMetrics, FinancialYear, Scores,
    ValidatedAnalysis, Verdict,
};
pub use pipeline::llm::{LlmClient, LlmProvider, RetryPolicy};
pub use pipeline::rules::Adjustment;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use providers::create_provider;
