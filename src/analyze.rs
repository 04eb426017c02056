//! Analysis entry points: run the whole pipeline for one prospectus.
//!
//! Every entry point runs inside a `tracing` span carrying a per-request
//! `request_id`, so the extraction, provider and rule events of concurrent
//! requests can be told apart in the logs.

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::model::{AnalysisInputs, AnalysisResult, ExtractedText};
use crate::pipeline::llm::LlmClient;
use crate::pipeline::rules::Adjustment;
use crate::pipeline::{assemble, extract, input, rules, validate};
use crate::progress::Stage;
use crate::prompts;
use crate::providers;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// Per-request statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisStats {
    pub request_id: String,
    pub provider: String,
    pub model: String,
    /// `0` when the analysis started from text.
    pub total_pages: usize,
    pub pages_read: usize,
    pub text_chars: usize,
    pub prompt_chars: usize,
    pub llm_attempts: u32,
    /// Corrections made by the rule layer, in application order.
    pub adjustments: Vec<Adjustment>,
    /// Wall time per completed stage.
    pub stage_ms: BTreeMap<&'static str, u64>,
    pub total_duration_ms: u64,
}

impl AnalysisStats {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            provider: String::new(),
            model: String::new(),
            total_pages: 0,
            pages_read: 0,
            text_chars: 0,
            prompt_chars: 0,
            llm_attempts: 0,
            adjustments: Vec::new(),
            stage_ms: BTreeMap::new(),
            total_duration_ms: 0,
        }
    }
}

/// The analysis plus how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutput {
    pub result: AnalysisResult,
    pub stats: AnalysisStats,
}

/// Fresh UUID v4 request identifier.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Analyse PDF bytes.
///
/// # Errors
/// - [`AnalysisError::Extraction`] when pdfium cannot be bound or the
///   document cannot be parsed
/// - [`AnalysisError::EmptyDocument`] when no text comes out; the provider
///   is never contacted in that case
/// - [`AnalysisError::Llm`] for provider, parse and schema failures
pub async fn analyze_bytes(
    bytes: Vec<u8>,
    inputs: AnalysisInputs,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    analyze_bytes_with_id(bytes, inputs, config, new_request_id()).await
}

/// [`analyze_bytes`] under a caller-supplied request id (the server passes
/// the `x-request-id` it already logged).
pub async fn analyze_bytes_with_id(
    bytes: Vec<u8>,
    inputs: AnalysisInputs,
    config: &AnalyzerConfig,
    request_id: String,
) -> Result<AnalysisOutput, AnalysisError> {
    let span = info_span!("analysis", request_id = %request_id);
    async move {
        let total_start = Instant::now();
        let mut stats = AnalysisStats::new(request_id);
        info!("Starting analysis: {} bytes", bytes.len());

        // ── Step 1: Extract text ─────────────────────────────────────────
        let started = stage_start(config, Stage::Extract);
        let extracted = extract::extract_text(bytes, config).await?;
        stage_done(config, Stage::Extract, started, &mut stats);
        stats.total_pages = extracted.total_pages;
        stats.pages_read = extracted.pages_read;

        // ── Step 2: Reject blank documents before any LLM call ───────────
        if extracted.is_blank() {
            return Err(AnalysisError::EmptyDocument);
        }

        run_text_pipeline(&extracted.text, &inputs, config, stats, total_start).await
    }
    .instrument(span)
    .await
}

/// Analyse already-extracted text.
pub async fn analyze_text(
    text: &str,
    inputs: AnalysisInputs,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let request_id = new_request_id();
    let span = info_span!("analysis", request_id = %request_id);
    async move {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyDocument);
        }
        let stats = AnalysisStats::new(request_id);
        run_text_pipeline(text, &inputs, config, stats, Instant::now()).await
    }
    .instrument(span)
    .await
}

/// Analyse a local PDF path or an HTTP(S) URL.
pub async fn analyze_path(
    input_str: impl AsRef<str>,
    inputs: AnalysisInputs,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let doc = input::load_input(input_str.as_ref(), config.download_timeout_secs).await?;
    info!("Loaded '{}'", doc.name);
    analyze_bytes(doc.bytes, inputs, config).await
}

/// Synchronous wrapper around [`analyze_path`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    inputs: AnalysisInputs,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_path(input_str, inputs, config))
}

/// Extract text without analysing it.
///
/// Does not require an LLM provider or API key. Blank output is returned
/// as-is rather than rejected.
pub async fn extract_only(
    bytes: Vec<u8>,
    config: &AnalyzerConfig,
) -> Result<ExtractedText, AnalysisError> {
    extract::extract_text(bytes, config).await
}

/// Steps 3–7, shared by the bytes and text entry points.
async fn run_text_pipeline(
    text: &str,
    inputs: &AnalysisInputs,
    config: &AnalyzerConfig,
    mut stats: AnalysisStats,
    total_start: Instant,
) -> Result<AnalysisOutput, AnalysisError> {
    stats.text_chars = text.chars().count();

    // ── Step 3: Build prompt ─────────────────────────────────────────────
    let started = stage_start(config, Stage::Prompt);
    let prompt = prompts::build_analysis_prompt(text, inputs);
    stats.prompt_chars = prompt.chars().count();
    stage_done(config, Stage::Prompt, started, &mut stats);

    // ── Step 4: Call the provider ────────────────────────────────────────
    let provider = providers::create_provider(config)?;
    stats.provider = provider.name().to_string();
    stats.model = provider.model().to_string();
    info!(
        provider = %stats.provider,
        model = %stats.model,
        text_chars = stats.text_chars,
        "Requesting analysis"
    );

    let started = stage_start(config, Stage::Llm);
    let client = LlmClient::new(provider, config.retry_policy())
        .with_progress(config.progress_callback.clone());
    let response = client.call_counted(&prompt).await?;
    stats.llm_attempts = response.attempts;
    stage_done(config, Stage::Llm, started, &mut stats);

    // ── Step 5: Validate ─────────────────────────────────────────────────
    let started = stage_start(config, Stage::Validate);
    let mut analysis = validate::validate(response.value)?;
    stage_done(config, Stage::Validate, started, &mut stats);
    debug!(
        verdict = %analysis.final_verdict,
        scores = ?analysis.scores.values(),
        "LLM verdict"
    );

    // ── Step 6: Apply rules ──────────────────────────────────────────────
    let started = stage_start(config, Stage::Rules);
    stats.adjustments = rules::apply_rules(&mut analysis, inputs);
    stage_done(config, Stage::Rules, started, &mut stats);

    // ── Step 7: Assemble ─────────────────────────────────────────────────
    let started = stage_start(config, Stage::Assemble);
    let result = assemble::assemble(analysis);
    stage_done(config, Stage::Assemble, started, &mut stats);

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        verdict = %result.final_verdict,
        adjustments = stats.adjustments.len(),
        attempts = stats.llm_attempts,
        total_ms = stats.total_duration_ms,
        "Analysis complete"
    );

    Ok(AnalysisOutput { result, stats })
}

fn stage_start(config: &AnalyzerConfig, stage: Stage) -> Instant {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
    Instant::now()
}

fn stage_done(config: &AnalyzerConfig, stage: Stage, started: Instant, stats: &mut AnalysisStats) {
    let elapsed = started.elapsed();
    let duration_ms = elapsed.as_millis() as u64;
    debug!(stage = %stage, duration_ms, "stage complete");
    stats.stage_ms.insert(stage.as_str(), duration_ms);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_uuids() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn blank_text_rejected() {
        let config = AnalyzerConfig::default();
        let r = analyze_text(" \n\t ", AnalysisInputs::default(), &config).await;
        assert!(matches!(r, Err(AnalysisError::EmptyDocument)));
    }

    #[tokio::test]
    async fn unsupported_provider_surfaces_as_llm_error() {
        let config = AnalyzerConfig::builder()
            .provider_name("mistral")
            .build()
            .unwrap();
        let r = analyze_text("Some prospectus text", AnalysisInputs::default(), &config).await;
        match r {
            Err(AnalysisError::Llm(crate::error::LlmError::UnsupportedProvider(name))) => {
                assert_eq!(name, "mistral")
            }
            other => panic!("expected UnsupportedProvider, got {other:?}"),
        }
    }
}
