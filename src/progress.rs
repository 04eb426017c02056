//! Progress-callback trait for per-stage analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalyzerConfigBuilder::progress_callback`] to observe the
//! pipeline as it moves from extraction to the final verdict. The CLI uses it
//! to drive a terminal spinner; a server could forward events to a log or a
//! websocket. All methods default to no-ops.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Prompt,
    Llm,
    Validate,
    Rules,
    Assemble,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Prompt => "prompt",
            Stage::Llm => "llm",
            Stage::Validate => "validate",
            Stage::Rules => "rules",
            Stage::Assemble => "assemble",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as it runs each stage.
///
/// Implementations must be `Send + Sync`; the server runs many analyses
/// concurrently against the same configuration.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed: Duration) {
        let _ = (stage, elapsed);
    }

    /// Called when an LLM attempt failed and another will follow after `delay`.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, delay: Duration, error: &str) {
        let _ = (attempt, max_attempts, delay, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalyzerConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
