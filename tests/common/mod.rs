//! Shared test doubles for the integration tests.
//!
//! [`ScriptedProvider`] stands in for a real LLM backend: it hands out a
//! fixed sequence of replies, records every prompt it was sent and counts
//! calls, so tests can assert both on the pipeline's output and on whether
//! the provider was contacted at all.

#![allow(dead_code)]

use futures::future::BoxFuture;
use rhp_analyst::{AnalyzerConfig, LlmError, LlmProvider};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// A provider that answers every call with `value`.
    pub fn always(value: &Value) -> Arc<Self> {
        Self::new((0..8).map(|_| Ok(value.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::EmptyResponse {
                provider: "scripted".into(),
            }));
        Box::pin(async move { reply })
    }
}

/// Analyzer configuration routed to `provider`, with a short retry delay.
pub fn config_with(provider: Arc<ScriptedProvider>) -> AnalyzerConfig {
    AnalyzerConfig::builder()
        .provider(provider)
        .retry_delay_ms(10)
        .build()
        .unwrap()
}

/// A complete, well-formed model answer.
pub fn model_answer() -> Value {
    json!({
        "company_overview": "Acme Foods Ltd is a packaged snacks maker in western India.\nSecond line.",
        "business_summary": "Manufactures and distributes snacks through 40,000 retail points.",
        "financial_analysis": "Revenue grew steadily over FY21-FY23 with stable margins.",
        "financial_metrics": {
            "yearly_data": [
                {"year": "FY22", "revenue": 410.2, "profit": 31.0, "loss": 0, "margin": 7.6, "growth_rate": 12.1},
                {"year": "FY23", "revenue": 468.9, "profit": 38.4, "loss": 0, "margin": 8.2, "growth_rate": 14.3}
            ],
            "total_revenue": 879.1,
            "total_profit": 69.4,
            "total_loss": 0,
            "avg_margin": 7.9,
            "revenue_growth_trend": "increasing",
            "profitability_trend": "improving"
        },
        "key_strengths": ["Established brand", "Wide distribution"],
        "key_risks": ["Raw material price volatility"],
        "valuation_analysis": "P/E of 28x is in line with listed peers.",
        "profit_potential": "Moderate listing gains likely.",
        "investment_recommendation": "Apply for long term.",
        "scores": {
            "financial_strength": 7,
            "valuation_comfort": 6,
            "promoter_quality": 7,
            "demand_strength": 6
        },
        "final_verdict": "apply",
        "final_comment": "Fairly priced consumer play."
    })
}

// ── PDFium fixtures ──────────────────────────────────────────────────────────

/// Three pages: "Acme Foods Limited", a blank page, "Red Herring Prospectus".
pub fn three_page_pdf() -> Vec<u8> {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/three_pages.pdf");
    std::fs::read(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// `PDFIUM_LIB_PATH`, if set.
pub fn pdfium_library() -> Option<std::path::PathBuf> {
    std::env::var_os("PDFIUM_LIB_PATH").map(std::path::PathBuf::from)
}

pub fn pdfium_ready() -> bool {
    rhp_analyst::pipeline::extract::bind_pdfium(pdfium_library().as_deref()).is_ok()
}

/// Skip this test if no PDFium library can be bound.
#[allow(unused_macros)]
macro_rules! pdfium_skip_unless_ready {
    () => {{
        if !crate::common::pdfium_ready() {
            println!("SKIP — PDFium not found; set PDFIUM_LIB_PATH to run this test");
            return;
        }
    }};
}
