//! Text extraction against a real PDF.
//!
//! Needs a PDFium shared library on the system path or in `PDFIUM_LIB_PATH`;
//! each test prints SKIP and passes when none can be bound.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test extract -- --nocapture

#[macro_use]
mod common;

use common::{config_with, model_answer, pdfium_library, three_page_pdf, ScriptedProvider};
use rhp_analyst::pipeline::extract::extract_text_blocking;
use rhp_analyst::{analyze_bytes, extract_only, AnalysisInputs, AnalyzerConfig, Verdict};

fn config() -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    config.pdfium_library = pdfium_library();
    config
}

#[test]
fn pages_are_joined_in_order_with_newlines() {
    pdfium_skip_unless_ready!();

    let extracted = extract_text_blocking(&three_page_pdf(), pdfium_library().as_deref()).unwrap();

    assert_eq!(extracted.total_pages, 3);
    assert_eq!(extracted.pages_read, 3);
    assert_eq!(extracted.text, "Acme Foods Limited\n\nRed Herring Prospectus\n");
    assert!(!extracted.is_blank());
}

#[tokio::test]
async fn extract_only_matches_blocking_path() {
    pdfium_skip_unless_ready!();

    let extracted = extract_only(three_page_pdf(), &config()).await.unwrap();
    let lines: Vec<&str> = extracted.text.split('\n').collect();
    assert_eq!(lines, vec!["Acme Foods Limited", "", "Red Herring Prospectus", ""]);
}

#[tokio::test]
async fn extracted_text_reaches_the_prompt() {
    pdfium_skip_unless_ready!();

    let provider = ScriptedProvider::always(&model_answer());
    let mut config = config_with(provider.clone());
    config.pdfium_library = pdfium_library();

    let out = analyze_bytes(three_page_pdf(), AnalysisInputs::default(), &config)
        .await
        .unwrap();

    assert_eq!(out.result.final_verdict, Verdict::Apply);
    assert_eq!(out.stats.total_pages, 3);
    assert_eq!(out.stats.pages_read, 3);
    assert!(out.stats.stage_ms.contains_key("extract"));
    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("Acme Foods Limited\n\nRed Herring Prospectus"));
}
