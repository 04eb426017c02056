//! Text extraction: concatenate every page's text via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and does CPU-heavy parsing. `tokio::task::spawn_blocking` moves the
//! work onto the blocking pool so a 600-page prospectus does not stall the
//! worker threads serving other requests.
//!
//! ## Binding
//!
//! The library is bound per extraction from
//! [`AnalyzerConfig::pdfium_library`] (env `PDFIUM_LIB_PATH`), which may name
//! the shared library itself or the directory containing it. When unset the
//! system library search path is used.

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::model::ExtractedText;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extract all text from PDF `bytes`.
///
/// Runs inside `spawn_blocking`. Bind and parse failures surface as
/// [`AnalysisError::Extraction`]; blank output is *not* an error here, the
/// caller decides.
pub async fn extract_text(
    bytes: Vec<u8>,
    config: &AnalyzerConfig,
) -> Result<ExtractedText, AnalysisError> {
    let library = config.pdfium_library.clone();

    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes, library.as_deref()))
        .await
        .map_err(|e| AnalysisError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
pub fn extract_text_blocking(
    bytes: &[u8],
    library: Option<&Path>,
) -> Result<ExtractedText, AnalysisError> {
    let pdfium = bind_pdfium(library)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| AnalysisError::Extraction {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages, {} bytes", total_pages, bytes.len());

    let mut text = String::new();
    let mut pages_read = 0usize;

    for (idx, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(page_text) => text.push_str(&page_text.all()),
            Err(e) => warn!("Page {}: text unavailable ({:?}); treating as blank", idx + 1, e),
        }
        text.push('\n');
        pages_read += 1;
    }

    debug!(
        "Extracted {} chars from {}/{} pages",
        text.len(),
        pages_read,
        total_pages
    );

    Ok(ExtractedText {
        text,
        total_pages,
        pages_read,
    })
}

/// Bind pdfium from `library` (file or directory), else the system library.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, AnalysisError> {
    let bindings = match library {
        Some(path) => {
            let path = library_file(path);
            Pdfium::bind_to_library(&path).map_err(|e| AnalysisError::Extraction {
                detail: format!("cannot bind PDFium at '{}': {}", path.display(), e),
            })?
        }
        None => Pdfium::bind_to_system_library().map_err(|e| AnalysisError::Extraction {
            detail: format!(
                "cannot bind system PDFium ({}); set PDFIUM_LIB_PATH to the library",
                e
            ),
        })?,
    };
    Ok(Pdfium::new(bindings))
}

/// Accept either the library file or its directory.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}
