//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! Extraction works from an in-memory buffer, so a URL is downloaded
//! straight into memory and no temp file is needed. The PDF magic bytes
//! (`%PDF`) are checked here so callers get a meaningful error instead of an
//! opaque pdfium failure.

use crate::error::AnalysisError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A loaded document ready for extraction.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// File name or URL, for logs and errors.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether `bytes` start with the PDF magic number.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Load a local file or download a URL.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedDocument, AnalysisError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

/// Reject `bytes` unless they carry the PDF magic number.
pub fn ensure_pdf(name: &str, bytes: &[u8]) -> Result<(), AnalysisError> {
    if has_pdf_magic(bytes) {
        Ok(())
    } else {
        Err(AnalysisError::NotAPdf {
            source_name: name.to_string(),
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        })
    }
}

async fn load_local(path_str: &str) -> Result<LoadedDocument, AnalysisError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AnalysisError::FileNotFound { path });
        }
        Err(e) => {
            return Err(AnalysisError::InvalidInput(format!(
                "cannot read '{}': {}",
                path.display(),
                e
            )));
        }
    };

    ensure_pdf(path_str, &bytes)?;
    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());

    Ok(LoadedDocument {
        name: path_str.to_string(),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, AnalysisError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| AnalysisError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {}s", timeout_secs))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?
        .to_vec();

    ensure_pdf(url, &bytes)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(LoadedDocument {
        name: url.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/rhp.pdf"));
        assert!(is_url("http://example.com/rhp.pdf"));
        assert!(!is_url("/tmp/rhp.pdf"));
        assert!(!is_url("rhp.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_check() {
        assert!(has_pdf_magic(b"%PDF-1.7\n..."));
        assert!(!has_pdf_magic(b"PK\x03\x04"));
        assert!(!has_pdf_magic(b"%PD"));
    }

    #[test]
    fn not_a_pdf_reports_leading_bytes() {
        match ensure_pdf("upload.zip", b"PK\x03\x04rest") {
            Err(AnalysisError::NotAPdf { source_name, magic }) => {
                assert_eq!(source_name, "upload.zip");
                assert_eq!(magic, b"PK\x03\x04".to_vec());
            }
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file() {
        let r = load_input("/definitely/not/here/rhp.pdf", 5).await;
        assert!(matches!(r, Err(AnalysisError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn local_non_pdf_rejected() {
        let path = std::env::temp_dir().join(format!("rhp-input-{}.txt", std::process::id()));
        tokio::fs::write(&path, b"hello").await.unwrap();
        let r = load_input(path.to_str().unwrap(), 5).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert!(matches!(r, Err(AnalysisError::NotAPdf { .. })));
    }

    #[tokio::test]
    async fn local_pdf_loaded() {
        let path = std::env::temp_dir().join(format!("rhp-input-{}.pdf", std::process::id()));
        tokio::fs::write(&path, b"%PDF-1.4\n%%EOF\n").await.unwrap();
        let r = load_input(path.to_str().unwrap(), 5).await;
        let _ = tokio::fs::remove_file(&path).await;
        let doc = r.unwrap();
        assert!(doc.name.ends_with(".pdf"));
        assert_eq!(&doc.bytes[..4], b"%PDF");
    }
}
