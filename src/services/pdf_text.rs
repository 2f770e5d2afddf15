//! Plain text extraction from PDF files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ExtractError;
use crate::utils::text::flatten_newlines;

/// Extract the text of every page of a PDF as a single line.
///
/// Extraction runs on the blocking pool; a panic inside the PDF library is
/// reported as an [`ExtractError`] for that file only.
pub async fn extract_pdf_text(path: &Path) -> Result<String, ExtractError> {
    let owned: PathBuf = path.to_path_buf();
    let shown = path.display().to_string();

    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| ExtractError::Pdf {
            path: shown.clone(),
            message: if e.is_panic() {
                "pdf parser panicked".to_string()
            } else {
                e.to_string()
            },
        })?
        .map_err(|e| ExtractError::Pdf {
            path: shown.clone(),
            message: e.to_string(),
        })?;

    let text = normalize_extracted(&extracted);
    if text.is_empty() {
        return Err(ExtractError::Empty(shown));
    }

    debug!(path = %shown, chars = text.len(), "extracted pdf text");
    Ok(text)
}

/// Pages are separated by form feeds; both those and line breaks become spaces.
pub fn normalize_extracted(raw: &str) -> String {
    flatten_newlines(&raw.replace('\u{c}', " ")).trim().to_string()
}
