//! `process_pdf`: extract the text layer of a local PDF.

use anyhow::{anyhow, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use super::truncate_chars;

pub const EMPTY_PDF_ERROR: &str = "Error: The PDF is empty or has no readable pages.";
pub const NO_TEXT_ERROR: &str =
    "Error: No text could be extracted from the PDF. It may be a scanned image or encrypted.";

/// Extract the text of every page, cut to `max_chars`.
///
/// Failures are reported as strings starting with `Error`.
pub fn process_pdf(path: &Path, max_chars: usize) -> String {
    tracing::debug!(path = %path.display(), "processing pdf");
    match extract(path) {
        Ok(Extracted::Text(text)) => truncate_chars(&text, max_chars),
        Ok(Extracted::NoPages) => EMPTY_PDF_ERROR.to_string(),
        Ok(Extracted::NoText) => NO_TEXT_ERROR.to_string(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to process pdf");
            format!("Error processing PDF: {}", e)
        }
    }
}

enum Extracted {
    Text(String),
    NoPages,
    NoText,
}

fn extract(path: &Path) -> Result<Extracted> {
    let bytes = std::fs::read(path)?;

    let document = lopdf::Document::load_mem(&bytes)?;
    if document.get_pages().is_empty() {
        return Ok(Extracted::NoPages);
    }

    // Some fonts make the extractor panic
    let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)))
        .map_err(|_| anyhow!("text extraction panicked"))??;

    if text.trim().is_empty() {
        return Ok(Extracted::NoText);
    }
    Ok(Extracted::Text(text))
}
