//! Heuristic tool selection from the words of a message.
//!
//! The verdict is independent of anything a model says; the dispatcher uses it to check and
//! correct the model's own choice of tool.
use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;

use crate::models::attachment::Attachment;
use crate::tools::{BROWSE_TOOL, PDF_TOOL, SEARCH_TOOL};

pub const SEARCH_PHRASE: &str = "search for";
pub const SUMMARIZE_WORD: &str = "summarize";

/// Phrases that ask for the text of an uploaded PDF
pub const PDF_PHRASES: [&str; 5] = [
    "process pdf",
    "read pdf",
    "what is contained in this pdf",
    "extract text from pdf",
    "summarize pdf",
];

pub const NO_QUERY: &str = "No query provided";
pub const FALLBACK_URL: &str = "https://example.com";

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r"https?://[^\s]+").unwrap();
}

/// The capability a message asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolIntent {
    None,
    Search { query: String },
    Browse { url: String },
    ProcessPdf { file_path: PathBuf, summarize: bool },
}

impl ToolIntent {
    /// Name of the tool that serves this intent
    pub fn tool_name(&self) -> Option<&'static str> {
        match self {
            ToolIntent::None => None,
            ToolIntent::Search { .. } => Some(SEARCH_TOOL),
            ToolIntent::Browse { .. } => Some(BROWSE_TOOL),
            ToolIntent::ProcessPdf { .. } => Some(PDF_TOOL),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ToolIntent::None)
    }
}

/// Decide which tool, if any, a message calls for.
///
/// A search request wins over a URL, which wins over a PDF request.
pub fn classify(text: &str, attachments: &[Attachment]) -> ToolIntent {
    if contains_phrase(text, SEARCH_PHRASE) {
        return ToolIntent::Search {
            query: search_query(text),
        };
    }

    if let Some(url) = first_url(text) {
        return ToolIntent::Browse {
            url: url.to_string(),
        };
    }

    if mentions_pdf(text) {
        if let Some(pdf) = attachments.iter().find(|a| a.is_pdf()) {
            return ToolIntent::ProcessPdf {
                file_path: pdf.storage_path.clone(),
                summarize: wants_summary(text),
            };
        }
    }

    ToolIntent::None
}

/// The trimmed text after `search for`, or a placeholder when there is nothing after it
pub fn search_query(text: &str) -> String {
    let lowered = text.to_ascii_lowercase();
    let query = lowered
        .find(SEARCH_PHRASE)
        // ascii lowercasing keeps byte offsets, so the offset is valid in `text`
        .map(|start| text[start + SEARCH_PHRASE.len()..].trim())
        .unwrap_or_default();

    if query.is_empty() {
        NO_QUERY.to_string()
    } else {
        query.to_string()
    }
}

pub fn first_url(text: &str) -> Option<&str> {
    URL_PATTERN.find(text).map(|m| m.as_str())
}

pub fn is_url(candidate: &str) -> bool {
    let lowered = candidate.to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

pub fn mentions_pdf(text: &str) -> bool {
    PDF_PHRASES
        .iter()
        .any(|phrase| contains_phrase(text, phrase))
}

pub fn wants_summary(text: &str) -> bool {
    contains_phrase(text, SUMMARIZE_WORD)
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.to_ascii_lowercase().contains(phrase)
}
