//! Capability tools: the external functions the assistant can run on behalf of a model.
//!
//! Each tool is synchronous and reports failure in one of two ways:
//! - an `Err`, when the call itself could not be made (the invocation failed)
//! - an `Ok` string starting with `Error`, when the tool ran but could not produce a result
//!
//! The second form is part of the tool's output and is shown to the user as is.
pub mod browse;
pub mod pdf;
pub mod search;

use anyhow::Result;
use lazy_static::lazy_static;
use serde_json::json;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::models::tool::Tool;

pub const SEARCH_TOOL: &str = "duckduckgo_search";
pub const BROWSE_TOOL: &str = "browse_web";
pub const PDF_TOOL: &str = "process_pdf";

/// Prefix a tool result carries when it reports a failure
pub const ERROR_PREFIX: &str = "Error";

lazy_static! {
    static ref TOOL_REGISTRY: Vec<Tool> = vec![
        Tool::new(
            SEARCH_TOOL,
            "Search the internet using DuckDuckGo.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to look up on DuckDuckGo."
                    }
                },
                "required": ["query"]
            }),
        ),
        Tool::new(
            BROWSE_TOOL,
            "Fetch and summarize content from a specific URL.",
            json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL to browse and fetch content from."
                    }
                },
                "required": ["url"]
            }),
        ),
        Tool::new(
            PDF_TOOL,
            "Extract text from an uploaded PDF file.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "The file path of the PDF to process."
                    }
                },
                "required": ["file_path"]
            }),
        ),
    ];
}

/// The tool schemas offered to the tool calling model
pub fn registry() -> &'static [Tool] {
    &TOOL_REGISTRY
}

/// The result of a tool run, split by the leading `Error` convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Ok(String),
    Error(String),
}

impl ToolOutput {
    pub fn from_raw(raw: String) -> Self {
        if raw.starts_with(ERROR_PREFIX) {
            ToolOutput::Error(raw)
        } else {
            ToolOutput::Ok(raw)
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ToolOutput::Ok(text) | ToolOutput::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error(_))
    }
}

/// The external capabilities a dispatch can invoke
#[cfg_attr(test, mockall::automock)]
pub trait CapabilityTools: Send + Sync {
    /// Search the web and return formatted results
    fn search(&self, query: &str) -> Result<String>;

    /// Fetch a page and return its readable text
    fn browse(&self, url: &str) -> Result<String>;

    /// Extract the text of a PDF on local disk
    fn extract_pdf_text(&self, path: &Path) -> Result<String>;
}

/// Limits applied by the web and PDF tools
#[derive(Debug, Clone, PartialEq)]
pub struct ToolsConfig {
    /// Timeout for every network request a tool makes
    pub timeout: Duration,
    pub search_endpoint: String,
    pub max_search_results: usize,
    pub max_page_chars: usize,
    pub max_pdf_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            search_endpoint: search::DUCKDUCKGO_HTML_URL.to_string(),
            max_search_results: 3,
            max_page_chars: 500,
            max_pdf_chars: 1000,
        }
    }
}

/// Capability tools backed by DuckDuckGo, plain HTTP fetches and local PDF parsing
pub struct WebTools {
    config: ToolsConfig,
    // Built on first use, which happens on a blocking thread
    client: OnceLock<reqwest::blocking::Client>,
}

impl WebTools {
    pub fn new(config: ToolsConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(concat!("raznet/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl Default for WebTools {
    fn default() -> Self {
        Self::new(ToolsConfig::default())
    }
}

impl CapabilityTools for WebTools {
    fn search(&self, query: &str) -> Result<String> {
        search::duckduckgo_search(
            self.client()?,
            &self.config.search_endpoint,
            query,
            self.config.max_search_results,
        )
    }

    fn browse(&self, url: &str) -> Result<String> {
        match self.client() {
            Ok(client) => Ok(browse::browse_web(client, url, self.config.max_page_chars)),
            Err(e) => Ok(format!("Error browsing URL: {}", e)),
        }
    }

    fn extract_pdf_text(&self, path: &Path) -> Result<String> {
        Ok(pdf::process_pdf(path, self.config.max_pdf_chars))
    }
}

/// Keep at most `max_chars` characters, marking the cut with an ellipsis
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
