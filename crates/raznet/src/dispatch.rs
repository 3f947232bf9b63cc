//! Tool dispatch: settle which tool runs, run it, and stream what it produced.
//!
//! The model's tool call and the heuristic [`ToolIntent`] can disagree. [`reconcile`] settles
//! that as a pure function, and [`Dispatcher::dispatch`] turns the outcome into tokens.
use futures::stream::BoxStream;
use futures::{pin_mut, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult};
use crate::intent::{self, ToolIntent};
use crate::models::attachment::InboundMessage;
use crate::models::message::Message;
use crate::models::tool::ToolCall;
use crate::providers::base::{ModelPurpose, Provider};
use crate::tools::{CapabilityTools, ToolOutput, BROWSE_TOOL, PDF_TOOL, SEARCH_TOOL};

/// An ordered stream of text chunks for the caller
pub type TokenStream = BoxStream<'static, String>;

pub const INVALID_PDF_PATH: &str = "\nError: Invalid or missing PDF file path.\n";

/// How a message's intent and the model's tool call were settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The model picked the wrong tool, or none; the heuristic choice runs instead
    Corrected(ToolIntent),
    /// The model's tool runs, with its arguments checked against the message
    Model(ToolIntent),
    /// The model asked for a tool that does not exist
    Unknown(String),
    /// The model asked for the PDF tool but the message carries no PDF
    MissingPdf,
    /// Nothing to run
    Idle,
}

/// Settle the heuristic intent against the model's tool call.
///
/// The heuristic wins whenever it found something. Model arguments that are missing or
/// malformed are replaced by what the message itself contains; a `file_path` is only trusted
/// when it names one of the message's PDF attachments.
pub fn reconcile(
    intent: &ToolIntent,
    call: Option<&ToolCall>,
    message: &InboundMessage,
) -> Resolution {
    let call = match (intent.tool_name(), call) {
        (None, None) => return Resolution::Idle,
        (Some(_), None) => return Resolution::Corrected(intent.clone()),
        (Some(expected), Some(call)) if call.name != expected => {
            return Resolution::Corrected(intent.clone())
        }
        (_, Some(call)) => call,
    };

    match call.name.as_str() {
        SEARCH_TOOL => {
            let query = call
                .argument("query")
                .map(String::from)
                .unwrap_or_else(|| match intent {
                    ToolIntent::Search { query } => query.clone(),
                    _ => intent::search_query(&message.text),
                });
            Resolution::Model(ToolIntent::Search { query })
        }
        BROWSE_TOOL => {
            let url = call
                .argument("url")
                .filter(|url| intent::is_url(url))
                .or_else(|| intent::first_url(&message.text))
                .unwrap_or(intent::FALLBACK_URL);
            Resolution::Model(ToolIntent::Browse {
                url: url.to_string(),
            })
        }
        PDF_TOOL => {
            let attached = call.argument("file_path").and_then(|requested| {
                message
                    .attachments
                    .iter()
                    .filter(|a| a.is_pdf())
                    .find(|a| a.storage_path == Path::new(requested))
            });
            let file_path = match (attached, intent) {
                (Some(attachment), _) => attachment.storage_path.clone(),
                (None, ToolIntent::ProcessPdf { file_path, .. }) => file_path.clone(),
                (None, _) => match message.first_pdf() {
                    Some(attachment) => attachment.storage_path.clone(),
                    None => return Resolution::MissingPdf,
                },
            };
            Resolution::Model(ToolIntent::ProcessPdf {
                file_path,
                summarize: intent::wants_summary(&message.text),
            })
        }
        other => Resolution::Unknown(other.to_string()),
    }
}

fn correction_notice(intent: &ToolIntent) -> Option<&'static str> {
    match intent {
        ToolIntent::Search { .. } => Some(
            "\n[Correcting tool selection: Using duckduckgo_search for search query]...\n",
        ),
        ToolIntent::Browse { .. } => {
            Some("\n[Correcting tool selection: Using browse_web for URL]...\n")
        }
        ToolIntent::ProcessPdf { .. } => {
            Some("\n[Correcting tool selection: Using process_pdf for PDF]...\n")
        }
        ToolIntent::None => None,
    }
}

/// Removes an uploaded file when dropped. A file that is already gone is not an error.
pub(crate) struct UploadCleanup(pub(crate) PathBuf);

impl Drop for UploadCleanup {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!(path = %self.0.display(), "removed uploaded file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.0.display(), error = %e, "failed to remove uploaded file")
            }
        }
    }
}

/// Runs capability tools for the tool calling pipeline
#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn CapabilityTools>,
    summarize_prompt: String,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn CapabilityTools>,
        summarize_prompt: String,
    ) -> Self {
        Self {
            provider,
            tools,
            summarize_prompt,
        }
    }

    /// Run the tool this message calls for and stream its progress and results.
    ///
    /// A PDF named by the resolution is deleted when the returned stream finishes or is
    /// dropped, whichever comes first, even if it is never polled.
    pub fn dispatch(
        &self,
        intent: &ToolIntent,
        call: Option<&ToolCall>,
        message: &InboundMessage,
    ) -> TokenStream {
        let resolution = reconcile(intent, call, message);
        tracing::debug!(?resolution, "resolved tool call");

        let cleanup = match &resolution {
            Resolution::Corrected(ToolIntent::ProcessPdf { file_path, .. })
            | Resolution::Model(ToolIntent::ProcessPdf { file_path, .. }) => {
                Some(UploadCleanup(file_path.clone()))
            }
            _ => None,
        };

        let steps = self.clone().run(resolution);
        Box::pin(async_stream::stream! {
            let _cleanup = cleanup;
            pin_mut!(steps);
            while let Some(step) = steps.next().await {
                match step {
                    Ok(token) => yield token,
                    Err(e) => {
                        tracing::error!(error = %e, "tool call failed");
                        yield format!("Error in tool call: {}\n", e);
                        break;
                    }
                }
            }
        })
    }

    fn run(self, resolution: Resolution) -> impl Stream<Item = AgentResult<String>> + Send {
        async_stream::stream! {
            let intent = match resolution {
                Resolution::Idle => return,
                Resolution::Unknown(name) => {
                    yield Err(AgentError::ToolNotFound(name));
                    return;
                }
                Resolution::MissingPdf => {
                    yield Ok(INVALID_PDF_PATH.to_string());
                    return;
                }
                Resolution::Corrected(intent) => {
                    if let Some(notice) = correction_notice(&intent) {
                        yield Ok(notice.to_string());
                    }
                    intent
                }
                Resolution::Model(intent) => intent,
            };

            match intent {
                ToolIntent::None => {}
                ToolIntent::Search { query } => {
                    yield Ok(format!("\n[Searching DuckDuckGo for: {}]...\n", query));
                    match self.invoke(move |tools| tools.search(&query)).await {
                        Ok(output) => yield Ok(format!("\nSearch Results:\n{}\n", output.text())),
                        Err(e) => yield Err(e),
                    }
                }
                ToolIntent::Browse { url } => {
                    yield Ok(format!("\n[Browsing URL: {}]...\n", url));
                    match self.invoke(move |tools| tools.browse(&url)).await {
                        Ok(output) => yield Ok(format!("\nWeb Content:\n{}\n", output.text())),
                        Err(e) => yield Err(e),
                    }
                }
                ToolIntent::ProcessPdf { file_path, summarize } => {
                    yield Ok(format!("\n[Processing PDF: {}]...\n", file_path.display()));
                    let path = file_path.clone();
                    let output = match self.invoke(move |tools| tools.extract_pdf_text(&path)).await {
                        Ok(output) => output,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };

                    let text = match output {
                        ToolOutput::Error(error) => {
                            yield Ok(format!("\n{}\n", error));
                            return;
                        }
                        ToolOutput::Ok(text) => text,
                    };
                    yield Ok(format!("\nPDF Content:\n{}\n", text));

                    if summarize {
                        yield Ok("\n[Summarizing PDF content]...\n".to_string());
                        let messages = vec![Message::user().with_text(text)];
                        let stream = self
                            .provider
                            .stream(ModelPurpose::ToolCalling, Some(self.summarize_prompt.as_str()), &messages, &[])
                            .await;
                        let mut deltas = match stream {
                            Ok(deltas) => deltas,
                            Err(e) => {
                                yield Err(AgentError::Generation(e.to_string()));
                                return;
                            }
                        };
                        while let Some(delta) = deltas.next().await {
                            match delta {
                                Ok(delta) => {
                                    if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                                        yield Ok(text);
                                    }
                                }
                                Err(e) => {
                                    yield Err(AgentError::Generation(e.to_string()));
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Run a blocking tool call off the async workers
    async fn invoke<F>(&self, call: F) -> AgentResult<ToolOutput>
    where
        F: FnOnce(&dyn CapabilityTools) -> anyhow::Result<String> + Send + 'static,
    {
        let tools = Arc::clone(&self.tools);
        let raw = tokio::task::spawn_blocking(move || call(tools.as_ref()))
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        Ok(ToolOutput::from_raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attachment::Attachment;
    use crate::providers::mock::{MockProvider, MockReply};
    use crate::tools::MockCapabilityTools;
    use anyhow::anyhow;
    use serde_json::json;
    use tempfile::TempDir;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall::from_json(name, &arguments)
    }

    fn dispatcher(tools: MockCapabilityTools, provider: MockProvider) -> Dispatcher {
        Dispatcher::new(
            Arc::new(provider),
            Arc::new(tools),
            "Summarize the following text.".to_string(),
        )
    }

    fn upload(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.5").unwrap();
        path
    }

    async fn collect(stream: TokenStream) -> Vec<String> {
        stream.collect().await
    }

    #[test]
    fn test_reconcile_idle() {
        let message = InboundMessage::new("hello");
        assert_eq!(
            reconcile(&ToolIntent::None, None, &message),
            Resolution::Idle
        );
    }

    #[test]
    fn test_reconcile_corrects_wrong_tool() {
        let message = InboundMessage::new("what is on https://www.rust-lang.org");
        let intent = ToolIntent::Browse {
            url: "https://www.rust-lang.org".to_string(),
        };
        let wrong = call(SEARCH_TOOL, json!({"query": "rust"}));
        assert_eq!(
            reconcile(&intent, Some(&wrong), &message),
            Resolution::Corrected(intent.clone())
        );
        assert_eq!(
            reconcile(&intent, None, &message),
            Resolution::Corrected(intent)
        );
    }

    #[test]
    fn test_reconcile_model_arguments() {
        let message = InboundMessage::new("search for rust");
        let intent = ToolIntent::Search {
            query: "rust".to_string(),
        };
        let model = call(SEARCH_TOOL, json!({"query": "rust language"}));
        assert_eq!(
            reconcile(&intent, Some(&model), &message),
            Resolution::Model(ToolIntent::Search {
                query: "rust language".to_string()
            })
        );

        let blank = call(SEARCH_TOOL, json!({"query": "  "}));
        assert_eq!(
            reconcile(&intent, Some(&blank), &message),
            Resolution::Model(intent)
        );
    }

    #[test]
    fn test_reconcile_search_without_intent() {
        let message = InboundMessage::new("look up the weather");
        let model = call(SEARCH_TOOL, json!({}));
        assert_eq!(
            reconcile(&ToolIntent::None, Some(&model), &message),
            Resolution::Model(ToolIntent::Search {
                query: intent::NO_QUERY.to_string()
            })
        );
    }

    #[test]
    fn test_reconcile_malformed_url() {
        let message = InboundMessage::new("browse the rust site");
        let model = call(BROWSE_TOOL, json!({"url": "rust-lang.org"}));
        assert_eq!(
            reconcile(&ToolIntent::None, Some(&model), &message),
            Resolution::Model(ToolIntent::Browse {
                url: intent::FALLBACK_URL.to_string()
            })
        );

        let model = call(BROWSE_TOOL, json!({"url": "https://docs.rs/tokio"}));
        assert_eq!(
            reconcile(&ToolIntent::None, Some(&model), &message),
            Resolution::Model(ToolIntent::Browse {
                url: "https://docs.rs/tokio".to_string()
            })
        );
    }

    #[test]
    fn test_reconcile_pdf_path_must_be_attached() {
        let message = InboundMessage::new("read pdf")
            .with_attachment(Attachment::new("application/pdf", "/tmp/uploads/a.pdf"));
        let intent = intent::classify(&message.text, &message.attachments);

        let outside = call(PDF_TOOL, json!({"file_path": "/etc/passwd"}));
        assert_eq!(
            reconcile(&intent, Some(&outside), &message),
            Resolution::Model(ToolIntent::ProcessPdf {
                file_path: PathBuf::from("/tmp/uploads/a.pdf"),
                summarize: false
            })
        );

        let no_pdf = InboundMessage::new("use the pdf tool");
        assert_eq!(
            reconcile(&ToolIntent::None, Some(&outside), &no_pdf),
            Resolution::MissingPdf
        );
    }

    #[test]
    fn test_reconcile_unknown_tool() {
        let message = InboundMessage::new("hello");
        let model = call("run_shell", json!({"command": "ls"}));
        assert_eq!(
            reconcile(&ToolIntent::None, Some(&model), &message),
            Resolution::Unknown("run_shell".to_string())
        );
    }

    #[tokio::test]
    async fn test_correction_runs_browse_not_search() {
        let mut tools = MockCapabilityTools::new();
        tools.expect_search().never();
        tools
            .expect_browse()
            .withf(|url| url == "https://www.rust-lang.org")
            .times(1)
            .returning(|_| Ok("Rust is fast.".to_string()));

        let message = InboundMessage::new("summarize https://www.rust-lang.org");
        let intent = intent::classify(&message.text, &message.attachments);
        let wrong = call(SEARCH_TOOL, json!({"query": "rust"}));

        let tokens = collect(
            dispatcher(tools, MockProvider::default()).dispatch(&intent, Some(&wrong), &message),
        )
        .await;
        assert_eq!(
            tokens,
            vec![
                "\n[Correcting tool selection: Using browse_web for URL]...\n".to_string(),
                "\n[Browsing URL: https://www.rust-lang.org]...\n".to_string(),
                "\nWeb Content:\nRust is fast.\n".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_search_results_section() {
        let mut tools = MockCapabilityTools::new();
        tools
            .expect_search()
            .returning(|q| Ok(format!("No results found for: {}", q)));

        let message = InboundMessage::new("search for zzzz");
        let intent = intent::classify(&message.text, &[]);
        let model = call(SEARCH_TOOL, json!({"query": "zzzz"}));
        let tokens =
            collect(dispatcher(tools, MockProvider::default()).dispatch(&intent, Some(&model), &message))
                .await;
        assert_eq!(
            tokens,
            vec![
                "\n[Searching DuckDuckGo for: zzzz]...\n".to_string(),
                "\nSearch Results:\nNo results found for: zzzz\n".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_invocation_failure_ends_stream() {
        let mut tools = MockCapabilityTools::new();
        tools
            .expect_search()
            .returning(|_| Err(anyhow!("connection reset")));

        let message = InboundMessage::new("search for rust");
        let intent = intent::classify(&message.text, &[]);
        let tokens =
            collect(dispatcher(tools, MockProvider::default()).dispatch(&intent, None, &message)).await;

        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].starts_with("\n[Correcting tool selection"));
        assert_eq!(
            tokens[2],
            "Error in tool call: Tool execution failed: connection reset\n"
        );
    }

    struct PanickingTools;

    impl CapabilityTools for PanickingTools {
        fn search(&self, _query: &str) -> anyhow::Result<String> {
            panic!("parser exploded")
        }

        fn browse(&self, _url: &str) -> anyhow::Result<String> {
            panic!("parser exploded")
        }

        fn extract_pdf_text(&self, _path: &Path) -> anyhow::Result<String> {
            panic!("parser exploded")
        }
    }

    #[tokio::test]
    async fn test_tool_panic_is_an_invocation_failure() {
        let dispatcher = Dispatcher::new(
            Arc::new(MockProvider::default()),
            Arc::new(PanickingTools),
            String::new(),
        );

        let message = InboundMessage::new("https://example.org");
        let intent = intent::classify(&message.text, &[]);
        let model = call(BROWSE_TOOL, json!({"url": "https://example.org"}));
        let tokens = collect(dispatcher.dispatch(&intent, Some(&model), &message)).await;

        assert_eq!(tokens.len(), 2);
        assert!(tokens[1].starts_with("Error in tool call: "));
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_error() {
        let tools = MockCapabilityTools::new();
        let message = InboundMessage::new("hello");
        let model = call("run_shell", json!({}));
        let tokens = collect(
            dispatcher(tools, MockProvider::default()).dispatch(&ToolIntent::None, Some(&model), &message),
        )
        .await;
        assert_eq!(
            tokens,
            vec!["Error in tool call: Tool not found: run_shell\n".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_pdf() {
        let tools = MockCapabilityTools::new();
        let message = InboundMessage::new("hello");
        let model = call(PDF_TOOL, json!({"file_path": "/tmp/nowhere.pdf"}));
        let tokens = collect(
            dispatcher(tools, MockProvider::default()).dispatch(&ToolIntent::None, Some(&model), &message),
        )
        .await;
        assert_eq!(tokens, vec![INVALID_PDF_PATH.to_string()]);
    }

    #[tokio::test]
    async fn test_pdf_removed_after_success() {
        let dir = TempDir::new().unwrap();
        let path = upload(&dir, "report.pdf");

        let mut tools = MockCapabilityTools::new();
        tools
            .expect_extract_pdf_text()
            .times(1)
            .returning(|_| Ok("Quarterly numbers".to_string()));

        let message = InboundMessage::new("process pdf")
            .with_attachment(Attachment::new("application/pdf", path.clone()));
        let intent = intent::classify(&message.text, &message.attachments);
        let model = call(PDF_TOOL, json!({"file_path": path.display().to_string()}));

        let tokens =
            collect(dispatcher(tools, MockProvider::default()).dispatch(&intent, Some(&model), &message))
                .await;
        assert_eq!(
            tokens,
            vec![
                format!("\n[Processing PDF: {}]...\n", path.display()),
                "\nPDF Content:\nQuarterly numbers\n".to_string(),
            ]
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_pdf_removed_after_error_and_not_summarized() {
        let dir = TempDir::new().unwrap();
        let path = upload(&dir, "scan.pdf");

        let mut tools = MockCapabilityTools::new();
        tools
            .expect_extract_pdf_text()
            .returning(|_| Ok(crate::tools::pdf::NO_TEXT_ERROR.to_string()));
        let provider = MockProvider::default();

        let message = InboundMessage::new("summarize pdf")
            .with_attachment(Attachment::new("application/pdf", path.clone()));
        let intent = intent::classify(&message.text, &message.attachments);

        let tokens =
            collect(dispatcher(tools, provider.clone()).dispatch(&intent, None, &message)).await;
        assert_eq!(
            tokens.last().unwrap(),
            &format!("\n{}\n", crate::tools::pdf::NO_TEXT_ERROR)
        );
        assert!(provider.requests().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_pdf_already_gone_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let path = upload(&dir, "report.pdf");

        let mut tools = MockCapabilityTools::new();
        tools.expect_extract_pdf_text().times(1).returning(|path| {
            std::fs::remove_file(path).unwrap();
            Ok("Quarterly numbers".to_string())
        });

        let message = InboundMessage::new("process pdf")
            .with_attachment(Attachment::new("application/pdf", path.clone()));
        let intent = intent::classify(&message.text, &message.attachments);

        let tokens =
            collect(dispatcher(tools, MockProvider::default()).dispatch(&intent, None, &message))
                .await;
        assert_eq!(
            tokens,
            vec![
                "\n[Correcting tool selection: Using process_pdf for PDF]...\n".to_string(),
                format!("\n[Processing PDF: {}]...\n", path.display()),
                "\nPDF Content:\nQuarterly numbers\n".to_string(),
            ]
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_pdf_removed_when_stream_dropped_unpolled() {
        let dir = TempDir::new().unwrap();
        let path = upload(&dir, "report.pdf");

        let message = InboundMessage::new("read pdf")
            .with_attachment(Attachment::new("application/pdf", path.clone()));
        let intent = intent::classify(&message.text, &message.attachments);

        let stream = dispatcher(MockCapabilityTools::new(), MockProvider::default())
            .dispatch(&intent, None, &message);
        assert!(path.exists());
        drop(stream);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_pdf_summary_uses_tool_model() {
        let dir = TempDir::new().unwrap();
        let path = upload(&dir, "report.pdf");

        let mut tools = MockCapabilityTools::new();
        tools
            .expect_extract_pdf_text()
            .returning(|_| Ok("Revenue grew.".to_string()));
        let provider = MockProvider::new(vec![MockReply::text(&["Revenue", "", " grew"])]);

        let message = InboundMessage::new("Summarize PDF")
            .with_attachment(Attachment::new("application/pdf", path.clone()));
        let intent = intent::classify(&message.text, &message.attachments);
        let model = call(PDF_TOOL, json!({"file_path": path.display().to_string()}));

        let tokens =
            collect(dispatcher(tools, provider.clone()).dispatch(&intent, Some(&model), &message))
                .await;
        assert_eq!(
            &tokens[1..],
            &[
                "\nPDF Content:\nRevenue grew.\n".to_string(),
                "\n[Summarizing PDF content]...\n".to_string(),
                "Revenue".to_string(),
                " grew".to_string(),
            ]
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].purpose, ModelPurpose::ToolCalling);
        assert_eq!(
            requests[0].system.as_deref(),
            Some("Summarize the following text.")
        );
        assert_eq!(requests[0].messages[0].text(), "Revenue grew.");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_summary_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = upload(&dir, "report.pdf");

        let mut tools = MockCapabilityTools::new();
        tools
            .expect_extract_pdf_text()
            .returning(|_| Ok("Revenue grew.".to_string()));
        let provider = MockProvider::unavailable("connection refused");

        let message = InboundMessage::new("summarize pdf")
            .with_attachment(Attachment::new("application/pdf", path.clone()));
        let intent = intent::classify(&message.text, &message.attachments);

        let tokens = collect(dispatcher(tools, provider).dispatch(&intent, None, &message)).await;
        assert_eq!(
            tokens.last().unwrap(),
            "Error in tool call: Generation failed: connection refused\n"
        );
        assert!(!path.exists());
    }
}
