//! Message routing: picks a pipeline for each inbound message and streams its output.
use anyhow::{anyhow, Result};
use base64::Engine;
use futures::{pin_mut, Stream, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::{Dispatcher, TokenStream, UploadCleanup};
use crate::intent::{self, ToolIntent, PDF_PHRASES};
use crate::models::attachment::{Attachment, InboundMessage};
use crate::models::message::Message;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{Delta, DeltaStream, ModelPurpose, Provider};
use crate::tools::{self, CapabilityTools, BROWSE_TOOL, PDF_TOOL, SEARCH_TOOL};

pub const ASSISTANT_NAME: &str = "Raznet WebUI Assistant";

pub const GUIDANCE: &str = "Please type 'describe' for images or upload a PDF to process its content.";

const DESCRIBE: &str = "describe";

/// Words that send a message without attachments to the tool calling pipeline
const TOOL_KEYWORDS: [&str; 3] = ["search", "look up", "browse"];

/// The pipeline a message is handled by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Text,
    Vision(Attachment),
    /// The message the tool pipeline works on, rewritten for PDF uploads
    ToolCalling(InboundMessage),
    Guidance,
}

/// Choose a pipeline. Attachments decide first, then keywords, then plain chat.
///
/// A PDF upload is rewritten to `process pdf {path}`, or to `summarize pdf {path}` when the
/// user asked for a summary, so an uploaded PDF can be summarized without typing the phrase.
pub fn route(message: &InboundMessage) -> Route {
    if !message.attachments.is_empty() {
        if let Some(pdf) = message.first_pdf() {
            let directive = if intent::wants_summary(&message.text) {
                "summarize pdf"
            } else {
                "process pdf"
            };
            return Route::ToolCalling(InboundMessage {
                text: format!("{} {}", directive, pdf.storage_path.display()),
                attachments: message.attachments.clone(),
            });
        }

        let mut images = message.images();
        return match (images.next(), images.next()) {
            (Some(image), None) if message.text.trim().eq_ignore_ascii_case(DESCRIBE) => {
                Route::Vision(image.clone())
            }
            _ => Route::Guidance,
        };
    }

    let lowered = message.text.to_ascii_lowercase();
    if TOOL_KEYWORDS.iter().any(|k| lowered.contains(k))
        || intent::first_url(&message.text).is_some()
    {
        return Route::ToolCalling(message.clone());
    }

    Route::Text
}

/// The greeting shown when a session starts
pub fn welcome_message() -> Result<String> {
    Ok(load_prompt_file(
        "welcome.md",
        &json!({ "name": ASSISTANT_NAME, "pdf_phrases": PDF_PHRASES }),
    )?)
}

#[derive(Clone)]
struct Prompts {
    text: String,
    tool_calling: String,
    vision: String,
}

/// Routes messages to the chat, vision and tool calling pipelines
#[derive(Clone)]
pub struct Coordinator {
    provider: Arc<dyn Provider>,
    dispatcher: Dispatcher,
    prompts: Prompts,
}

impl Coordinator {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<dyn CapabilityTools>) -> Result<Self> {
        let empty: HashMap<String, String> = HashMap::new();
        let prompts = Prompts {
            text: load_prompt_file("text.md", &empty)?,
            tool_calling: load_prompt_file(
                "tool_calling.md",
                &json!({
                    "tools": tools::registry(),
                    "search_tool": SEARCH_TOOL,
                    "browse_tool": BROWSE_TOOL,
                    "pdf_tool": PDF_TOOL,
                    "pdf_phrases": PDF_PHRASES,
                }),
            )?,
            vision: load_prompt_file("vision.md", &empty)?,
        };
        let summarize = load_prompt_file("summarize.md", &empty)?;

        Ok(Self {
            dispatcher: Dispatcher::new(Arc::clone(&provider), tools, summarize),
            provider,
            prompts,
        })
    }

    /// Handle one message, streaming every non-empty chunk in the order it is produced.
    ///
    /// A failure ends the stream with one `Error processing message:` chunk; anything sent
    /// before it stands.
    pub fn handle(&self, message: InboundMessage) -> TokenStream {
        let route = route(&message);
        tracing::debug!(?route, "routing message");

        // A PDF upload is consumed whether or not a tool ever runs for it
        let cleanup = match &route {
            Route::ToolCalling(rewritten) => {
                match intent::classify(&rewritten.text, &rewritten.attachments) {
                    ToolIntent::ProcessPdf { file_path, .. } => Some(UploadCleanup(file_path)),
                    _ => None,
                }
            }
            _ => None,
        };

        let chunks = self.clone().pipeline(route, message);
        Box::pin(async_stream::stream! {
            let _cleanup = cleanup;
            pin_mut!(chunks);
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) if chunk.is_empty() => {}
                    Ok(chunk) => yield chunk,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to process message");
                        yield format!("Error processing message: {}", e);
                        break;
                    }
                }
            }
        })
    }

    fn pipeline(
        self,
        route: Route,
        message: InboundMessage,
    ) -> impl Stream<Item = Result<String>> + Send {
        async_stream::stream! {
            match route {
                Route::Guidance => yield Ok(GUIDANCE.to_string()),
                Route::Text => {
                    let messages = vec![Message::user().with_text(message.text)];
                    let started = self
                        .provider
                        .stream(ModelPurpose::Chat, Some(self.prompts.text.as_str()), &messages, &[])
                        .await;
                    match started {
                        Ok(deltas) => {
                            let chunks = text_chunks(deltas);
                            pin_mut!(chunks);
                            while let Some(chunk) = chunks.next().await {
                                yield chunk;
                            }
                        }
                        Err(e) => yield Err(e),
                    }
                }
                Route::Vision(image) => {
                    let started = match self.describe(&image).await {
                        Ok(started) => started,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    let chunks = text_chunks(started);
                    pin_mut!(chunks);
                    while let Some(chunk) = chunks.next().await {
                        yield chunk;
                    }
                }
                Route::ToolCalling(message) => {
                    let chunks = self.call_tools(message);
                    pin_mut!(chunks);
                    while let Some(chunk) = chunks.next().await {
                        yield chunk;
                    }
                }
            }
        }
    }

    async fn describe(&self, image: &Attachment) -> Result<DeltaStream> {
        let bytes = tokio::fs::read(&image.storage_path).await.map_err(|e| {
            anyhow!("Failed to read image {}: {}", image.storage_path.display(), e)
        })?;
        tracing::debug!(size = bytes.len(), "describing image");

        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        let messages = vec![Message::user()
            .with_text(self.prompts.vision.clone())
            .with_image(data, image.media_type.clone())];
        self.provider
            .stream(ModelPurpose::Vision, None, &messages, &[])
            .await
    }

    /// Stream the tool model's reply and dispatch its first tool call.
    ///
    /// When the model never calls a tool but the message clearly asks for one, the tool
    /// still runs.
    fn call_tools(self, message: InboundMessage) -> impl Stream<Item = Result<String>> + Send {
        async_stream::stream! {
            let intent = intent::classify(&message.text, &message.attachments);
            tracing::debug!(?intent, "classified message");

            let messages = vec![Message::user().with_text(message.text.clone())];
            let started = self
                .provider
                .stream(
                    ModelPurpose::ToolCalling,
                    Some(self.prompts.tool_calling.as_str()),
                    &messages,
                    tools::registry(),
                )
                .await;
            let mut deltas = match started {
                Ok(deltas) => deltas,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut dispatched = false;
            while let Some(delta) = deltas.next().await {
                let delta = match delta {
                    Ok(delta) => delta,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                log_usage(&delta);

                if let Some(text) = delta.text {
                    yield Ok(text);
                }

                for call in delta.tool_calls {
                    if dispatched {
                        tracing::warn!(tool = %call.name, "ignoring additional tool call");
                        continue;
                    }
                    dispatched = true;
                    tracing::debug!(tool = %call.name, "model requested tool");

                    let mut tokens = self.dispatcher.dispatch(&intent, Some(&call), &message);
                    while let Some(token) = tokens.next().await {
                        yield Ok(token);
                    }
                }
            }

            if !dispatched && !intent.is_none() {
                tracing::debug!("model made no tool call, dispatching the classified intent");
                let mut tokens = self.dispatcher.dispatch(&intent, None, &message);
                while let Some(token) = tokens.next().await {
                    yield Ok(token);
                }
            }
        }
    }
}

fn text_chunks(deltas: DeltaStream) -> impl Stream<Item = Result<String>> + Send {
    deltas.map(|delta| {
        delta.map(|delta| {
            log_usage(&delta);
            delta.text.unwrap_or_default()
        })
    })
}

fn log_usage(delta: &Delta) {
    if let Some(usage) = &delta.usage {
        tracing::debug!(
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "model usage"
        );
    }
}
