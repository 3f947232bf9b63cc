use crate::error::UploadError;
use crate::state::AppState;
use crate::uploads::UploadDir;
use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use raznet::models::attachment::{Attachment, InboundMessage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    convert::Infallible,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

// An uploaded file, already written to disk by the front-end
#[derive(Debug, Deserialize)]
struct UploadedFile {
    #[serde(rename = "mediaType", alias = "mime")]
    media_type: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachments: Vec<UploadedFile>,
}

impl ChatRequest {
    /// Build the message, refusing any attachment outside the upload directory
    fn into_message(self, uploads: &UploadDir) -> Result<InboundMessage, UploadError> {
        let attachments = self
            .attachments
            .into_iter()
            .map(|file| Ok(Attachment::new(file.media_type, uploads.resolve(&file.path)?)))
            .collect::<Result<Vec<_>, UploadError>>()?;

        Ok(InboundMessage {
            text: self.text,
            attachments,
        })
    }
}

fn rejected(err: UploadError) -> StatusCode {
    tracing::warn!("rejected attachment: {}", err);
    StatusCode::BAD_REQUEST
}

// Custom SSE response type that implements the Vercel AI SDK protocol
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .header("x-vercel-ai-data-stream", "v1")
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

// Protocol-specific message formatting
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn format_text(text: &str) -> String {
        let encoded_text = serde_json::to_string(text).unwrap_or_else(|_| String::new());
        format!("0:{}\n", encoded_text)
    }

    fn format_finish(reason: &str) -> String {
        // Finish messages start with "d:"
        let finish = json!({
            "finishReason": reason,
            "usage": {
                "promptTokens": 0,
                "completionTokens": 0
            }
        });
        format!("d:{}\n", finish)
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    // Check protocol header (optional in our case)
    if let Some(protocol) = headers.get("x-protocol") {
        if protocol.to_str().map(|p| p != "data").unwrap_or(true) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let message = request.into_message(&state.uploads).map_err(rejected)?;

    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    tracing::debug!(
        text = %message.text,
        attachments = message.attachments.len(),
        "received message"
    );

    tokio::spawn(async move {
        let mut tokens = state.coordinator.handle(message);

        loop {
            match timeout(Duration::from_millis(500), tokens.next()).await {
                Ok(Some(token)) => {
                    if let Err(e) = tx.send(ProtocolFormatter::format_text(&token)).await {
                        tracing::error!("Error sending message through channel: {}", e);
                        break;
                    }
                }
                Ok(None) => break,
                // Heartbeat, used to detect disconnected clients and stop working for them
                Err(_) => {
                    if tx.is_closed() {
                        break;
                    }
                }
            }
        }

        let _ = tx.send(ProtocolFormatter::format_finish("stop")).await;
    });

    Ok(SseResponse::new(stream))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    prompt: String,
    #[serde(default)]
    attachments: Vec<UploadedFile>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
}

// simple ask for a response, non streaming
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, StatusCode> {
    let message = ChatRequest {
        text: request.prompt,
        attachments: request.attachments,
    }
    .into_message(&state.uploads)
    .map_err(rejected)?;

    let response: String = state.coordinator.handle(message).collect().await;

    Ok(Json(AskResponse {
        response: response.trim().to_string(),
    }))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reply", post(handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
}
