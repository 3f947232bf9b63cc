use super::base::{Delta, DeltaStream, ModelPurpose, Provider};
use super::configs::OllamaProviderConfig;
use super::utils::{messages_to_ollama_spec, parse_ollama_line, tools_to_ollama_spec};
use crate::models::message::Message;
use crate::models::tool::Tool;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{pin_mut, Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaProviderConfig {
        &self.config
    }

    async fn post(&self, payload: Value) -> Result<Response> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));

        let response = self.client.post(&url).json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {}\nResponse: {}", status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn stream(
        &self,
        purpose: ModelPurpose,
        system: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DeltaStream> {
        let messages_spec = messages_to_ollama_spec(system, messages);
        let tools_spec = tools_to_ollama_spec(tools)?;

        let mut payload = json!({
            "model": self.config.model_for(purpose),
            "messages": messages_spec,
            "stream": true,
        });

        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(temp) = self.config.temperature {
            payload["options"] = json!({ "temperature": temp });
        }

        tracing::debug!(
            model = self.config.model_for(purpose),
            tools = tools.len(),
            "starting ollama chat stream"
        );
        let response = self.post(payload).await?;
        Ok(ndjson_deltas(response.bytes_stream()))
    }
}

/// Split a newline delimited json body into deltas.
///
/// Lines can be split across network chunks, and so can the bytes of one character, so only
/// complete lines are decoded.
fn ndjson_deltas<S, B, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => buffer.extend_from_slice(chunk.as_ref()),
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let delta = decode_line(line);
                match delta {
                    None => continue,
                    Some(Ok(delta)) => yield Ok(delta),
                    Some(Err(e)) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(delta) = decode_line(buffer) {
            yield delta;
        }
    })
}

fn decode_line(line: Vec<u8>) -> Option<Result<Delta>> {
    let line = match String::from_utf8(line) {
        Ok(line) => line,
        Err(e) => return Some(Err(anyhow!("Invalid utf-8 from ollama: {}", e))),
    };
    if line.trim().is_empty() {
        return None;
    }
    Some(parse_ollama_line(&line))
}
