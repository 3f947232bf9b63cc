use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Delta, DeltaStream, ModelPurpose, Provider};

/// One scripted reply: the deltas to stream, and optionally an error to end the stream with
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    pub deltas: Vec<Delta>,
    pub error: Option<String>,
}

impl MockReply {
    pub fn text(chunks: &[&str]) -> Self {
        Self {
            deltas: chunks.iter().map(|c| Delta::text(*c)).collect(),
            error: None,
        }
    }

    pub fn deltas(deltas: Vec<Delta>) -> Self {
        Self {
            deltas,
            error: None,
        }
    }

    pub fn failing_after(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// What the provider was asked to do
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub purpose: ModelPurpose,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
}

/// A mock provider that streams pre-configured replies for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    replies: Arc<Mutex<Vec<MockReply>>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
    refuse: Option<String>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of replies
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            ..Default::default()
        }
    }

    /// A provider that fails every request before streaming anything
    pub fn unavailable(error: &str) -> Self {
        Self {
            refuse: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        purpose: ModelPurpose,
        system: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DeltaStream> {
        self.requests.lock().unwrap().push(MockRequest {
            purpose,
            system: system.map(String::from),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        if let Some(error) = &self.refuse {
            return Err(anyhow!(error.clone()));
        }

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                MockReply::default()
            } else {
                replies.remove(0)
            }
        };

        let mut items: Vec<Result<Delta>> = reply.deltas.into_iter().map(Ok).collect();
        if let Some(error) = reply.error {
            items.push(Err(anyhow!(error)));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
