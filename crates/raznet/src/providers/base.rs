use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Which of the configured models a request is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPurpose {
    Chat,
    ToolCalling,
    Vision,
}

/// One streamed piece of a model reply: some text, some tool calls, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Only present on the final piece of a reply
    pub usage: Option<Usage>,
}

impl Delta {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A reply that is being generated. It can be consumed once, and dropping it releases the
/// underlying connection.
pub type DeltaStream = BoxStream<'static, Result<Delta>>;

/// Base trait for model providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start generating a reply to the messages, streaming it back piece by piece
    async fn stream(
        &self,
        purpose: ModelPurpose,
        system: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DeltaStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_serialization() -> Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage)?;
        let deserialized: Usage = serde_json::from_str(&serialized)?;
        assert_eq!(usage, deserialized);

        let json_value: serde_json::Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["total_tokens"], json!(30));
        Ok(())
    }

    #[test]
    fn test_delta_builders() {
        let delta = Delta::text("hi").with_usage(Usage::default());
        assert_eq!(delta.text.as_deref(), Some("hi"));
        assert!(delta.tool_calls.is_empty());
        assert!(delta.usage.is_some());
    }
}
