use anyhow::{anyhow, Result};
use std::env;

use super::base::ModelPurpose;

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_CHAT_MODEL: &str = "llama3.1:latest";
pub const OLLAMA_TOOL_MODEL: &str = "llama3.2:1b";
pub const OLLAMA_VISION_MODEL: &str = "moondream:1.8b-v2-q3_K_S";

/// Connection and model settings for an ollama server
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaProviderConfig {
    pub host: String,
    /// Model for plain conversation
    pub chat_model: String,
    /// Model that is offered the tool registry
    pub tool_model: String,
    /// Model that describes images
    pub vision_model: String,
    pub temperature: Option<f32>,
}

impl Default for OllamaProviderConfig {
    fn default() -> Self {
        Self {
            host: OLLAMA_HOST.to_string(),
            chat_model: OLLAMA_CHAT_MODEL.to_string(),
            tool_model: OLLAMA_TOOL_MODEL.to_string(),
            vision_model: OLLAMA_VISION_MODEL.to_string(),
            temperature: None,
        }
    }
}

impl OllamaProviderConfig {
    pub fn model_for(&self, purpose: ModelPurpose) -> &str {
        match purpose {
            ModelPurpose::Chat => &self.chat_model,
            ModelPurpose::ToolCalling => &self.tool_model,
            ModelPurpose::Vision => &self.vision_model,
        }
    }

    /// Load configuration from environment variables, falling back to the defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let temperature = match get_env("RAZNET_TEMPERATURE")? {
            Some(value) => Some(
                value
                    .parse::<f32>()
                    .map_err(|e| anyhow!("Invalid RAZNET_TEMPERATURE '{}': {}", value, e))?,
            ),
            None => None,
        };

        Ok(Self {
            host: get_env("OLLAMA_HOST")?.unwrap_or(defaults.host),
            chat_model: get_env("RAZNET_CHAT_MODEL")?.unwrap_or(defaults.chat_model),
            tool_model: get_env("RAZNET_TOOL_MODEL")?.unwrap_or(defaults.tool_model),
            vision_model: get_env("RAZNET_VISION_MODEL")?.unwrap_or(defaults.vision_model),
            temperature,
        })
    }
}

/// Helper function to get optional environment variables with error handling
fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow!("Environment variable '{}' is not valid: {}", key, e)),
    }
}
