use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use config::{Config, Environment, File};
use raznet::providers::configs::{
    OllamaProviderConfig, OLLAMA_CHAT_MODEL, OLLAMA_HOST, OLLAMA_TOOL_MODEL, OLLAMA_VISION_MODEL,
};
use raznet::tools::ToolsConfig;
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// The ollama server and the model used for each purpose
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_ollama_host")]
    pub host: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_tool_model")]
    pub tool_model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            chat_model: default_chat_model(),
            tool_model: default_tool_model(),
            vision_model: default_vision_model(),
            temperature: None,
        }
    }
}

impl ProviderSettings {
    pub fn into_config(self) -> OllamaProviderConfig {
        OllamaProviderConfig {
            host: self.host,
            chat_model: self.chat_model,
            tool_model: self.tool_model,
            vision_model: self.vision_model,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
    #[serde(default = "default_max_pdf_chars")]
    pub max_pdf_chars: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_search_results: default_max_search_results(),
            max_page_chars: default_max_page_chars(),
            max_pdf_chars: default_max_pdf_chars(),
        }
    }
}

impl ToolSettings {
    pub fn into_config(self) -> ToolsConfig {
        ToolsConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_search_results: self.max_search_results,
            max_page_chars: self.max_page_chars,
            max_pdf_chars: self.max_pdf_chars,
            ..Default::default()
        }
    }
}

/// Where the front-end stores uploaded files
#[derive(Debug, Deserialize)]
pub struct UploadSettings {
    #[serde(default = "default_uploads_dir")]
    pub dir: PathBuf,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub uploads: UploadSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_ollama_host())?
            // An optional raznet.toml in the working directory, overridden by the environment
            .add_source(File::with_name("raznet").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `host`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_ollama_host() -> String {
    OLLAMA_HOST.to_string()
}

fn default_chat_model() -> String {
    OLLAMA_CHAT_MODEL.to_string()
}

fn default_tool_model() -> String {
    OLLAMA_TOOL_MODEL.to_string()
}

fn default_vision_model() -> String {
    OLLAMA_VISION_MODEL.to_string()
}

fn default_uploads_dir() -> PathBuf {
    std::env::temp_dir().join("raznet-uploads")
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_search_results() -> usize {
    3
}

fn default_max_page_chars() -> usize {
    500
}

fn default_max_pdf_chars() -> usize {
    1000
}
