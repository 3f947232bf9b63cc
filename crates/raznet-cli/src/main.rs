use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use raznet::providers::configs::OllamaProviderConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;
mod session;
mod uploads;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Overrides for the ollama settings read from the environment
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// Ollama server address (default from OLLAMA_HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Model for plain conversation (default from RAZNET_CHAT_MODEL)
    #[arg(long, global = true)]
    chat_model: Option<String>,

    /// Model offered the search, browse and pdf tools (default from RAZNET_TOOL_MODEL)
    #[arg(long, global = true)]
    tool_model: Option<String>,

    /// Model that describes images (default from RAZNET_VISION_MODEL)
    #[arg(long, global = true)]
    vision_model: Option<String>,
}

impl ProviderArgs {
    pub fn into_config(self) -> Result<OllamaProviderConfig> {
        let mut config = OllamaProviderConfig::from_env()?;
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(model) = self.chat_model {
            config.chat_model = model;
        }
        if let Some(model) = self.tool_model {
            config.tool_model = model;
        }
        if let Some(model) = self.vision_model {
            config.vision_model = model;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session
    #[command(about = "Start an interactive session with the assistant")]
    Session,

    /// Send one message and stream the reply
    #[command(about = "Send a single message, optionally with files, and print the reply")]
    Run {
        /// The message text
        #[arg(short, long)]
        text: String,

        /// Files to upload with the message (repeatable)
        #[arg(short, long = "attach", value_name = "FILE")]
        attachments: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Run { text, attachments }) => {
            commands::run::execute(cli.provider, text, attachments).await
        }
        Some(Command::Session) | None => commands::session::execute(cli.provider).await,
    }
}
