use anyhow::Result;
use raznet::coordinator::Coordinator;
use raznet::providers::ollama::OllamaProvider;
use raznet::tools::WebTools;
use std::sync::Arc;

use crate::prompt::rustyline::RustylinePrompt;
use crate::prompt::Prompt;
use crate::session::Session;
use crate::ProviderArgs;

pub fn build_session<'a>(
    provider: ProviderArgs,
    prompt: Box<impl Prompt + 'a>,
) -> Result<Session<'a>> {
    let config = provider.into_config()?;
    tracing::debug!(host = %config.host, "connecting to ollama");

    let provider = OllamaProvider::new(config)?;
    let coordinator = Coordinator::new(Arc::new(provider), Arc::new(WebTools::default()))?;
    Session::new(coordinator, prompt)
}

pub async fn execute(provider: ProviderArgs) -> Result<()> {
    let mut session = build_session(provider, Box::new(RustylinePrompt::new()))?;
    session.start().await
}
