use anyhow::Result;
use std::path::PathBuf;

use super::session::build_session;
use crate::prompt::rustyline::RustylinePrompt;
use crate::ProviderArgs;

pub async fn execute(provider: ProviderArgs, text: String, attachments: Vec<PathBuf>) -> Result<()> {
    // Run is a session that handles one message without asking for input
    let mut session = build_session(provider, Box::new(RustylinePrompt::new()))?;
    session.headless_start(text, &attachments).await
}
