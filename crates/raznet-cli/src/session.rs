use anyhow::Result;
use futures::StreamExt;
use std::path::{Path, PathBuf};

use crate::prompt::{InputType, Prompt};
use crate::uploads::Uploads;
use raznet::coordinator::{welcome_message, Coordinator};
use raznet::models::attachment::{Attachment, InboundMessage};

pub struct Session<'a> {
    coordinator: Coordinator,
    prompt: Box<dyn Prompt + 'a>,
    uploads: Uploads,
    /// Files staged with /attach, sent with the next message
    pending: Vec<Attachment>,
}

impl<'a> Session<'a> {
    pub fn new(coordinator: Coordinator, prompt: Box<impl Prompt + 'a>) -> Result<Self> {
        Ok(Session {
            coordinator,
            prompt,
            uploads: Uploads::new()?,
            pending: Vec::new(),
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready(&welcome_message()?);

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        let message = self.take_message(content);
                        self.process(message).await;
                    }
                }
                InputType::Attach => {
                    if let Some(path) = input.attached_path() {
                        self.attach(&path);
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain | InputType::Help => continue,
            }
        }

        self.close_session();
        Ok(())
    }

    /// Send a single message with its files and stream the reply.
    pub async fn headless_start(&mut self, text: String, attachments: &[PathBuf]) -> Result<()> {
        for path in attachments {
            let attachment = self.uploads.stage(path)?;
            self.pending.push(attachment);
        }

        let message = self.take_message(text);
        self.process(message).await;
        self.close_session();
        Ok(())
    }

    fn attach(&mut self, path: &Path) {
        match self.uploads.stage(path) {
            Ok(attachment) => {
                self.prompt.render_notice(&format!(
                    "Attached {} ({}). It will be sent with your next message.",
                    path.display(),
                    attachment.media_type
                ));
                self.pending.push(attachment);
            }
            Err(e) => self.prompt.render_error(&e.to_string()),
        }
    }

    fn take_message(&mut self, text: String) -> InboundMessage {
        InboundMessage {
            text,
            attachments: std::mem::take(&mut self.pending),
        }
    }

    async fn process(&mut self, message: InboundMessage) {
        tracing::debug!(
            attachments = message.attachments.len(),
            "sending message to coordinator"
        );
        self.prompt.show_busy();

        let mut stream = self.coordinator.handle(message);
        loop {
            tokio::select! {
                token = stream.next() => {
                    match token {
                        Some(token) => {
                            self.prompt.hide_busy();
                            self.prompt.render_token(&token);
                        }
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    drop(stream);
                    self.prompt.hide_busy();
                    self.prompt.render_notice("\nInterrupted.");
                    break;
                }
            }
        }

        self.prompt.hide_busy();
        self.prompt.render_token("\n");
    }

    fn close_session(&mut self) {
        self.prompt.close();
    }
}
