use super::content::Content;
use super::role::Role;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// A message sent to an LLM
pub struct Message {
    pub role: Role,
    pub content: Vec<Content>,
}

impl Message {
    /// Create a new system message
    pub fn system() -> Self {
        Message {
            role: Role::System,
            content: Vec::new(),
        }
    }

    /// Create a new user message
    pub fn user() -> Self {
        Message {
            role: Role::User,
            content: Vec::new(),
        }
    }

    /// Create a new assistant message
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            content: Vec::new(),
        }
    }

    /// Add any Content to the message
    pub fn with_content(mut self, content: Content) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(Content::text(text))
    }

    /// Add image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, data: S, mime_type: T) -> Self {
        self.with_content(Content::image(data, mime_type))
    }

    /// All text in the message, joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The image contents in the message
    pub fn images(&self) -> impl Iterator<Item = (&str, &str)> {
        self.content.iter().filter_map(|c| c.as_image())
    }
}
