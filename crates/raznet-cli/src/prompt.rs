use anyhow::Result;
use std::path::PathBuf;

pub mod rustyline;

pub trait Prompt {
    /// Print one streamed chunk of the assistant's reply
    fn render_token(&mut self, token: &str);
    fn render_notice(&mut self, notice: &str);
    fn render_error(&mut self, error: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn ready(&mut self, welcome: &str) {
        self.render_notice(welcome);
    }
}

#[derive(Debug, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Text of a message, or the path for /attach
}

#[derive(Debug, PartialEq)]
pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Attach,   // User staged a file for the next message
    Exit,     // User wants to exit the session
    Help,     // User asked for the command list
}

impl Input {
    fn control(input_type: InputType) -> Self {
        Input {
            input_type,
            content: None,
        }
    }

    pub fn attached_path(&self) -> Option<PathBuf> {
        match self.input_type {
            InputType::Attach => self.content.as_ref().map(PathBuf::from),
            _ => None,
        }
    }
}

/// Turn a line typed at the prompt into an input.
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();

    if text.is_empty() {
        return Input::control(InputType::AskAgain);
    }

    if text.eq_ignore_ascii_case("/exit") || text.eq_ignore_ascii_case("/quit") {
        return Input::control(InputType::Exit);
    }

    if text.eq_ignore_ascii_case("/?") || text.eq_ignore_ascii_case("/help") {
        return Input::control(InputType::Help);
    }

    if let Some(rest) = strip_command(text, "/attach") {
        let path = rest.trim().trim_matches(|c| c == '"' || c == '\'');
        if path.is_empty() {
            return Input::control(InputType::AskAgain);
        }
        return Input {
            input_type: InputType::Attach,
            content: Some(path.to_string()),
        };
    }

    Input {
        input_type: InputType::Message,
        content: Some(text.to_string()),
    }
}

fn strip_command<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    let head = text.get(..command.len())?;
    if !head.eq_ignore_ascii_case(command) {
        return None;
    }
    let rest = &text[command.len()..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

pub const HELP: &str = "Commands:
/attach <path> - Upload a file with your next message (PDF or image)
/exit - Exit the session
/? | /help - Display this help message
Ctrl+C - Interrupt the current reply";
