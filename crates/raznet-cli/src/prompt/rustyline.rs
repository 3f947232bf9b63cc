use std::io::{self, Write};

use anyhow::Result;
use cliclack::spinner;
use console::style;

use super::{parse_input, Input, InputType, Prompt, HELP};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30mraznet> \x1b[0m";

pub struct RustylinePrompt {
    spinner: cliclack::ProgressBar,
    busy: bool,
}

impl RustylinePrompt {
    pub fn new() -> Self {
        RustylinePrompt {
            spinner: spinner(),
            busy: false,
        }
    }
}

impl Prompt for RustylinePrompt {
    fn render_token(&mut self, token: &str) {
        print!("{}", token);
        // A failed flush only delays output until the next newline
        let _ = io::stdout().flush();
    }

    fn render_notice(&mut self, notice: &str) {
        println!("{}", style(notice).dim());
    }

    fn render_error(&mut self, error: &str) {
        eprintln!("{}", style(error).red());
    }

    fn ready(&mut self, welcome: &str) {
        println!();
        println!("{}", style(welcome).cyan());
        println!("{}", style("Type /help for commands.").dim());
        println!();
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("Thinking...");
        self.busy = true;
    }

    fn hide_busy(&mut self) {
        if self.busy {
            self.spinner.stop("");
            self.busy = false;
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let mut editor = rustyline::DefaultEditor::new()?;
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(e) => {
                match e {
                    rustyline::error::ReadlineError::Interrupted
                    | rustyline::error::ReadlineError::Eof => (),
                    _ => eprintln!("Input error: {}", e),
                }
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                });
            }
        };

        let input = parse_input(&line);
        if input.input_type == InputType::Help {
            println!("{}", HELP);
        }
        Ok(input)
    }

    fn close(&self) {
        println!();
    }
}
