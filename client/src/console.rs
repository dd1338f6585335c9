use inquire::InquireError;
use ocean_cli_shared::{CliError, CliResult};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::IsTerminal;
use tracing::warn;

/// Source of command lines for the interactive loop
pub trait LineReader {
    /// Next line, or `None` once input is exhausted
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// Human answering yes/no questions.
///
/// Asking blocks without a timeout; only killing the process cancels it.
pub trait Prompt: Send {
    fn is_interactive(&self) -> bool;
    fn ask(&mut self, question: &str) -> CliResult<String>;
}

/// Only `y` / `yes` (any case) count as consent
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub struct TerminalReader {
    editor: DefaultEditor,
}

impl TerminalReader {
    pub fn new() -> CliResult<Self> {
        let editor = DefaultEditor::new()
            .map_err(|e| CliError::Io(std::io::Error::other(e.to_string())))?;
        Ok(Self { editor })
    }
}

impl LineReader for TerminalReader {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Some(line)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => None,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                None
            }
        }
    }
}

/// Asks on the controlling terminal
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn ask(&mut self, question: &str) -> CliResult<String> {
        match inquire::Text::new(question).prompt() {
            Ok(answer) => Ok(answer),
            // Escape / Ctrl-C at the question is a refusal, not a crash
            Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
                Ok(String::new())
            }
            Err(InquireError::NotTTY) => Err(CliError::NonInteractiveConfirmation),
            Err(e) => Err(CliError::Io(std::io::Error::other(e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affirmative_answers() {
        for yes in ["y", "Y", "yes", "YES", " Yes "] {
            assert!(is_affirmative(yes), "{yes:?} should be accepted");
        }
        for no in ["", "n", "no", "yep", "sure", "ye"] {
            assert!(!is_affirmative(no), "{no:?} should be refused");
        }
    }
}
