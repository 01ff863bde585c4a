//! Interactive REPL (Read-Eval-Print Loop).

use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};

/// REPL meta-commands (prefixed with `.`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Show help
    Help,
    /// List loaded messages
    Messages,
    /// Print the tree of one message
    Tree(u64),
    /// List registered keys
    Keys,
    /// Show cache and history statistics
    Stats,
    /// Exit the REPL
    Quit,
    /// Evaluate a path expression
    Path(String),
    /// Unknown command
    Unknown(String),
    /// Empty input
    Empty,
}

impl ReplCommand {
    /// Parse a line of input into a command.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }

        if !trimmed.starts_with('.') {
            if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
                return ReplCommand::Quit;
            }
            return ReplCommand::Path(trimmed.to_string());
        }

        let lower = trimmed.to_lowercase();
        if lower == ".tree" || lower.starts_with(".tree ") {
            return Self::parse_tree(trimmed);
        }

        match lower.as_str() {
            ".help" | ".h" | ".?" => ReplCommand::Help,
            ".messages" | ".m" => ReplCommand::Messages,
            ".keys" | ".k" => ReplCommand::Keys,
            ".stats" => ReplCommand::Stats,
            ".quit" | ".exit" | ".q" => ReplCommand::Quit,
            _ => ReplCommand::Unknown(trimmed.to_string()),
        }
    }

    /// Parse .tree command with required message number argument.
    fn parse_tree(input: &str) -> Self {
        let rest = input[".tree".len()..].trim();
        if rest.is_empty() {
            return ReplCommand::Unknown(".tree requires a message number".to_string());
        }
        match rest.parse::<u64>() {
            Ok(number) => ReplCommand::Tree(number),
            Err(_) => ReplCommand::Unknown(format!("Invalid message number: {rest}")),
        }
    }
}

/// Input from the REPL - either a command or a request to quit.
#[derive(Debug)]
pub enum ReplInput {
    /// User provided input
    Command(ReplCommand),
    /// User pressed Ctrl-D or Ctrl-C
    Exit,
}

/// Interactive path REPL using rustyline for line editing and history.
pub struct Repl {
    editor: DefaultEditor,
    history_file: Option<String>,
}

impl Repl {
    pub fn new() -> RlResult<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            history_file: None,
        })
    }

    /// Set the history file path.
    pub fn with_history(mut self, path: &str) -> Self {
        self.history_file = Some(path.to_string());
        if let Err(e) = self.editor.load_history(path) {
            tracing::debug!("Could not load history: {}", e);
        }
        self
    }

    /// Read one line of input.
    pub fn read_input(&mut self) -> RlResult<ReplInput> {
        match self.editor.readline("wiretree> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(ReplInput::Command(ReplCommand::parse(&line)))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(ReplInput::Exit),
            Err(e) => Err(e),
        }
    }

    /// Save history to file.
    pub fn save_history(&mut self) {
        if let Some(ref path) = self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                tracing::debug!("Could not save history: {}", e);
            }
        }
    }
}

impl Drop for Repl {
    fn drop(&mut self) {
        self.save_history();
    }
}
