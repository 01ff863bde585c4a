//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Interactive REPL via rustyline
//! - Output formatting (text, JSON lines)
//! - Evaluating paths against loaded messages

mod args;
mod output;
mod repl;
mod session;

pub use args::{parse_key, Args};
pub use output::{message_number, OutputFormat, OutputFormatter};
pub use repl::{Repl, ReplCommand, ReplInput};
pub use session::Session;
