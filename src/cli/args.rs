//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;
use wiretree_core::key::{Key, PRECEDENCE_KEY_FOLDER};
use wiretree_core::ConverterConfig;

use super::OutputFormat;

/// Parse a `NAME=HEX` key argument.
pub fn parse_key(value: &str) -> Result<Key, String> {
    let (name, material) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=HEX, got '{value}'"))?;
    if name.is_empty() {
        return Err("key name is empty".to_string());
    }
    let material = hex::decode(material.trim()).map_err(|e| format!("invalid hex for key '{name}': {e}"))?;
    Ok(Key::new(name, material, PRECEDENCE_KEY_FOLDER))
}

/// Decode captured HTTP traffic and query it with path expressions.
#[derive(Parser, Debug)]
#[command(name = "wiretree")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Traffic file (JSON lines) to load
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Evaluate a path expression against every message and exit (repeatable)
    #[arg(short = 'e', long = "path", value_name = "PATH")]
    pub paths: Vec<String>,

    /// Only consider messages whose root satisfies this predicate
    #[arg(long = "filter", value_name = "PREDICATE")]
    pub filter: Option<String>,

    /// Output format for matches
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Print the decoded tree of every message
    #[arg(long = "tree")]
    pub tree: bool,

    /// Symmetric key for JWT signature checks (repeatable)
    #[arg(long = "key", value_name = "NAME=HEX", value_parser = parse_key)]
    pub keys: Vec<Key>,

    /// History bound in MiB of raw message bytes
    #[arg(long = "buffer-mb", value_name = "N")]
    pub buffer_mb: Option<usize>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Check if we should enter interactive REPL mode.
    pub fn is_interactive(&self) -> bool {
        self.paths.is_empty() && !self.tree
    }

    pub fn converter_config(&self) -> ConverterConfig {
        let mut config = ConverterConfig::default();
        if let Some(megabytes) = self.buffer_mb {
            config = config.with_buffer_limit_mb(megabytes);
        }
        for key in &self.keys {
            config = config.with_key(key.clone());
        }
        config
    }
}
