//! Output formatting for path matches.

use std::io::Write;

use clap::ValueEnum;
use serde_json::json;
use wiretree_core::facets::TcpIpFacet;
use wiretree_core::NodeRef;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `#<message> <path> = <content>` lines (default)
    Text,
    /// JSON Lines (one JSON object per match)
    Json,
}

/// Sequence number of the message `node` belongs to.
pub fn message_number(node: NodeRef<'_>) -> Option<u64> {
    node.top().facet::<TcpIpFacet>().and_then(|t| t.sequence_number)
}

/// Formats path matches for output.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write one match of `expression`.
    pub fn write_match<W: Write>(&self, expression: &str, node: NodeRef<'_>, writer: &mut W) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => self.write_text(node, writer),
            OutputFormat::Json => self.write_json(expression, node, writer),
        }
    }

    fn write_text<W: Write>(&self, node: NodeRef<'_>, writer: &mut W) -> std::io::Result<()> {
        let message = message_number(node).map_or_else(|| "-".to_string(), |n| n.to_string());
        let path = node.path();
        let path = if path.is_empty() { "$" } else { path.as_str() };
        writeln!(writer, "#{message} {path} = {}", node.text())
    }

    fn write_json<W: Write>(&self, expression: &str, node: NodeRef<'_>, writer: &mut W) -> std::io::Result<()> {
        let value = json!({
            "message": message_number(node),
            "expression": expression,
            "path": node.path(),
            "facets": node.facet_names(),
            "content": node.text(),
        });
        writeln!(writer, "{value}")
    }
}
