//! Loaded traffic and the queries run against it.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use wiretree_core::facets::{HostnameFacet, TcpIpFacet};
use wiretree_core::predicate::{self, Predicate};
use wiretree_core::{Converter, Document, NodeRef, PathExpression, TrafficFileReader, TreePrinter};

use super::{message_number, OutputFormatter};

/// A converter with its history, an optional message filter and a
/// formatter.
pub struct Session {
    converter: Converter,
    filter: Option<Predicate>,
    formatter: OutputFormatter,
}

impl Session {
    pub fn new(converter: Converter, formatter: OutputFormatter) -> Self {
        Self {
            converter,
            filter: None,
            formatter,
        }
    }

    /// Only messages whose root satisfies `expression` are queried.
    pub fn with_filter(mut self, expression: &str) -> Result<Self> {
        let filter = Predicate::compile(expression).with_context(|| format!("Invalid filter: {expression}"))?;
        self.filter = Some(filter);
        Ok(self)
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Convert every record of a traffic file into history.
    pub fn load(&self, path: &Path) -> Result<usize> {
        let mut reader = TrafficFileReader::open(path)
            .with_context(|| format!("Failed to open traffic file: {}", path.display()))?;
        self.converter
            .consume(&mut reader)
            .with_context(|| format!("Failed to read traffic file: {}", path.display()))
    }

    /// Retained messages that pass the filter.
    pub fn messages(&self) -> Vec<Arc<Document>> {
        self.converter
            .history()
            .messages()
            .into_iter()
            .filter(|message| match &self.filter {
                Some(filter) => filter.matches(message.root(), None),
                None => true,
            })
            .collect()
    }

    /// Evaluate every expression against every message; returns the number
    /// of matches written.
    pub fn run_paths<W: Write>(&self, expressions: &[String], writer: &mut W) -> Result<usize> {
        let parsed = expressions
            .iter()
            .map(|e| PathExpression::parse(e).with_context(|| format!("Invalid path: {e}")))
            .collect::<Result<Vec<_>>>()?;

        let mut count = 0;
        for message in self.messages() {
            for expression in &parsed {
                for node in expression.execute(message.root()) {
                    self.formatter.write_match(expression.source(), node, writer)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Print the decoded tree of every message.
    pub fn print_trees<W: Write>(&self, writer: &mut W) -> Result<()> {
        for message in self.messages() {
            self.write_tree(message.root(), writer)?;
        }
        Ok(())
    }

    /// Print the tree of the message with sequence number `number`.
    pub fn print_tree<W: Write>(&self, number: u64, writer: &mut W) -> Result<bool> {
        match self.converter.history().get(number) {
            Some(message) => {
                self.write_tree(message.root(), writer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn write_tree<W: Write>(&self, root: NodeRef<'_>, writer: &mut W) -> Result<()> {
        let number = message_number(root).map_or_else(|| "-".to_string(), |n| n.to_string());
        writeln!(writer, "# message {number}")?;
        write!(writer, "{}", TreePrinter::new().render(root))?;
        Ok(())
    }

    /// One summary line per message.
    pub fn print_messages<W: Write>(&self, writer: &mut W) -> Result<()> {
        for message in self.messages() {
            let root = message.root();
            let transport = root.facet::<TcpIpFacet>();
            let endpoint = |id| {
                root.document()
                    .get(id)
                    .and_then(|n| n.facet::<HostnameFacet>())
                    .map_or_else(|| "?".to_string(), |h| h.hostname.to_string())
            };
            let sender = transport.and_then(|t| t.sender).map_or_else(|| "?".to_string(), endpoint);
            let receiver = transport.and_then(|t| t.receiver).map_or_else(|| "?".to_string(), endpoint);
            let number = message_number(root).map_or_else(|| "-".to_string(), |n| n.to_string());
            let text = root.text();
            let first_line = text.lines().next().unwrap_or_default();
            writeln!(writer, "#{number:<4} {sender} -> {receiver}  {first_line}")?;
        }
        Ok(())
    }

    pub fn print_keys<W: Write>(&self, writer: &mut W) -> Result<()> {
        let keys = self.converter.key_manager().all_keys();
        if keys.is_empty() {
            writeln!(writer, "No keys registered")?;
        }
        for key in keys {
            writeln!(writer, "{:<24} precedence {}", key.name(), key.precedence())?;
        }
        Ok(())
    }

    pub fn print_stats<W: Write>(&self, writer: &mut W) -> Result<()> {
        let history = self.converter.history().stats();
        let cache = predicate::cache_stats();
        writeln!(writer, "Messages:      {}", history.messages)?;
        writeln!(writer, "History bytes: {}", history.total_bytes)?;
        writeln!(writer, "Evicted:       {}", history.evicted)?;
        writeln!(
            writer,
            "Predicate cache: {} entries, {} hits, {} misses ({:.1}% hit rate), {} evictions",
            cache.entries,
            cache.hits,
            cache.misses,
            cache.hit_ratio() * 100.0,
            cache.evictions
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    fn session() -> Session {
        let converter = Converter::new();
        converter.parse_message("GET /a?x=1 HTTP/1.1\r\nHost: example.com\r\n\r\n", None, None);
        converter.parse_message("HTTP/1.1 200 OK\r\n\r\n", None, None);
        Session::new(converter, OutputFormatter::new(OutputFormat::Text))
    }

    #[test]
    fn test_run_paths() {
        let session = session();
        let mut out = Vec::new();
        let count = session
            .run_paths(&["$.header.Host".to_string(), "$.responseCode".to_string()], &mut out)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#0 header.Host = example.com\n#1 responseCode = 200\n"
        );
    }

    #[test]
    fn test_filter() {
        let session = session().with_filter("isRequest").unwrap();
        assert_eq!(session.messages().len(), 1);
        let mut out = Vec::new();
        assert_eq!(session.run_paths(&["$.responseCode".to_string()], &mut out).unwrap(), 0);

        assert!(Session::new(Converter::new(), OutputFormatter::new(OutputFormat::Text))
            .with_filter("key ==")
            .is_err());
    }

    #[test]
    fn test_invalid_path() {
        let session = session();
        let mut out = Vec::new();
        let err = session.run_paths(&["header".to_string()], &mut out).unwrap_err();
        assert!(err.to_string().contains("Invalid path"));
    }

    #[test]
    fn test_printers() {
        let session = session();
        let mut out = Vec::new();
        assert!(session.print_tree(0, &mut out).unwrap());
        assert!(!session.print_tree(9, &mut out).unwrap());
        session.print_messages(&mut out).unwrap();
        session.print_keys(&mut out).unwrap();
        session.print_stats(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# message 0"));
        assert!(text.contains("GET /a?x=1 HTTP/1.1"));
        assert!(text.contains("No keys registered"));
        assert!(text.contains("Messages:      2"));
    }
}
