//! Plain-text rendering of a node and its descendants.

use std::fmt::Write;

use super::NodeRef;

/// Renders a subtree as an indented text tree, one line per edge.
#[derive(Debug, Clone)]
pub struct TreePrinter {
    max_depth: Option<usize>,
    preview_width: usize,
    print_facets: bool,
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self {
            max_depth: None,
            preview_width: 60,
            print_facets: true,
        }
    }
}

impl TreePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop descending below `depth` levels.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Truncate content previews to `width` characters (0 disables previews).
    pub fn with_preview_width(mut self, width: usize) -> Self {
        self.preview_width = width;
        self
    }

    pub fn with_facets(mut self, print_facets: bool) -> Self {
        self.print_facets = print_facets;
        self
    }

    pub fn render(&self, node: NodeRef<'_>) -> String {
        let mut out = String::new();
        let label = node.key_in_parent().unwrap_or("$");
        self.write_line(&mut out, "", label, node);
        self.render_children(&mut out, node, "", 1);
        out
    }

    fn render_children(&self, out: &mut String, node: NodeRef<'_>, indent: &str, depth: usize) {
        if self.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let edges = node.edges();
        let count = edges.len();
        for (i, (key, child)) in edges.into_iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            self.write_line(out, &format!("{indent}{branch}"), key, child);
            let next_indent = format!("{indent}{}", if last { "    " } else { "│   " });
            self.render_children(out, child, &next_indent, depth + 1);
        }
    }

    fn write_line(&self, out: &mut String, prefix: &str, key: &str, node: NodeRef<'_>) {
        let _ = write!(out, "{prefix}{key}");
        if self.print_facets {
            let names = node.facet_names();
            if !names.is_empty() {
                let _ = write!(out, " ({})", names.join(", "));
            }
        }
        if self.preview_width > 0 && node.raw().is_some() {
            let _ = write!(out, " \"{}\"", self.preview(&node.text()));
        }
        if let Some(note) = node.note() {
            let _ = write!(out, " # {note}");
        }
        out.push('\n');
    }

    fn preview(&self, text: &str) -> String {
        let mut preview: String = text
            .chars()
            .take(self.preview_width)
            .flat_map(char::escape_default)
            .collect();
        if text.chars().count() > self.preview_width {
            preview.push_str("...");
        }
        preview
    }
}
