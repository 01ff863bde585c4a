//! Path expressions.
//!
//! A path starts at `$` (the node the query runs against) and walks edges
//! segment by segment:
//!
//! | Segment | Selects |
//! |---------|---------|
//! | `..` | every descendant (not the candidate itself) |
//! | `*`, `[*]` | every immediate child |
//! | `name`, `['name']` | children under key `name` |
//! | `name[n]` | the n-th child under key `name` |
//! | `[n]` | the n-th immediate child |
//! | `[?(predicate)]` | children whose (value, key) satisfy the predicate |
//!
//! ```text
//! $.header.Content-Type
//! $.body..access_token
//! $.header.Set-Cookie[1]
//! $.body.items[?(content =^ 'a')]
//! ```
//!
//! Results are de-duplicated by identity, and JSON pass-through wrappers are
//! replaced by the value they wrap.

mod segment;

use std::collections::HashSet;
use std::fmt;

use tracing::trace;

use crate::error::PathError;
use crate::facets::NestedFacet;
use crate::node::NodeRef;
use crate::predicate;
use segment::Segment;

/// A parsed path expression.
#[derive(Clone, PartialEq, Eq)]
pub struct PathExpression {
    source: String,
    segments: Vec<Segment>,
}

impl PathExpression {
    pub fn parse(expression: &str) -> Result<Self, PathError> {
        let Some(rest) = expression.strip_prefix('$') else {
            return Err(PathError::MissingRoot {
                expression: expression.to_string(),
            });
        };

        let body = if let Some(body) = rest.strip_prefix('.') {
            body
        } else if rest.is_empty() || rest.starts_with('[') {
            rest
        } else {
            return Err(PathError::UnknownSegment {
                segment: expression.to_string(),
            });
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in segment::split(expression, body)? {
                // `$..` and `$.a...b` descend once
                if part.is_empty() && segments.last() == Some(&Segment::Descend) {
                    continue;
                }
                segments.extend(segment::parse(&part)?);
            }
        }
        Ok(Self {
            source: expression.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the expression with `start` as `$`.
    pub fn execute<'d>(&self, start: NodeRef<'d>) -> Vec<NodeRef<'d>> {
        let mut candidates = vec![start];
        for segment in &self.segments {
            candidates = candidates
                .into_iter()
                .flat_map(|node| expand(segment, node))
                .collect();
            // Same result as de-duplicating once at the end
            dedupe(&mut candidates);
            trace!(path = %self.source, ?segment, candidates = candidates.len(), "path segment applied");
            if candidates.is_empty() {
                break;
            }
        }
        let mut found: Vec<_> = candidates.into_iter().map(unwrap_nested).collect();
        // a wrapper and its content may both have been selected
        dedupe(&mut found);
        found
    }
}

impl fmt::Debug for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathExpression").field(&self.source).finish()
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for PathExpression {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn expand<'d>(segment: &Segment, node: NodeRef<'d>) -> Vec<NodeRef<'d>> {
    match segment {
        Segment::Descend => node.descendants(),
        Segment::Wildcard => node.children(),
        Segment::Key(key) => node.all(key),
        Segment::Indexed(inner, index) => expand(inner, node).into_iter().nth(*index).into_iter().collect(),
        Segment::Child(index) => node.children().into_iter().nth(*index).into_iter().collect(),
        Segment::Filter(expression) => node
            .edges()
            .into_iter()
            .filter(|(key, child)| predicate::matches(expression, *child, Some(*key)))
            .map(|(_, child)| child)
            .collect(),
    }
}

fn dedupe(nodes: &mut Vec<NodeRef<'_>>) {
    let mut seen = HashSet::new();
    nodes.retain(|node| seen.insert(node.uid()));
}

fn unwrap_nested(node: NodeRef<'_>) -> NodeRef<'_> {
    match node.facet::<NestedFacet>() {
        Some(nested) => node.document().node(nested.nested()),
        None => node,
    }
}

impl<'d> NodeRef<'d> {
    /// All nodes selected by `expression`, relative to this node.
    pub fn find_all(&self, expression: &str) -> Result<Vec<NodeRef<'d>>, PathError> {
        Ok(PathExpression::parse(expression)?.execute(*self))
    }

    /// The single node selected by `expression`, if any.
    ///
    /// More than one match is an [`PathError::AmbiguousResult`].
    pub fn find_element(&self, expression: &str) -> Result<Option<NodeRef<'d>>, PathError> {
        let mut found = self.find_all(expression)?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            count => Err(PathError::AmbiguousResult {
                expression: expression.to_string(),
                count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Converter;
    use crate::node::Document;

    fn request() -> Document {
        Converter::new().convert(
            "POST /login?user=alice&lang=en HTTP/1.1\r\n\
             Host: example.com\r\n\
             Set-Cookie: a=1\r\n\
             Set-Cookie: b=2\r\n\
             Content-Type: application/json\r\n\
             \r\n\
             {\"items\":[\"apple\",\"banana\",\"avocado\"],\"nested\":{\"access_token\":\"t1\"},\"a.b\":1}",
        )
    }

    fn texts(nodes: &[NodeRef<'_>]) -> Vec<String> {
        nodes.iter().map(|n| n.text().into_owned()).collect()
    }

    #[test]
    fn test_root_and_keys() {
        let doc = request();
        let root = doc.root();
        assert_eq!(root.find_all("$").unwrap(), vec![root]);
        assert_eq!(texts(&root.find_all("$.method").unwrap()), vec!["POST"]);
        assert_eq!(texts(&root.find_all("$.header.Host").unwrap()), vec!["example.com"]);
        assert_eq!(texts(&root.find_all("$.path.lang.value").unwrap()), vec!["en"]);
        assert!(root.find_all("$.nothing.here").unwrap().is_empty());
    }

    #[test]
    fn test_repeated_keys() {
        let doc = request();
        let root = doc.root();
        assert_eq!(texts(&root.find_all("$.header.Set-Cookie").unwrap()), vec!["a=1", "b=2"]);
        assert_eq!(texts(&root.find_all("$.header.Set-Cookie[1]").unwrap()), vec!["b=2"]);
        assert!(root.find_all("$.header.Set-Cookie[5]").unwrap().is_empty());
    }

    #[test]
    fn test_brackets() {
        let doc = request();
        let root = doc.root();
        assert_eq!(texts(&root.find_all("$.body.['a.b']").unwrap()), vec!["1"]);
        assert_eq!(texts(&root.find_all("$.body.items[*]").unwrap()), vec!["apple", "banana", "avocado"]);
        assert_eq!(texts(&root.find_all("$.body.items.[2]").unwrap()), vec!["avocado"]);
        assert_eq!(root.find_all("$.body.items.*").unwrap().len(), 3);
    }

    #[test]
    fn test_nested_wrappers_replaced() {
        let doc = request();
        let root = doc.root();
        let item = root.find_element("$.body.items.[0]").unwrap().unwrap();
        assert!(!item.has_facet::<NestedFacet>());
        assert!(item.parent().unwrap().has_facet::<NestedFacet>());
    }

    #[test]
    fn test_recursive_descent() {
        let doc = request();
        let root = doc.root();
        assert_eq!(texts(&root.find_all("$..access_token").unwrap()), vec!["t1"]);

        let all = root.find_all("$..").unwrap();
        assert!(!all.contains(&root));
        assert!(all.contains(&root.first("method").unwrap()));
        // `$..x` is a superset of `$.body.nested.x`
        let direct = root.find_all("$.body.nested.access_token").unwrap();
        let deep = root.find_all("$..access_token").unwrap();
        assert!(direct.iter().all(|n| deep.contains(n)));
    }

    #[test]
    fn test_filter() {
        let doc = request();
        let root = doc.root();
        let found = root.find_all("$.body.items[?(content =^ 'a')]").unwrap();
        assert_eq!(texts(&found), vec!["apple", "avocado"]);

        let found = root.find_all("$.header[?(key == 'Host' || key == 'Content-Type')]").unwrap();
        assert_eq!(texts(&found), vec!["example.com", "application/json"]);

        // failing predicates select nothing
        assert!(root.find_all("$.header[?(parent.parent.parent.x == 1)]").unwrap().is_empty());
    }

    #[test]
    fn test_idempotent() {
        let doc = request();
        let root = doc.root();
        let expression = PathExpression::parse("$..[?(key =$ 'token')]").unwrap();
        assert_eq!(expression.execute(root), expression.execute(root));
    }

    #[test]
    fn test_find_element() {
        let doc = request();
        let root = doc.root();
        assert_eq!(root.find_element("$.header.Host").unwrap().unwrap().text(), "example.com");
        assert!(root.find_element("$.header.Missing").unwrap().is_none());
        match root.find_element("$.header.Set-Cookie") {
            Err(PathError::AmbiguousResult { count, .. }) => assert_eq!(count, 2),
            other => panic!("Expected AmbiguousResult, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        match PathExpression::parse("header.Host") {
            Err(PathError::MissingRoot { expression }) => assert_eq!(expression, "header.Host"),
            other => panic!("Expected MissingRoot, got {:?}", other),
        }
        match PathExpression::parse("$.a[0") {
            Err(PathError::UnbalancedBrackets { .. }) => {}
            other => panic!("Expected UnbalancedBrackets, got {:?}", other),
        }
        match PathExpression::parse("$.a[bad]") {
            Err(PathError::UnknownSegment { .. }) => {}
            other => panic!("Expected UnknownSegment, got {:?}", other),
        }
        assert!(PathExpression::parse("$foo").is_err());
        assert!("$[0]".parse::<PathExpression>().is_ok());
    }
}
