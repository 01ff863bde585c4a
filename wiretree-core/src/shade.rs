//! Value shading.
//!
//! A [`ValueShader`] maps nodes to display strings, typically to redact or
//! annotate sensitive values when messages are logged:
//!
//! ```text
//! with_simple_shading_criterion("password", "<redacted>")
//! with_shading_criterion("key == 'sub'", "user %s")
//! with_note_criterion("'JwtFacet' in facets", "token: %s")
//! ```
//!
//! `%s` in a format is replaced by the node's content. The first matching
//! criterion wins.

use crate::convert::{ConversionContext, PostConversionListener};
use crate::error::{ConversionError, PredicateError};
use crate::node::{NodeId, NodeRef};
use crate::predicate::Predicate;

#[derive(Debug)]
struct Criterion {
    predicate: Predicate,
    format: String,
}

impl Criterion {
    fn new(predicate: &str, format: impl Into<String>) -> Result<Self, PredicateError> {
        Ok(Self {
            predicate: Predicate::compile(predicate)?,
            format: format.into(),
        })
    }

    fn apply(&self, node: NodeRef<'_>, key: Option<&str>) -> Option<String> {
        self.predicate
            .matches(node, key)
            .then(|| self.format.replacen("%s", &node.text(), 1))
    }
}

/// Ordered shading and note criteria.
#[derive(Debug, Default)]
pub struct ValueShader {
    shading: Vec<Criterion>,
    notes: Vec<Criterion>,
}

impl ValueShader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shade every node reached under key `attribute`.
    pub fn with_simple_shading_criterion(self, attribute: &str, format: impl Into<String>) -> Result<Self, PredicateError> {
        let escaped = attribute.replace('\\', "\\\\").replace('\'', "\\'");
        self.with_shading_criterion(&format!("key == '{escaped}'"), format)
    }

    pub fn with_shading_criterion(mut self, predicate: &str, format: impl Into<String>) -> Result<Self, PredicateError> {
        self.shading.push(Criterion::new(predicate, format)?);
        Ok(self)
    }

    pub fn with_note_criterion(mut self, predicate: &str, format: impl Into<String>) -> Result<Self, PredicateError> {
        self.notes.push(Criterion::new(predicate, format)?);
        Ok(self)
    }

    /// Shaded display value of `node`, if any criterion matches.
    pub fn shade_value(&self, node: NodeRef<'_>, key: Option<&str>) -> Option<String> {
        self.shading.iter().find_map(|c| c.apply(node, key))
    }

    /// Note text for `node`, if any note criterion matches.
    pub fn note_for(&self, node: NodeRef<'_>) -> Option<String> {
        self.notes.iter().find_map(|c| c.apply(node, None))
    }
}

impl PostConversionListener for ValueShader {
    fn on_converted(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let current = ctx.node(node);
        if current.note().is_some() {
            return Ok(());
        }
        if let Some(note) = self.note_for(current) {
            ctx.doc_mut().set_note(node, note);
        }
        Ok(())
    }
}
