//! Predicate expressions.
//!
//! A small boolean language evaluated against one candidate node at a time.
//! It is used by filter segments in path expressions (`[?(...)]`), by the
//! value shader and by the CLI `--filter` flag.
//!
//! ```text
//! key == 'Content-Type' && content =^ 'application/json'
//! message.isResponse and $.responseCode >= 400
//! 'JwtFacet' in facets
//! ```
//!
//! Evaluation never fails outward: [`Predicate::matches`] turns every
//! evaluation error, and every non-boolean result, into `false`.

mod cache;
mod eval;
mod lexer;
mod parser;

pub use cache::{CacheStats, ExpressionCache, DEFAULT_CACHE_CAPACITY};
pub use eval::Value;

use std::fmt;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::PredicateError;
use crate::node::NodeRef;
use eval::Scope;
use parser::Expr;

static EXPRESSION_CACHE: Lazy<ExpressionCache> = Lazy::new(ExpressionCache::default);

/// A compiled predicate expression.
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    /// Compile an expression.
    pub fn compile(source: &str) -> Result<Self, PredicateError> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `node`, reached under `key` if known.
    ///
    /// Unlike [`matches`](Self::matches) this surfaces evaluation errors and
    /// non-boolean results.
    pub fn evaluate<'a>(&'a self, node: NodeRef<'a>, key: Option<&'a str>) -> Result<Value<'a>, PredicateError> {
        Scope { element: node, key }.eval(&self.expr)
    }

    pub fn matches(&self, node: NodeRef<'_>, key: Option<&str>) -> bool {
        match self.evaluate(node, key) {
            Ok(Value::Bool(result)) => result,
            Ok(other) => {
                debug!(predicate = %self.source, result = other.type_name(), "predicate is not boolean");
                false
            }
            Err(e) => {
                debug!(predicate = %self.source, error = %e, "predicate evaluation failed");
                false
            }
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.source).finish()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile (through the process-wide cache) and evaluate `expression`.
///
/// Compilation errors count as `false` as well.
pub fn matches(expression: &str, node: NodeRef<'_>, key: Option<&str>) -> bool {
    match EXPRESSION_CACHE.get_or_compile(expression) {
        Ok(predicate) => predicate.matches(node, key),
        Err(e) => {
            debug!(predicate = expression, error = %e, "predicate does not compile");
            false
        }
    }
}

/// Statistics of the process-wide expression cache.
pub fn cache_stats() -> CacheStats {
    EXPRESSION_CACHE.stats()
}
