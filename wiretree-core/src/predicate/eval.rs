//! Evaluation of parsed predicates against a node.

use std::borrow::Cow;

use super::parser::{full_match_regex, AffixOp, CompareOp, Expr, Literal, Pattern, Variable};
use crate::error::PredicateError;
use crate::facets::{HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet, HttpResponseFacet};
use crate::node::NodeRef;

/// Result of evaluating a (sub-)expression.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Str(Cow<'a, str>),
    Node(NodeRef<'a>),
    List(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Node(_) => "node",
            Value::List(_) => "list",
        }
    }

    fn from_node(node: Option<NodeRef<'a>>) -> Self {
        node.map_or(Value::Null, Value::Node)
    }

    /// Text form used by string operators and mixed comparisons.
    fn text(&self) -> Option<Cow<'a, str>> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Node(node) => Some(node.text()),
            Value::Number(n) => Some(Cow::Owned(format_number(*n))),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Value::Null | Value::List(_) => None,
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(_) | Value::Node(_) => self.text()?.trim().parse().ok(),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn mismatch(op: &'static str, left: &Value<'_>, right: &Value<'_>) -> PredicateError {
    PredicateError::TypeMismatch {
        op,
        left: left.type_name(),
        right: right.type_name(),
    }
}

/// Evaluation scope of one candidate node.
pub(crate) struct Scope<'a> {
    pub element: NodeRef<'a>,
    /// Key the candidate was reached under, if known
    pub key: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub(crate) fn eval(&self, expr: &'a Expr) -> Result<Value<'a>, PredicateError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::Str(Cow::Borrowed(s)),
            }),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Var(variable) => Ok(self.variable(*variable)),
            Expr::Path(path) => {
                let mut found = path.execute(self.element);
                Ok(match found.len() {
                    0 => Value::Null,
                    1 => Value::Node(found.remove(0)),
                    _ => Value::List(found.into_iter().map(Value::Node).collect()),
                })
            }
            Expr::Member(target, name) => {
                let target = self.eval(target)?;
                member(&target, name)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(&target, &index)
            }
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner)?)?)),
            Expr::And(left, right) => {
                if !truthy(&self.eval(left)?)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&self.eval(right)?)?))
            }
            Expr::Or(left, right) => {
                if truthy(&self.eval(left)?)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&self.eval(right)?)?))
            }
            Expr::Compare(op, left, right) => {
                let (left, right) = (self.eval(left)?, self.eval(right)?);
                compare(*op, &left, &right).map(Value::Bool)
            }
            Expr::Affix {
                op,
                negated,
                left,
                right,
            } => {
                let (left, right) = (self.eval(left)?, self.eval(right)?);
                let name = match op {
                    AffixOp::StartsWith => "=^",
                    AffixOp::EndsWith => "=$",
                };
                let (Some(text), Some(affix)) = (left.text(), right.text()) else {
                    return Err(mismatch(name, &left, &right));
                };
                let hit = match op {
                    AffixOp::StartsWith => text.starts_with(affix.as_ref()),
                    AffixOp::EndsWith => text.ends_with(affix.as_ref()),
                };
                Ok(Value::Bool(hit != *negated))
            }
            Expr::In(left, right) => {
                let (left, right) = (self.eval(left)?, self.eval(right)?);
                contains(&right, &left).map(Value::Bool)
            }
            Expr::Regex {
                operand,
                pattern,
                negated,
            } => {
                let operand = self.eval(operand)?;
                let hit = match pattern {
                    Pattern::Compiled(regex) => {
                        let text = operand
                            .text()
                            .ok_or_else(|| mismatch("=~", &operand, &Value::Str(Cow::Borrowed(""))))?;
                        regex.is_match(&text)
                    }
                    Pattern::Dynamic(pattern) => match self.eval(pattern)? {
                        // membership when the right side is a set
                        Value::List(items) => items
                            .iter()
                            .map(|item| equals(&operand, item))
                            .collect::<Result<Vec<_>, _>>()?
                            .into_iter()
                            .any(|hit| hit),
                        pattern => {
                            let (Some(text), Some(source)) = (operand.text(), pattern.text()) else {
                                return Err(mismatch("=~", &operand, &pattern));
                            };
                            full_match_regex(&source)?.is_match(&text)
                        }
                    },
                };
                Ok(Value::Bool(hit != *negated))
            }
        }
    }

    fn variable(&self, variable: Variable) -> Value<'a> {
        let element = self.element;
        match variable {
            Variable::Element => Value::Node(element),
            Variable::Parent => Value::from_node(element.parent()),
            Variable::Key => self
                .key
                .or_else(|| element.key_in_parent())
                .map_or(Value::Null, |key| Value::Str(Cow::Borrowed(key))),
            Variable::Path => Value::Str(Cow::Owned(element.path())),
            Variable::Content => Value::Str(element.text()),
            Variable::Type => Value::Str(Cow::Borrowed(element.kind().as_str())),
            Variable::Facets => Value::List(
                element
                    .facet_names()
                    .into_iter()
                    .map(|name| Value::Str(Cow::Borrowed(name)))
                    .collect(),
            ),
            Variable::Charset => Value::Str(Cow::Borrowed(element.charset().name())),
            Variable::Message => Value::from_node(self.message()),
            Variable::Request => Value::from_node(self.request()),
            Variable::IsRequest => {
                Value::Bool(self.message().is_some_and(|m| m.has_facet::<HttpRequestFacet>()))
            }
            Variable::IsResponse => {
                Value::Bool(self.message().is_some_and(|m| m.has_facet::<HttpResponseFacet>()))
            }
        }
    }

    /// The enclosing top-level HTTP message.
    fn message(&self) -> Option<NodeRef<'a>> {
        let top = self.element.top();
        (top.has_facet::<HttpRequestFacet>() || top.has_facet::<HttpResponseFacet>()).then_some(top)
    }

    fn request(&self) -> Option<NodeRef<'a>> {
        let message = self.message()?;
        if message.has_facet::<HttpRequestFacet>() {
            return Some(message);
        }
        message
            .facet::<HttpResponseFacet>()?
            .request
            .as_ref()
            .map(|request| request.root())
    }

    fn index(&self, target: &Value<'a>, index: &Value<'a>) -> Result<Value<'a>, PredicateError> {
        match (target, index) {
            (Value::Node(node), Value::Number(n)) if *n >= 0.0 => {
                Ok(Value::from_node(node.children().get(*n as usize).copied()))
            }
            (Value::List(items), Value::Number(n)) if *n >= 0.0 => {
                Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
            }
            (_, Value::Str(name)) => member(target, name),
            _ => Err(mismatch("[]", target, index)),
        }
    }
}

/// Member access on a value; see the message views on HTTP nodes.
fn member<'a>(target: &Value<'a>, name: &str) -> Result<Value<'a>, PredicateError> {
    let node = match target {
        Value::Node(node) => *node,
        Value::Null => {
            return Err(PredicateError::NullAccess {
                member: name.to_string(),
            })
        }
        Value::Str(s) if name == "content" => return Ok(Value::Str(s.clone())),
        other => {
            return Err(PredicateError::TypeMismatch {
                op: ".",
                left: other.type_name(),
                right: "member",
            })
        }
    };

    if name == "content" {
        return Ok(Value::Str(node.text()));
    }
    if node.has_facet::<HttpMessageFacet>() {
        match name {
            "isRequest" => return Ok(Value::Bool(node.has_facet::<HttpRequestFacet>())),
            "isResponse" => return Ok(Value::Bool(node.has_facet::<HttpResponseFacet>())),
            "url" => return Ok(Value::from_node(node.first("path"))),
            "headers" => return Ok(Value::from_node(node.first("header"))),
            "bodyAsString" => {
                return Ok(node
                    .first("body")
                    .map_or(Value::Null, |body| Value::Str(body.text())))
            }
            _ => {}
        }
    }
    if let Some(child) = node.first(name) {
        return Ok(Value::Node(child));
    }
    // Header names are case-insensitive
    let header = node
        .facet::<HttpHeaderFacet>()
        .and_then(|headers| headers.first(name))
        .map(|id| node.document().node(id));
    Ok(Value::from_node(header))
}

fn truthy(value: &Value<'_>) -> Result<bool, PredicateError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(PredicateError::TypeMismatch {
            op: "boolean",
            left: other.type_name(),
            right: "boolean",
        }),
    }
}

fn equals(left: &Value<'_>, right: &Value<'_>) -> Result<bool, PredicateError> {
    Ok(match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Node(a), Value::Node(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .map(|(x, y)| equals(x, y))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .all(|hit| hit)
        }
        (Value::List(_), _) | (_, Value::List(_)) => false,
        (Value::Number(_), _) | (_, Value::Number(_)) => match (left.number(), right.number()) {
            (Some(a), Some(b)) => a == b,
            _ => left.text() == right.text(),
        },
        _ => left.text() == right.text(),
    })
}

fn compare(op: CompareOp, left: &Value<'_>, right: &Value<'_>) -> Result<bool, PredicateError> {
    match op {
        CompareOp::Eq => return equals(left, right),
        CompareOp::NotEq => return equals(left, right).map(|eq| !eq),
        _ => {}
    }
    if matches!(left, Value::Null | Value::List(_)) || matches!(right, Value::Null | Value::List(_)) {
        return Err(mismatch(op.as_str(), left, right));
    }
    if let (Some(a), Some(b)) = (left.number(), right.number()) {
        return Ok(op.compare_f64(a, b));
    }
    match (left.text(), right.text()) {
        (Some(a), Some(b)) => Ok(op.compare_str(&a, &b)),
        _ => Err(mismatch(op.as_str(), left, right)),
    }
}

/// `needle in haystack`: set membership or substring.
fn contains(haystack: &Value<'_>, needle: &Value<'_>) -> Result<bool, PredicateError> {
    match haystack {
        Value::List(items) => {
            for item in items {
                if equals(needle, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Str(_) | Value::Node(_) => match (haystack.text(), needle.text()) {
            (Some(text), Some(part)) => Ok(text.contains(part.as_ref())),
            _ => Err(mismatch("in", needle, haystack)),
        },
        _ => Err(mismatch("in", needle, haystack)),
    }
}
