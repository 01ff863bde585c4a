//! Recursive-descent parser for predicate expressions.
//!
//! Precedence, loosest first:
//!
//! ```text
//! or      :=  and ( ("||" | "or") and )*
//! and     :=  not ( ("&&" | "and") not )*
//! not     :=  ("!" | "not") not | compare
//! compare :=  postfix ( OP postfix | "in" postfix )?
//! postfix :=  primary ( "." IDENT | "[" or "]" )*
//! primary :=  literal | IDENT | PATH | "(" or ")" | "[" list "]"
//! ```

use regex::Regex;

use super::lexer::{tokenize, Op, Spanned, Token};
use crate::error::PredicateError;
use crate::path::PathExpression;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    /// Evaluate comparison between two numbers.
    pub(crate) fn compare_f64(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::NotEq => left != right,
            CompareOp::Lt => left < right,
            CompareOp::LtEq => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::GtEq => left >= right,
        }
    }

    /// Evaluate comparison between two strings.
    pub(crate) fn compare_str(self, left: &str, right: &str) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::NotEq => left != right,
            CompareOp::Lt => left < right,
            CompareOp::LtEq => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::GtEq => left >= right,
        }
    }
}

/// Prefix/suffix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AffixOp {
    StartsWith,
    EndsWith,
}

/// Per-candidate bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Variable {
    Element,
    Parent,
    Key,
    Path,
    Content,
    Type,
    Facets,
    Charset,
    Message,
    Request,
    IsRequest,
    IsResponse,
}

impl Variable {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "element" => Variable::Element,
            "parent" => Variable::Parent,
            "key" => Variable::Key,
            "path" => Variable::Path,
            "content" => Variable::Content,
            "type" => Variable::Type,
            "facets" => Variable::Facets,
            "charset" => Variable::Charset,
            "message" => Variable::Message,
            "request" => Variable::Request,
            "isRequest" => Variable::IsRequest,
            "isResponse" => Variable::IsResponse,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

/// Right-hand side of `=~` / `!~`.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    /// Literal pattern, compiled once with full-match anchors
    Compiled(Regex),
    /// Computed at evaluation time
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Literal(Literal),
    List(Vec<Expr>),
    Var(Variable),
    Path(PathExpression),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Affix {
        op: AffixOp,
        negated: bool,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    In(Box<Expr>, Box<Expr>),
    Regex {
        operand: Box<Expr>,
        pattern: Pattern,
        negated: bool,
    },
}

/// Anchor `pattern` so it must match the whole input.
pub(crate) fn full_match_regex(pattern: &str) -> Result<Regex, PredicateError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| PredicateError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Deepest expression tree the parser builds. Evaluation recurses once per
/// level, so this also bounds the evaluator's stack use.
pub(crate) const MAX_NESTING: usize = 128;

pub(crate) fn parse(source: &str) -> Result<Expr, PredicateError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(unexpected(extra)),
    }
}

fn unexpected(spanned: &Spanned) -> PredicateError {
    PredicateError::UnexpectedToken {
        position: spanned.position,
        found: spanned.token.describe(),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Depth of the tree built so far along the current descent
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Result<Spanned, PredicateError> {
        let spanned = self.tokens.get(self.pos).cloned().ok_or(PredicateError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(spanned)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), PredicateError> {
        let spanned = self.next()?;
        if &spanned.token == token {
            Ok(())
        } else {
            Err(unexpected(&spanned))
        }
    }

    fn enter(&mut self, levels: usize) -> Result<(), PredicateError> {
        self.depth += levels;
        if self.depth > MAX_NESTING {
            return Err(PredicateError::TooDeep { limit: MAX_NESTING });
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expr, PredicateError> {
        let start = self.depth;
        let mut left = self.and()?;
        // left-leaning chains nest one level per operator
        while self.eat(&Token::Or) {
            self.enter(1)?;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = start;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, PredicateError> {
        let start = self.depth;
        let mut left = self.not()?;
        while self.eat(&Token::And) {
            self.enter(1)?;
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = start;
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, PredicateError> {
        if self.eat(&Token::Not) {
            self.enter(1)?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, PredicateError> {
        let left = self.postfix()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            Some(Token::In) => {
                self.pos += 1;
                let right = self.postfix()?;
                return Ok(Expr::In(Box::new(left), Box::new(right)));
            }
            _ => return Ok(left),
        };
        self.pos += 1;
        let (left, right) = (Box::new(left), Box::new(self.postfix()?));

        let expr = match op {
            Op::Eq => Expr::Compare(CompareOp::Eq, left, right),
            Op::NotEq => Expr::Compare(CompareOp::NotEq, left, right),
            Op::Lt => Expr::Compare(CompareOp::Lt, left, right),
            Op::LtEq => Expr::Compare(CompareOp::LtEq, left, right),
            Op::Gt => Expr::Compare(CompareOp::Gt, left, right),
            Op::GtEq => Expr::Compare(CompareOp::GtEq, left, right),
            Op::StartsWith | Op::NotStartsWith => Expr::Affix {
                op: AffixOp::StartsWith,
                negated: op == Op::NotStartsWith,
                left,
                right,
            },
            Op::EndsWith | Op::NotEndsWith => Expr::Affix {
                op: AffixOp::EndsWith,
                negated: op == Op::NotEndsWith,
                left,
                right,
            },
            Op::Match | Op::NotMatch => {
                let pattern = if let Expr::Literal(Literal::Str(pattern)) = right.as_ref() {
                    Pattern::Compiled(full_match_regex(pattern)?)
                } else {
                    Pattern::Dynamic(right)
                };
                Expr::Regex {
                    operand: left,
                    pattern,
                    negated: op == Op::NotMatch,
                }
            }
        };
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr, PredicateError> {
        let start = self.depth;
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                self.enter(1)?;
                let spanned = self.next()?;
                match spanned.token {
                    Token::Ident(name) => expr = Expr::Member(Box::new(expr), name),
                    // `in`, `and` ... are valid member names after a dot
                    Token::In => expr = Expr::Member(Box::new(expr), "in".to_string()),
                    _ => return Err(unexpected(&spanned)),
                }
            } else if self.eat(&Token::LBracket) {
                self.enter(1)?;
                let index = self.or()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = start;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, PredicateError> {
        let spanned = self.next()?;
        match spanned.token {
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                _ => Variable::from_name(&name)
                    .map(Expr::Var)
                    .ok_or(PredicateError::UnknownVariable { name }),
            },
            Token::Path(path) => {
                // filters compile lazily, one parser per level
                let filters = path.matches("?(").count();
                self.enter(filters)?;
                let expr = Expr::Path(PathExpression::parse(&path)?);
                self.depth -= filters;
                Ok(expr)
            }
            Token::LParen => {
                self.enter(1)?;
                let expr = self.or()?;
                self.expect(&Token::RParen)?;
                self.depth -= 1;
                Ok(expr)
            }
            Token::LBracket => {
                self.enter(1)?;
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.or()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                self.depth -= 1;
                Ok(Expr::List(items))
            }
            _ => Err(unexpected(&spanned)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        match parse("key == 'a' || key == 'b' && !content").unwrap() {
            Expr::Or(left, right) => {
                assert!(matches!(*left, Expr::Compare(CompareOp::Eq, _, _)));
                match *right {
                    Expr::And(_, negated) => assert!(matches!(*negated, Expr::Not(_))),
                    other => panic!("Expected And, got {:?}", other),
                }
            }
            other => panic!("Expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_member_and_index() {
        match parse("element.header['Content-Type']").unwrap() {
            Expr::Index(target, index) => {
                match *target {
                    Expr::Member(base, name) => {
                        assert!(matches!(*base, Expr::Var(Variable::Element)));
                        assert_eq!(name, "header");
                    }
                    other => panic!("Expected Member, got {:?}", other),
                }
                assert!(matches!(*index, Expr::Literal(Literal::Str(_))));
            }
            other => panic!("Expected Index, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_regex_precompiled() {
        match parse("content =~ 'ab+'").unwrap() {
            Expr::Regex {
                pattern: Pattern::Compiled(regex),
                negated,
                ..
            } => {
                assert!(!negated);
                assert!(regex.is_match("abb"));
                assert!(!regex.is_match("xabb"));
            }
            other => panic!("Expected compiled regex, got {:?}", other),
        }
        assert!(matches!(
            parse("content !~ facets").unwrap(),
            Expr::Regex {
                pattern: Pattern::Dynamic(_),
                negated: true,
                ..
            }
        ));
    }

    #[test]
    fn test_list_literal() {
        match parse("key in ['a', 'b']").unwrap() {
            Expr::In(_, list) => match *list {
                Expr::List(items) => assert_eq!(items.len(), 2),
                other => panic!("Expected List, got {:?}", other),
            },
            other => panic!("Expected In, got {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        match parse("nonsense == 1") {
            Err(PredicateError::UnknownVariable { name }) => assert_eq!(name, "nonsense"),
            other => panic!("Expected UnknownVariable, got {:?}", other),
        }
        assert!(matches!(parse("key =="), Err(PredicateError::UnexpectedEnd)));
        assert!(matches!(parse("(key"), Err(PredicateError::UnexpectedEnd)));
        assert!(matches!(
            parse("key 'a'"),
            Err(PredicateError::UnexpectedToken { position: 4, .. })
        ));
        assert!(matches!(
            parse("content =~ '('"),
            Err(PredicateError::InvalidRegex { .. })
        ));
        assert!(matches!(parse("$foo == 1"), Err(PredicateError::Path(_))));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}true{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse(&nested(100)).is_ok());
        match parse(&nested(20_000)) {
            Err(PredicateError::TooDeep { limit }) => assert_eq!(limit, MAX_NESTING),
            other => panic!("Expected TooDeep, got {:?}", other),
        }

        assert!(parse(&"!".repeat(100)).is_err());
        assert!(matches!(
            parse(&format!("{}true", "!".repeat(5_000))),
            Err(PredicateError::TooDeep { .. })
        ));

        // operator chains build left-leaning trees of the same depth
        let chain = |n: usize| vec!["true"; n].join(" && ");
        assert!(parse(&chain(50)).is_ok());
        assert!(matches!(parse(&chain(10_000)), Err(PredicateError::TooDeep { .. })));
        assert!(matches!(
            parse(&format!("element{}", ".a".repeat(10_000))),
            Err(PredicateError::TooDeep { .. })
        ));

        // each embedded filter compiles its own predicate
        let filters = format!("$.a{} == 1", "[?($.b".repeat(200));
        assert!(matches!(parse(&filters), Err(PredicateError::TooDeep { .. })));
    }
}
