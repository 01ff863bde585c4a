//! Tokenizer for predicate expressions.

use crate::error::PredicateError;

/// Binary operators, from `==` to `!$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `=~`
    Match,
    /// `!~`
    NotMatch,
    /// `=^`
    StartsWith,
    /// `!^`
    NotStartsWith,
    /// `=$`
    EndsWith,
    /// `!$`
    NotEndsWith,
}

impl Op {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::NotEq => "!=",
            Op::Lt => "<",
            Op::LtEq => "<=",
            Op::Gt => ">",
            Op::GtEq => ">=",
            Op::Match => "=~",
            Op::NotMatch => "!~",
            Op::StartsWith => "=^",
            Op::NotStartsWith => "!^",
            Op::EndsWith => "=$",
            Op::NotEndsWith => "!$",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Str(String),
    Number(f64),
    Ident(String),
    /// Embedded path term, `$` included
    Path(String),
    Dot,
    Comma,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Op(Op),
    Not,
    And,
    Or,
    In,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Str(s) => format!("'{s}'"),
            Token::Number(n) => n.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Path(path) => path.clone(),
            Token::Dot => ".".to_string(),
            Token::Comma => ",".to_string(),
            Token::LBracket => "[".to_string(),
            Token::RBracket => "]".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Op(op) => op.as_str().to_string(),
            Token::Not => "!".to_string(),
            Token::And => "&&".to_string(),
            Token::Or => "||".to_string(),
            Token::In => "in".to_string(),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, PredicateError> {
    Lexer {
        source,
        chars: source.char_indices().collect(),
        pos: 0,
    }
    .run()
}

struct Lexer<'s> {
    source: &'s str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.source.len(), |(i, _)| *i)
    }

    fn run(mut self) -> Result<Vec<Spanned>, PredicateError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let position = self.offset();
            let token = match c {
                '\'' | '"' => self.string(c)?,
                '$' => self.path(),
                '0'..='9' => self.number(),
                '-' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number(),
                c if c.is_alphabetic() || c == '_' => self.word(),
                _ => self.symbol(position)?,
            };
            tokens.push(Spanned { token, position });
        }
        Ok(tokens)
    }

    fn string(&mut self, quote: char) -> Result<Token, PredicateError> {
        let start = self.offset();
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(PredicateError::UnterminatedString { position: start }),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Token::Str(value));
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        None => return Err(PredicateError::UnterminatedString { position: start }),
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some(c @ ('\'' | '"' | '\\')) => value.push(c),
                        // Regex escapes such as `\.` pass through verbatim
                        Some(c) => {
                            value.push('\\');
                            value.push(c);
                        }
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    /// `$` followed by path segments, up to the first top-level
    /// whitespace, operator or closing parenthesis.
    fn path(&mut self) -> Token {
        let start = self.offset();
        self.pos += 1;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        while let Some(c) = self.peek() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') if depth > 0 => quote = Some(c),
                (None, '[' | '(') => depth += 1,
                (None, ']') if depth > 0 => depth -= 1,
                (None, ')') if depth > 0 => depth -= 1,
                (None, c)
                    if depth == 0
                        && (c.is_whitespace() || matches!(c, ')' | ']' | ',' | '=' | '!' | '<' | '>' | '&' | '|')) =>
                {
                    break
                }
                _ => {}
            }
            self.pos += 1;
        }
        Token::Path(self.source[start..self.offset()].to_string())
    }

    fn number(&mut self) -> Token {
        let start = self.offset();
        self.pos += 1;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.source[start..self.offset()];
        // digits with an optional sign and fraction always parse
        Token::Number(text.parse().unwrap_or_default())
    }

    fn word(&mut self) -> Token {
        let start = self.offset();
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        match &self.source[start..self.offset()] {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            word => Token::Ident(word.to_string()),
        }
    }

    fn symbol(&mut self, position: usize) -> Result<Token, PredicateError> {
        let c = self.peek().unwrap_or_default();
        let next = self.peek_at(1);
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Op(Op::Eq), 2),
            ('=', Some('~')) => (Token::Op(Op::Match), 2),
            ('=', Some('^')) => (Token::Op(Op::StartsWith), 2),
            ('=', Some('$')) => (Token::Op(Op::EndsWith), 2),
            // `!$.a` negates a path term, `!$ 'x'` is "does not end with"
            ('!', Some('$')) if matches!(self.peek_at(2), Some('.' | '[')) => (Token::Not, 1),
            ('!', Some('=')) => (Token::Op(Op::NotEq), 2),
            ('!', Some('~')) => (Token::Op(Op::NotMatch), 2),
            ('!', Some('^')) => (Token::Op(Op::NotStartsWith), 2),
            ('!', Some('$')) => (Token::Op(Op::NotEndsWith), 2),
            ('!', _) => (Token::Not, 1),
            ('<', Some('=')) => (Token::Op(Op::LtEq), 2),
            ('<', _) => (Token::Op(Op::Lt), 1),
            ('>', Some('=')) => (Token::Op(Op::GtEq), 2),
            ('>', _) => (Token::Op(Op::Gt), 1),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (found, _) => return Err(PredicateError::UnexpectedChar { position, found }),
        };
        self.pos += width;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            tokens("key == 'foo'"),
            vec![Token::Ident("key".into()), Token::Op(Op::Eq), Token::Str("foo".into())]
        );
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(
            tokens("content =~ \"a.*\" && path !$ 'x' || type =^ 'r'"),
            vec![
                Token::Ident("content".into()),
                Token::Op(Op::Match),
                Token::Str("a.*".into()),
                Token::And,
                Token::Ident("path".into()),
                Token::Op(Op::NotEndsWith),
                Token::Str("x".into()),
                Token::Or,
                Token::Ident("type".into()),
                Token::Op(Op::StartsWith),
                Token::Str("r".into()),
            ]
        );
    }

    #[test]
    fn test_embedded_path() {
        assert_eq!(
            tokens("$.header.['Content-Type'] == 'x' and !$.body"),
            vec![
                Token::Path("$.header.['Content-Type']".into()),
                Token::Op(Op::Eq),
                Token::Str("x".into()),
                Token::And,
                Token::Not,
                Token::Path("$.body".into()),
            ]
        );
    }

    #[test]
    fn test_numbers_and_keywords() {
        assert_eq!(
            tokens("element.code >= 200 and not -1.5 in facets"),
            vec![
                Token::Ident("element".into()),
                Token::Dot,
                Token::Ident("code".into()),
                Token::Op(Op::GtEq),
                Token::Number(200.0),
                Token::And,
                Token::Not,
                Token::Number(-1.5),
                Token::In,
                Token::Ident("facets".into()),
            ]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(tokens(r"'it\'s'"), vec![Token::Str("it's".into())]);
        assert_eq!(tokens(r"'a\.b'"), vec![Token::Str(r"a\.b".into())]);
    }

    #[test]
    fn test_errors() {
        match tokenize("'open") {
            Err(PredicateError::UnterminatedString { position }) => assert_eq!(position, 0),
            other => panic!("Expected UnterminatedString, got {:?}", other),
        }
        match tokenize("a # b") {
            Err(PredicateError::UnexpectedChar { position, found }) => {
                assert_eq!(position, 2);
                assert_eq!(found, '#');
            }
            other => panic!("Expected UnexpectedChar, got {:?}", other),
        }
    }
}
