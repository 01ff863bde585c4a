//! Segment tokenizing and parsing.

use crate::error::PathError;

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// `..`: every descendant, excluding the candidate itself
    Descend,
    /// `*` or `[*]`
    Wildcard,
    /// `name` or `['name']`
    Key(String),
    /// `name[n]`: n-th result of the inner segment
    Indexed(Box<Segment>, usize),
    /// `[n]`: n-th immediate child
    Child(usize),
    /// `[?(predicate)]`, predicate text only
    Filter(String),
}

/// Split the part after `$.` on top-level dots.
///
/// Dots inside brackets, parentheses or quotes do not split.
pub(crate) fn split(expression: &str, body: &str) -> Result<Vec<String>, PathError> {
    let unbalanced = || PathError::UnbalancedBrackets {
        expression: expression.to_string(),
    };

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;

    for c in body.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            continue;
        }
        match c {
            '\'' | '"' if !stack.is_empty() => quote = Some(c),
            '[' => stack.push(']'),
            '(' => stack.push(')'),
            ']' | ')' => {
                if stack.pop() != Some(c) {
                    return Err(unbalanced());
                }
            }
            '.' if stack.is_empty() => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !stack.is_empty() || quote.is_some() {
        return Err(unbalanced());
    }
    parts.push(current);
    Ok(parts)
}

/// Parse one dot-delimited part into one or more segments.
///
/// `items[?(...)]` filters the children of `items`, so it yields a key
/// segment followed by a filter segment.
pub(crate) fn parse(part: &str) -> Result<Vec<Segment>, PathError> {
    if part.is_empty() {
        return Ok(vec![Segment::Descend]);
    }

    let (name, mut rest) = match part.find('[') {
        Some(open) => (&part[..open], &part[open..]),
        None => (part, ""),
    };

    let mut segments = Vec::new();
    match name {
        "" => {}
        "*" => segments.push(Segment::Wildcard),
        name => segments.push(Segment::Key(name.to_string())),
    }

    while !rest.is_empty() {
        let close = closing_bracket(rest).ok_or_else(|| PathError::UnknownSegment {
            segment: part.to_string(),
        })?;
        let inner = &rest[1..close];
        rest = &rest[close + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(PathError::UnknownSegment {
                segment: part.to_string(),
            });
        }

        let segment = bracket(part, inner)?;
        match segment {
            // `name[n]` indexes the results of `name`
            Segment::Child(n) if matches!(segments.last(), Some(Segment::Key(_) | Segment::Wildcard)) => {
                if let Some(previous) = segments.pop() {
                    segments.push(Segment::Indexed(Box::new(previous), n));
                }
            }
            segment => segments.push(segment),
        }
    }
    Ok(segments)
}

/// Byte offset of the `]` matching the `[` that `text` starts with.
fn closing_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ']') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn bracket(part: &str, inner: &str) -> Result<Segment, PathError> {
    let inner = inner.trim();
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(literal) = quoted(inner) {
        return Ok(Segment::Key(literal.to_string()));
    }
    if let Some(filter) = inner.strip_prefix('?') {
        return match filter.trim_start().strip_prefix('(').and_then(|f| f.strip_suffix(')')) {
            Some(predicate) if !predicate.trim().is_empty() => Ok(Segment::Filter(predicate.trim().to_string())),
            _ => Err(PathError::InvalidFilter {
                segment: part.to_string(),
            }),
        };
    }
    if inner.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
        return inner
            .parse::<usize>()
            .map(Segment::Child)
            .map_err(|_| PathError::InvalidIndex {
                segment: part.to_string(),
            });
    }
    Err(PathError::UnknownSegment {
        segment: part.to_string(),
    })
}

fn quoted(text: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        text.strip_prefix(q)
            .and_then(|t| t.strip_suffix(q))
            .filter(|t| !t.contains(q))
    })
}
