//! Error types for wiretree-core.

use thiserror::Error;

/// Main error type for wiretree operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed path expression or ambiguous single-result lookup
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Predicate failed to compile
    #[error("Predicate error: {0}")]
    Predicate(#[from] PredicateError),

    /// Error raised while decorating a node
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Error reading or writing captured traffic
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Invalid endpoint description
    #[error("Hostname error: {0}")]
    Hostname(#[from] HostnameError),

    /// Invalid key material
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to path expressions.
///
/// These are usage errors: the expression itself is wrong, not the data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Expression does not start with `$`
    #[error("path expressions always start with '$': {expression}")]
    MissingRoot { expression: String },

    /// A `[` or `(` was never closed, or closed twice
    #[error("unbalanced brackets in path expression: {expression}")]
    UnbalancedBrackets { expression: String },

    /// Index segment that is not a non-negative integer
    #[error("invalid index in segment '{segment}'")]
    InvalidIndex { segment: String },

    /// Filter segment not of the form `?(...)`
    #[error("invalid filter expression (expected '?(' ... ')'): {segment}")]
    InvalidFilter { segment: String },

    /// Bracket expression that is none of the known forms
    #[error("unknown bracket expression: {segment}")]
    UnknownSegment { segment: String },

    /// Single-result lookup matched more than one node
    #[error("expected at most one match for '{expression}', found {count}")]
    AmbiguousResult { expression: String, count: usize },
}

/// Errors related to predicate compilation and evaluation.
///
/// Evaluation errors never leave the evaluator; they make the predicate
/// evaluate to `false`. They are still typed so they can be logged.
#[derive(Error, Debug, Clone)]
pub enum PredicateError {
    /// Character that starts no token
    #[error("unexpected character '{found}' at offset {position}")]
    UnexpectedChar { position: usize, found: char },

    /// String literal without closing quote
    #[error("unterminated string literal starting at offset {position}")]
    UnterminatedString { position: usize },

    /// Token in a position the grammar does not allow
    #[error("unexpected token '{found}' at offset {position}")]
    UnexpectedToken { position: usize, found: String },

    /// Expression ended early
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// Expression nests deeper than the parser accepts
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    /// Regular expression operand failed to compile
    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Identifier that is no known binding
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    /// Operator applied to values it cannot combine
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// Member access or index on null
    #[error("cannot access '{member}' on null")]
    NullAccess { member: String },

    /// Embedded path term failed
    #[error("embedded path failed: {0}")]
    Path(#[from] PathError),
}

/// Errors raised by conversion plugins and the document model.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Input matched a format but could not be decoded
    #[error("{format}: malformed input: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },

    /// Facet edge would make a node its own ancestor
    #[error("edge '{key}' would introduce a cycle")]
    CyclicEdge { key: String },

    /// Facet edge points at a node that does not exist in the document
    #[error("edge '{key}' points at unknown node {index}")]
    UnknownNode { key: String, index: usize },

    /// Compressed body could not be inflated
    #[error("failed to decode {encoding} body: {source}")]
    Decompression {
        encoding: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to reading and writing captured traffic.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// I/O error reading or writing the capture
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line is not a valid traffic record
    #[error("invalid record at line {line}: {message}")]
    InvalidRecord { line: usize, message: String },

    /// Endpoint field could not be parsed
    #[error("invalid endpoint at line {line}: {source}")]
    InvalidEndpoint {
        line: usize,
        #[source]
        source: HostnameError,
    },
}

/// Errors related to endpoint descriptions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostnameError {
    /// Empty or whitespace-only input
    #[error("hostname is blank")]
    Blank,

    /// Host part is neither a domain nor an IP address
    #[error("invalid hostname '{value}'")]
    InvalidHost { value: String },

    /// Port part is not a valid port number
    #[error("invalid port '{value}'")]
    InvalidPort { value: String },

    /// URL could not be parsed
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// URL without explicit port and with a scheme other than http/https
    #[error("cannot derive a port from '{url}'")]
    UnknownPort { url: String },
}

/// Errors related to key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// JSON web key lacks a member or has a wrong type
    #[error("invalid JSON web key: {reason}")]
    InvalidJwk { reason: String },

    /// Key material is not valid base64url
    #[error("invalid key encoding for '{name}'")]
    InvalidEncoding { name: String },

    /// Certificate could not be parsed or carries an unsupported key
    #[error("invalid certificate: {reason}")]
    InvalidCertificate { reason: String },
}

/// Result type alias for wiretree operations.
pub type Result<T> = std::result::Result<T, Error>;
