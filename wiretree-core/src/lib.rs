//! # wiretree-core
//!
//! Decode captured HTTP traffic into an inspectable, queryable document
//! tree.
//!
//! Raw message bytes enter a [`Converter`], which wraps them in a node and
//! lets every registered [`ConverterPlugin`] decorate it with facets. Facets
//! expose structure as named edges, so a decoded request reads as a tree:
//! headers, the URI and its parameters, a JSON body, the JWT inside the
//! `Authorization` header, and so on. Callers then select parts of the tree
//! with path expressions enriched by boolean predicates.
//!
//! ## Quick Start
//!
//! ```rust
//! use wiretree_core::prelude::*;
//!
//! let converter = Converter::new();
//! let message = converter.parse_message(
//!     "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"user\":\"alice\"}",
//!     None,
//!     None,
//! );
//!
//! let root = message.root();
//! assert_eq!(root.find_element("$.responseCode").unwrap().unwrap().text(), "200");
//! assert_eq!(root.find_element("$.body.user").unwrap().unwrap().text(), "alice");
//! assert!(predicate::matches("message.isResponse", root, None));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                          wiretree-core                              |
//! +---------------------------------------------------------------------+
//! |  node/       - Document arena, NodeRef, Facet trait, tree printer   |
//! |  facets/     - Built-in facet kinds                                 |
//! |  convert/    - Converter, plugin traits, message history, config    |
//! |  plugins/    - HTTP, URI, form-data, JSON, JWT, bearer decoders     |
//! |  path/       - Path expressions                                     |
//! |  predicate/  - Predicate language and expression cache              |
//! |  key/        - Key manager and JWK listener                         |
//! |  capture/    - Message sources and traffic files                    |
//! |  shade.rs    - Value shading                                        |
//! |  error.rs    - Error types                                          |
//! +---------------------------------------------------------------------+
//! ```

pub mod capture;
pub mod convert;
pub mod error;
pub mod facets;
pub mod key;
pub mod node;
pub mod path;
pub mod plugins;
pub mod predicate;
pub mod prelude;
pub mod shade;

// Re-export commonly used types at crate root for convenience
pub use capture::{CapturedMessage, MessageSource, TrafficFileReader};
pub use convert::{
    ConversionContext, Converter, ConverterConfig, ConverterPlugin, MessageHistory,
    PostConversionListener, PreConversionRewrite,
};
pub use error::{
    CaptureError, ConversionError, Error, HostnameError, KeyError, PathError, PredicateError, Result,
};
pub use key::{Key, KeyKind, KeyManager};
pub use node::{Document, Facet, Hostname, NodeId, NodeKind, NodeRef, TreePrinter};
pub use path::PathExpression;
pub use predicate::Predicate;
pub use shade::ValueShader;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
