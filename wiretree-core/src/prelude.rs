//! Convenient re-exports for common usage.
//!
//! ```rust
//! use wiretree_core::prelude::*;
//!
//! let converter = Converter::new();
//! let doc = converter.convert("GET /index.html HTTP/1.1\r\n\r\n");
//! assert!(doc.root().has_facet::<HttpRequestFacet>());
//! ```

// Document model
pub use crate::node::{Document, Facet, Hostname, NodeId, NodeKind, NodeRef, TreePrinter};

// Built-in facets
pub use crate::facets::{
    HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet, HttpResponseFacet, JsonFacet, JwtFacet,
    ListFacet, MapFacet, NestedFacet, TcpIpFacet,
};

// Conversion
pub use crate::convert::{ConversionContext, Converter, ConverterConfig, ConverterPlugin};

// Queries
pub use crate::path::PathExpression;
pub use crate::predicate::{self, Predicate};

// Error types
pub use crate::error::{Error, Result};
