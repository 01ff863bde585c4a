//! Built-in facet kinds.
//!
//! Facets are grouped by the format that produces them. Every facet's
//! [`name`](crate::node::Facet::name) equals its type name, which is what
//! predicates see through the `facets` binding.

mod endpoint;
mod http;
mod json;
mod note;
mod token;
mod uri;

pub use endpoint::{HostnameFacet, TcpIpFacet};
pub use http::{HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet, HttpResponseFacet};
pub use json::{JsonFacet, ListFacet, MapFacet, NestedFacet};
pub use note::{Note, NoteFacet, NoteStyle};
pub use token::{BearerTokenFacet, JwtFacet, JwtSignatureFacet};
pub use uri::{FormDataFacet, UriFacet, UriParameterFacet};
