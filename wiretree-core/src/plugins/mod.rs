//! Built-in conversion plugins.
//!
//! | Plugin | Applies to | Facets |
//! |--------|------------|--------|
//! | [`HttpPlugin`] | HTTP/1.x requests and responses | `HttpRequestFacet`, `HttpResponseFacet`, `HttpMessageFacet`, `HttpHeaderFacet` |
//! | [`UriPlugin`] | `/path?query` and absolute URIs | `UriFacet`, `UriParameterFacet` |
//! | [`FormDataPlugin`] | form-encoded message bodies | `FormDataFacet` |
//! | [`JsonPlugin`] | JSON objects and arrays | `JsonFacet`, `MapFacet`, `ListFacet`, `NestedFacet` |
//! | [`Base64JsonPlugin`] | base64-encoded JSON | `NestedFacet` |
//! | [`JwtPlugin`] | compact JWS tokens | `JwtFacet`, `JwtSignatureFacet` |
//! | [`BearerTokenPlugin`] | `Bearer <token>` | `BearerTokenFacet` |

mod http;
mod json;
mod token;
mod uri;

pub use http::HttpPlugin;
pub use json::{Base64JsonPlugin, JsonPlugin};
pub use token::{BearerTokenPlugin, JwtPlugin, X5C_HEADER_KEY};
pub use uri::{FormDataPlugin, UriPlugin};

use crate::convert::ConverterPlugin;

/// The built-in plugins, in registration order.
pub fn default_plugins() -> Vec<Box<dyn ConverterPlugin>> {
    vec![
        Box::new(HttpPlugin::new()),
        Box::new(UriPlugin::new()),
        Box::new(FormDataPlugin::new()),
        Box::new(JsonPlugin::new()),
        Box::new(Base64JsonPlugin::new()),
        Box::new(JwtPlugin::new()),
        Box::new(BearerTokenPlugin::new()),
    ]
}
