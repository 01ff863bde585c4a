//! URI and form-data decoders.

use bytes::Bytes;
use compact_str::CompactString;
use url::form_urlencoded;

use crate::convert::{ConversionContext, ConverterPlugin};
use crate::error::ConversionError;
use crate::facets::{FormDataFacet, HttpHeaderFacet, HttpMessageFacet, UriFacet, UriParameterFacet};
use crate::node::{NodeId, NodeRef};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Splits a URI into `basicPath` and its query parameters.
///
/// Applies to whitespace-free text that starts with `/` or carries a
/// scheme. Parameters without `=` are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriPlugin;

impl UriPlugin {
    pub fn new() -> Self {
        Self
    }

    fn looks_like_uri(text: &str) -> bool {
        !text.is_empty()
            && !text.contains(char::is_whitespace)
            && (text.starts_with('/') || text.contains("://"))
    }
}

/// Decode one `key=value` pair. `None` if there is no `=`.
fn decode_pair(pair: &str) -> Option<(String, String)> {
    if !pair.contains('=') {
        return None;
    }
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
}

impl ConverterPlugin for UriPlugin {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn can_convert(&self, node: NodeRef<'_>) -> bool {
        Self::looks_like_uri(&node.text())
    }

    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let text = ctx.node(node).text().into_owned();
        let (basic_path, query) = match text.split_once('?') {
            Some((path, query)) => (path, query.split('#').next().unwrap_or_default()),
            None => (text.split('#').next().unwrap_or_default(), ""),
        };

        let basic = ctx.add_node(Some(Bytes::from(basic_path.to_string())), Some(node));
        let mut parameters = Vec::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let Some((key, value)) = decode_pair(pair) else {
                continue;
            };
            let parameter = ctx.add_node(Some(Bytes::from(pair.to_string())), Some(node));
            let key_node = ctx.add_node(Some(Bytes::from(key.clone())), Some(parameter));
            let value_node = ctx.convert(value, Some(parameter));
            ctx.add_facet(
                parameter,
                UriParameterFacet {
                    key: key_node,
                    value: value_node,
                },
            )?;
            parameters.push((CompactString::from(key), parameter));
        }

        ctx.add_facet(node, UriFacet::new(basic, parameters))
    }
}

/// Decodes `application/x-www-form-urlencoded` message bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormDataPlugin;

impl FormDataPlugin {
    pub fn new() -> Self {
        Self
    }

    /// Whether `node` is the body of a message declaring a form Content-Type.
    fn is_form_body(node: NodeRef<'_>) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        let Some(message) = parent.facet::<HttpMessageFacet>() else {
            return false;
        };
        if message.body != node.id() {
            return false;
        }
        let document = node.document();
        document
            .node(message.header)
            .facet::<HttpHeaderFacet>()
            .is_some_and(|headers| {
                headers.lookup("Content-Type").any(|value| {
                    document
                        .node(value)
                        .text()
                        .trim_start()
                        .to_ascii_lowercase()
                        .starts_with(FORM_CONTENT_TYPE)
                })
            })
    }
}

impl ConverterPlugin for FormDataPlugin {
    fn name(&self) -> &'static str {
        "form-data"
    }

    fn can_convert(&self, node: NodeRef<'_>) -> bool {
        Self::is_form_body(node)
    }

    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let text = ctx.node(node).text().into_owned();
        let mut entries = Vec::new();
        for pair in text.trim().split('&') {
            let Some((key, value)) = decode_pair(pair) else {
                continue;
            };
            let value = ctx.convert(value, Some(node));
            entries.push((CompactString::from(key), value));
        }
        ctx.add_facet(node, FormDataFacet::from_entries(entries))
    }
}
