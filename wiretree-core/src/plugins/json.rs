//! JSON decoder.
//!
//! The decoded root carries `JsonFacet` plus the structure of its value.
//! Objects map to `MapFacet`, arrays to `ListFacet`. Every primitive node
//! holds its unquoted value and wraps a converted copy of it in a
//! `NestedFacet`, so strings carrying tokens or URIs are decoded too.
//!
//! [`Base64JsonPlugin`] unwraps JSON that travels base64-encoded.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use bytes::Bytes;
use compact_str::CompactString;
use serde_json::Value;
use tracing::trace;

use crate::convert::{ConversionContext, ConverterPlugin};
use crate::error::ConversionError;
use crate::facets::{JsonFacet, ListFacet, MapFacet, NestedFacet};
use crate::node::{NodeId, NodeRef};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPlugin;

impl JsonPlugin {
    pub fn new() -> Self {
        Self
    }

    fn decorate(ctx: &mut ConversionContext<'_>, node: NodeId, value: &Value) -> Result<(), ConversionError> {
        match value {
            Value::Object(members) => {
                let mut entries = Vec::with_capacity(members.len());
                for (key, member) in members {
                    let child = Self::member(ctx, node, member)?;
                    entries.push((CompactString::from(key.as_str()), child));
                }
                ctx.add_facet(node, MapFacet::from_entries(entries))
            }
            Value::Array(items) => {
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    children.push(Self::member(ctx, node, item)?);
                }
                ctx.add_facet(node, ListFacet::from_items(children))
            }
            _ => Ok(()),
        }
    }

    fn member(ctx: &mut ConversionContext<'_>, parent: NodeId, value: &Value) -> Result<NodeId, ConversionError> {
        match value {
            Value::Object(_) | Value::Array(_) => {
                let raw = Bytes::from(value.to_string());
                let child = ctx.add_node(Some(raw), Some(parent));
                Self::decorate(ctx, child, value)?;
                Ok(child)
            }
            primitive => {
                let raw = match primitive {
                    Value::String(s) => Bytes::from(s.clone()),
                    other => Bytes::from(other.to_string()),
                };
                let child = ctx.add_node(Some(raw.clone()), Some(parent));
                let nested = ctx.convert(raw, Some(child));
                ctx.add_facet(child, NestedFacet::new(nested))?;
                Ok(child)
            }
        }
    }
}

impl ConverterPlugin for JsonPlugin {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_convert(&self, node: NodeRef<'_>) -> bool {
        let Some(raw) = node.raw() else {
            return false;
        };
        matches!(
            raw.iter().find(|b| !b.is_ascii_whitespace()),
            Some(b'{') | Some(b'[')
        )
    }

    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let text = ctx.node(node).text().into_owned();
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                trace!(%err, "content is not JSON");
                return Ok(());
            }
        };
        ctx.add_facet(node, JsonFacet)?;
        Self::decorate(ctx, node, &value)
    }
}

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decodes base64 text whose payload is a JSON object or array.
///
/// Standard and URL-safe alphabets are accepted, padded or not, and line
/// breaks are ignored. The decoded JSON becomes the `content` of a
/// `NestedFacet` on the encoded node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64JsonPlugin;

impl Base64JsonPlugin {
    pub fn new() -> Self {
        Self
    }

    fn decode(text: &str) -> Option<Vec<u8>> {
        let compact: String = text.split_ascii_whitespace().collect();
        if compact.len() < 4 {
            return None;
        }
        let decoded = STANDARD_LENIENT
            .decode(&compact)
            .or_else(|_| URL_SAFE_LENIENT.decode(&compact))
            .ok()?;
        match serde_json::from_slice::<Value>(&decoded) {
            Ok(Value::Object(_)) | Ok(Value::Array(_)) => Some(decoded),
            _ => None,
        }
    }
}

impl ConverterPlugin for Base64JsonPlugin {
    fn name(&self) -> &'static str {
        "base64-json"
    }

    fn can_convert(&self, node: NodeRef<'_>) -> bool {
        node.raw().is_some_and(|raw| {
            !raw.is_empty()
                && raw
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || b"+/-_=".contains(b) || b.is_ascii_whitespace())
        })
    }

    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let Some(decoded) = Self::decode(&ctx.node(node).text()) else {
            return Ok(());
        };
        let nested = ctx.convert(decoded, Some(node));
        ctx.add_facet(node, NestedFacet::new(nested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{Converter, ConverterConfig};
    use crate::facets::UriFacet;
    use crate::plugins::UriPlugin;

    fn converter() -> Converter {
        let mut converter = Converter::bare(ConverterConfig::default());
        converter.register_plugin(JsonPlugin::new());
        converter.register_plugin(Base64JsonPlugin::new());
        converter.register_plugin(UriPlugin::new());
        converter
    }

    #[test]
    fn test_object_members() {
        let doc = converter().convert(r#"{"name":"alice","age":42,"admin":false,"nothing":null}"#);
        let root = doc.root();
        assert!(root.has_facet::<JsonFacet>());
        assert!(root.is_boundary());
        assert_eq!(root.first("name").unwrap().text(), "alice");
        assert_eq!(root.first("age").unwrap().text(), "42");
        assert_eq!(root.first("admin").unwrap().text(), "false");
        assert_eq!(root.first("nothing").unwrap().text(), "null");

        let keys: Vec<_> = root.edges().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["name", "age", "admin", "nothing"]);
    }

    #[test]
    fn test_nested_values() {
        let doc = converter().convert(r#"{"outer":{"list":["a",{"inner":"b"}]}}"#);
        let root = doc.root();
        let outer = root.first("outer").unwrap();
        assert!(outer.has_facet::<MapFacet>());
        assert!(!outer.has_facet::<JsonFacet>());
        assert_eq!(outer.text(), r#"{"list":["a",{"inner":"b"}]}"#);

        let list = outer.first("list").unwrap();
        let facet = list.facet::<ListFacet>().unwrap();
        assert_eq!(facet.len(), 2);
        assert_eq!(list.first("0").unwrap().text(), "a");
        assert_eq!(list.first("1").unwrap().first("inner").unwrap().text(), "b");
        assert_eq!(list.first("1").unwrap().first("inner").unwrap().path(), "outer.list.1.inner");
    }

    #[test]
    fn test_primitive_wraps_converted_value() {
        let doc = converter().convert(r#"{"redirect":"/cb?code=1"}"#);
        let redirect = doc.root().first("redirect").unwrap();
        let nested = doc.node(redirect.facet::<NestedFacet>().unwrap().nested());
        assert_eq!(nested.text(), "/cb?code=1");
        assert!(nested.has_facet::<UriFacet>());
        assert_eq!(redirect.first("content"), Some(nested));
    }

    #[test]
    fn test_invalid_json_is_noop() {
        let doc = converter().convert("{not json");
        assert!(doc.root().facet_names().is_empty());

        let doc = converter().convert("plain text");
        assert!(doc.root().facet_names().is_empty());
    }

    #[test]
    fn test_empty_object_is_not_boundary() {
        let doc = converter().convert("  {}");
        assert!(doc.root().has_facet::<JsonFacet>());
        assert!(!doc.root().is_boundary());
    }

    #[test]
    fn test_base64_json() {
        use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

        for encoded in [
            STANDARD.encode(r#"{"scope":"openid"}"#),
            URL_SAFE_NO_PAD.encode(r#"{"scope":"openid"}"#),
        ] {
            let doc = converter().convert(encoded);
            let root = doc.root();
            assert!(root.has_facet::<NestedFacet>());
            let nested = root.first("content").unwrap();
            assert!(nested.has_facet::<JsonFacet>());
            assert_eq!(nested.first("scope").unwrap().text(), "openid");
        }

        // Line-wrapped
        let doc = converter().convert("eyJhIjpb\r\nMSwyXX0=");
        assert_eq!(doc.root().first("content").unwrap().first("a").unwrap().first("1").unwrap().text(), "2");
    }

    #[test]
    fn test_base64_json_inside_json() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let encoded = URL_SAFE_NO_PAD.encode(r#"{"sub":"alice"}"#);
        let doc = converter().convert(format!(r#"{{"claims":"{encoded}"}}"#));
        let claims = doc.root().first("claims").unwrap();
        let decoded = claims.first("content").unwrap().first("content").unwrap();
        assert_eq!(decoded.first("sub").unwrap().text(), "alice");
    }

    #[test]
    fn test_base64_non_json_ignored() {
        use base64::engine::general_purpose::STANDARD;

        for text in [STANDARD.encode("plain text"), STANDARD.encode("42"), "abc".to_string(), "true".to_string()] {
            let doc = converter().convert(text);
            assert!(!doc.root().has_facet::<NestedFacet>());
        }
    }
}
