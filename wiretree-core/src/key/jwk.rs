//! Harvests keys that travel inside decoded messages.

use serde_json::{Map, Value};
use tracing::debug;

use super::{decode_base64url, Key, PRECEDENCE_KEY_FOLDER};
use crate::convert::{ConversionContext, PostConversionListener};
use crate::error::ConversionError;
use crate::facets::MapFacet;
use crate::node::{NodeId, NodeRef};

/// Registers symmetric JSON web keys and `token_key` members with the
/// converter's key manager.
///
/// A map node with `kty == "oct"` plus `kid` and `k` members becomes a key
/// named by its `kid`. A map node with a `token_key` member registers that
/// value (base64url) as the key `token_key`. Malformed material is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwkKeyReader;

fn member_text(node: NodeRef<'_>, name: &str) -> Option<String> {
    node.first(name).map(|child| child.text().into_owned())
}

impl PostConversionListener for JwkKeyReader {
    fn on_converted(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let element = ctx.node(node);
        if !element.has_facet::<MapFacet>() {
            return Ok(());
        }

        if member_text(element, "kty").as_deref() == Some("oct") {
            let mut jwk = Map::new();
            for name in ["kty", "kid", "k"] {
                if let Some(value) = member_text(element, name) {
                    jwk.insert(name.to_string(), Value::String(value));
                }
            }
            match Key::from_jwk(&Value::Object(jwk)) {
                Ok(key) => ctx.key_manager().add(key),
                Err(err) => debug!(%err, path = %element.path(), "ignoring JSON web key"),
            }
        }

        if let Some(token_key) = member_text(ctx.node(node), "token_key") {
            match decode_base64url("token_key", &token_key) {
                Ok(material) => ctx
                    .key_manager()
                    .add_key("token_key", material, PRECEDENCE_KEY_FOLDER),
                Err(err) => debug!(%err, "ignoring token_key member"),
            }
        }
        Ok(())
    }
}
