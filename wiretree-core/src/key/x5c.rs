//! Harvests certificate keys from `x5c` members.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use super::{Key, PRECEDENCE_X5C_HEADER_VALUE};
use crate::convert::{ConversionContext, PostConversionListener};
use crate::error::ConversionError;
use crate::facets::MapFacet;
use crate::node::NodeId;

/// Registers the public key of the first certificate in an `x5c` chain.
///
/// The key is named by the sibling `kid` member, or `x5c` without one.
/// Chain members are standard base64 DER; the remaining certificates of
/// the chain are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct X5cKeyReader;

impl PostConversionListener for X5cKeyReader {
    fn on_converted(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let element = ctx.node(node);
        if !element.has_facet::<MapFacet>() {
            return Ok(());
        }
        let Some(leaf) = element.first("x5c").and_then(|chain| chain.first("0")) else {
            return Ok(());
        };

        let name = element
            .first("kid")
            .map(|kid| kid.text().into_owned())
            .unwrap_or_else(|| "x5c".to_string());
        let der = match STANDARD.decode(leaf.text().trim()) {
            Ok(der) => der,
            Err(err) => {
                debug!(%err, path = %leaf.path(), "x5c entry is not base64");
                return Ok(());
            }
        };
        match Key::from_certificate(name, &der, PRECEDENCE_X5C_HEADER_VALUE) {
            Ok(key) => ctx.key_manager().add(key),
            Err(err) => debug!(%err, path = %element.path(), "ignoring x5c certificate"),
        }
        Ok(())
    }
}
