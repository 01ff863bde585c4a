//! Extension points of the conversion engine.

use crate::error::ConversionError;
use crate::node::{NodeId, NodeRef};

use super::ConversionContext;

/// A format decoder.
///
/// Every registered plugin runs against every converted node, in
/// registration order. A plugin must be a no-op on input that is not its
/// format; an `Err` means the input looked like its format but could not
/// be decoded, and is recorded on the node without stopping the pipeline.
pub trait ConverterPlugin: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Cheap check whether `convert` should run at all.
    fn can_convert(&self, _node: NodeRef<'_>) -> bool {
        true
    }

    /// Decorate `node` with facets, converting nested regions through
    /// `ctx.convert`.
    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError>;
}

/// Substitutes a freshly created node before plugins run.
///
/// Returning `Some(other)` replaces the node; the replacement is then
/// offered to the rewrites again until none of them substitutes.
pub trait PreConversionRewrite: Send + Sync {
    fn rewrite(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Option<NodeId>;
}

impl<F> PreConversionRewrite for F
where
    F: Fn(NodeId, &mut ConversionContext<'_>) -> Option<NodeId> + Send + Sync,
{
    fn rewrite(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Option<NodeId> {
        self(node, ctx)
    }
}

/// Hook invoked for every node of a finished message, children first.
pub trait PostConversionListener: Send + Sync {
    fn on_converted(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError>;
}

impl<F> PostConversionListener for F
where
    F: Fn(NodeId, &mut ConversionContext<'_>) -> Result<(), ConversionError> + Send + Sync,
{
    fn on_converted(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        self(node, ctx)
    }
}
