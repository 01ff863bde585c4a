use compact_str::{CompactString, ToCompactString};

use crate::node::{Edges, Facet, NodeId};

/// Marks the root of an embedded JSON document.
///
/// Carries no edges itself; structure comes from [`MapFacet`] or
/// [`ListFacet`] on the same node.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFacet;

impl Facet for JsonFacet {
    fn name(&self) -> &'static str {
        "JsonFacet"
    }

    fn is_boundary(&self) -> bool {
        true
    }

    crate::facet_any!();
}

/// Keyed children in source order. Duplicate keys are kept.
#[derive(Debug, Clone, Default)]
pub struct MapFacet {
    entries: Vec<(CompactString, NodeId)>,
}

impl MapFacet {
    pub fn from_entries(entries: Vec<(CompactString, NodeId)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(CompactString, NodeId)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.entries.iter().find(|(k, _)| k.as_str() == key).map(|(_, id)| *id)
    }
}

impl Facet for MapFacet {
    fn name(&self) -> &'static str {
        "MapFacet"
    }

    fn edges(&self) -> Edges<'_> {
        self.entries.iter().map(|(k, id)| (k.as_str(), *id)).collect()
    }

    crate::facet_any!();
}

/// Positional children keyed `"0"`, `"1"`, ...
#[derive(Debug, Clone, Default)]
pub struct ListFacet {
    items: Vec<(CompactString, NodeId)>,
}

impl ListFacet {
    pub fn from_items(items: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            items: items
                .into_iter()
                .enumerate()
                .map(|(i, id)| (i.to_compact_string(), id))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.items.get(index).map(|(_, id)| *id)
    }
}

impl Facet for ListFacet {
    fn name(&self) -> &'static str {
        "ListFacet"
    }

    fn edges(&self) -> Edges<'_> {
        self.items.iter().map(|(k, id)| (k.as_str(), *id)).collect()
    }

    crate::facet_any!();
}

/// Pass-through wrapper: the node's value re-read as its own document.
///
/// Path queries that end on a wrapper yield the nested element instead.
#[derive(Debug, Clone, Copy)]
pub struct NestedFacet {
    nested: NodeId,
}

impl NestedFacet {
    pub fn new(nested: NodeId) -> Self {
        Self { nested }
    }

    pub fn nested(&self) -> NodeId {
        self.nested
    }
}

impl Facet for NestedFacet {
    fn name(&self) -> &'static str {
        "NestedFacet"
    }

    fn edges(&self) -> Edges<'_> {
        smallvec::smallvec![("content", self.nested)]
    }

    crate::facet_any!();
}
