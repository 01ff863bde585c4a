use compact_str::CompactString;

use crate::node::{Edges, Facet, NodeId};

/// A URI split into its path and query parameters.
///
/// Each parameter edge is keyed by the parameter name and leads to a node
/// carrying [`UriParameterFacet`].
#[derive(Debug, Clone)]
pub struct UriFacet {
    pub basic_path: NodeId,
    parameters: Vec<(CompactString, NodeId)>,
}

impl UriFacet {
    pub fn new(basic_path: NodeId, parameters: Vec<(CompactString, NodeId)>) -> Self {
        Self {
            basic_path,
            parameters,
        }
    }

    pub fn parameters(&self) -> &[(CompactString, NodeId)] {
        &self.parameters
    }
}

impl Facet for UriFacet {
    fn name(&self) -> &'static str {
        "UriFacet"
    }

    fn edges(&self) -> Edges<'_> {
        let mut edges: Edges<'_> = smallvec::smallvec![("basicPath", self.basic_path)];
        edges.extend(self.parameters.iter().map(|(k, id)| (k.as_str(), *id)));
        edges
    }

    crate::facet_any!();
}

/// One `key=value` pair of a query string.
#[derive(Debug, Clone, Copy)]
pub struct UriParameterFacet {
    pub key: NodeId,
    pub value: NodeId,
}

impl Facet for UriParameterFacet {
    fn name(&self) -> &'static str {
        "UriParameterFacet"
    }

    fn edges(&self) -> Edges<'_> {
        smallvec::smallvec![("key", self.key), ("value", self.value)]
    }

    crate::facet_any!();
}

/// Fields of an `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, Default)]
pub struct FormDataFacet {
    entries: Vec<(CompactString, NodeId)>,
}

impl FormDataFacet {
    pub fn from_entries(entries: Vec<(CompactString, NodeId)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(CompactString, NodeId)] {
        &self.entries
    }
}

impl Facet for FormDataFacet {
    fn name(&self) -> &'static str {
        "FormDataFacet"
    }

    fn edges(&self) -> Edges<'_> {
        self.entries.iter().map(|(k, id)| (k.as_str(), *id)).collect()
    }

    crate::facet_any!();
}
