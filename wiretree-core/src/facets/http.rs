use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;

use crate::node::{Document, Edges, Facet, NodeId};

/// Header and body of an HTTP message.
#[derive(Debug, Clone, Copy)]
pub struct HttpMessageFacet {
    pub header: NodeId,
    pub body: NodeId,
}

impl Facet for HttpMessageFacet {
    fn name(&self) -> &'static str {
        "HttpMessageFacet"
    }

    fn edges(&self) -> Edges<'_> {
        smallvec::smallvec![("header", self.header), ("body", self.body)]
    }

    crate::facet_any!();
}

/// Request line of an HTTP request.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequestFacet {
    pub method: NodeId,
    pub path: NodeId,
}

impl Facet for HttpRequestFacet {
    fn name(&self) -> &'static str {
        "HttpRequestFacet"
    }

    fn edges(&self) -> Edges<'_> {
        smallvec::smallvec![("method", self.method), ("path", self.path)]
    }

    crate::facet_any!();
}

/// Status line of an HTTP response, plus the request it answers.
///
/// The request lives in another document, so the link is an owned handle
/// rather than an edge.
#[derive(Clone)]
pub struct HttpResponseFacet {
    pub response_code: NodeId,
    pub reason_phrase: Option<NodeId>,
    pub request: Option<Arc<Document>>,
}

impl HttpResponseFacet {
    pub fn new(response_code: NodeId, reason_phrase: Option<NodeId>) -> Self {
        Self {
            response_code,
            reason_phrase,
            request: None,
        }
    }
}

impl fmt::Debug for HttpResponseFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponseFacet")
            .field("response_code", &self.response_code)
            .field("reason_phrase", &self.reason_phrase)
            .field("request", &self.request.as_ref().map(|doc| doc.root().uid()))
            .finish()
    }
}

impl Facet for HttpResponseFacet {
    fn name(&self) -> &'static str {
        "HttpResponseFacet"
    }

    fn edges(&self) -> Edges<'_> {
        let mut edges: Edges<'_> = smallvec::smallvec![("responseCode", self.response_code)];
        if let Some(reason) = self.reason_phrase {
            edges.push(("reasonPhrase", reason));
        }
        edges
    }

    crate::facet_any!();
}

/// Header lines as an ordered multimap.
///
/// Edges use the header name as sent. Repeated headers produce repeated
/// edges in line order.
#[derive(Debug, Clone, Default)]
pub struct HttpHeaderFacet {
    entries: Vec<(CompactString, NodeId)>,
}

impl HttpHeaderFacet {
    pub fn from_entries(entries: Vec<(CompactString, NodeId)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(CompactString, NodeId)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Values of every header named `name`, compared case-insensitively.
    pub fn lookup<'a>(&'a self, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
    }

    pub fn first(&self, name: &str) -> Option<NodeId> {
        self.lookup(name).next()
    }
}

impl Facet for HttpHeaderFacet {
    fn name(&self) -> &'static str {
        "HttpHeaderFacet"
    }

    fn edges(&self) -> Edges<'_> {
        self.entries.iter().map(|(k, id)| (k.as_str(), *id)).collect()
    }

    crate::facet_any!();
}
