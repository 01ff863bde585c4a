//! Document arena and node handles.
//!
//! A [`Document`] owns every node produced while decoding one captured
//! message. Nodes are addressed by [`NodeId`] (an index into the arena) and
//! read through [`NodeRef`], a cheap copyable handle that borrows the
//! document. Parent links are indices, so the arena never holds an
//! ownership cycle no matter how facets wire nodes together.
//!
//! Structure is exposed only through [`Facet`]s. Adding a facet validates
//! its edges so the edge graph stays acyclic.

mod facet;
mod hostname;
mod tree;

pub use facet::{Edges, Facet, FacetSet};
pub use hostname::Hostname;
pub use tree::TreePrinter;

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};

use crate::error::ConversionError;

/// Process-wide node identity counter.
static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Index of a node within its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Runtime kind of a node, derived from its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Holds captured or decoded bytes and no facets yet
    Raw,
    /// Holds no bytes and no facets
    Synthetic,
    /// Carries at least one facet
    Structured,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Raw => "raw",
            NodeKind::Synthetic => "synthetic",
            NodeKind::Structured => "structured",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct NodeData {
    uid: u64,
    parent: Option<NodeId>,
    content: Option<Bytes>,
    charset: Option<&'static Encoding>,
    facets: FacetSet,
    note: Option<String>,
}

impl NodeData {
    fn new(content: Option<Bytes>, parent: Option<NodeId>) -> Self {
        Self {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            parent,
            content,
            charset: None,
            facets: FacetSet::new(),
            note: None,
        }
    }
}

/// Arena of nodes decoded from one captured message.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Document {
    /// Create a document whose root holds `content`.
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            nodes: vec![NodeData::new(Some(content.into()), None)],
            root: NodeId(0),
        }
    }

    /// Create a document whose root holds no bytes.
    pub fn synthetic() -> Self {
        Self {
            nodes: vec![NodeData::new(None, None)],
            root: NodeId(0),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { doc: self, id: self.root }
    }

    /// Handle for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this document.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(id.index() < self.nodes.len(), "node {} not in document", id.index());
        NodeRef { doc: self, id }
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.index() < self.nodes.len()).then_some(NodeRef { doc: self, id })
    }

    /// Number of nodes in the arena, including unreachable ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Size of the root's raw payload in bytes.
    pub fn raw_size(&self) -> usize {
        self.nodes[self.root.index()]
            .content
            .as_ref()
            .map_or(0, Bytes::len)
    }

    /// Allocate a node, optionally scoped under `parent` for charset
    /// inheritance and path computation.
    pub fn add_node(&mut self, content: Option<Bytes>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(content, parent));
        id
    }

    /// Attach `facet` to `node`, replacing any facet of the same kind.
    ///
    /// Fails without modifying the node if an edge points outside the
    /// document or would let `node` reach itself.
    pub fn add_facet<F: Facet>(&mut self, node: NodeId, facet: F) -> Result<(), ConversionError> {
        for (key, child) in facet.edges() {
            if child.index() >= self.nodes.len() {
                return Err(ConversionError::UnknownNode {
                    key: key.to_string(),
                    index: child.index(),
                });
            }
            if self.reaches(child, node) {
                return Err(ConversionError::CyclicEdge {
                    key: key.to_string(),
                });
            }
        }
        self.nodes[node.index()].facets.insert(facet);
        Ok(())
    }

    /// Mutable access to a facet. Callers must not change its edges.
    pub(crate) fn facet_mut<F: Facet>(&mut self, node: NodeId) -> Option<&mut F> {
        self.nodes.get_mut(node.index())?.facets.get_mut::<F>()
    }

    pub fn set_charset(&mut self, node: NodeId, charset: &'static Encoding) {
        self.nodes[node.index()].charset = Some(charset);
    }

    /// Set the note of `node`. A note can be set only once; returns
    /// `false` if one was already present.
    pub fn set_note(&mut self, node: NodeId, note: impl Into<String>) -> bool {
        let slot = &mut self.nodes[node.index()].note;
        if slot.is_some() {
            return false;
        }
        *slot = Some(note.into());
        true
    }

    /// Make `id` the root. Used when a rewrite substitutes the top node.
    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.nodes[id.index()].parent = None;
        self.root = id;
    }

    /// Whether `target` is reachable from `from` through facet edges.
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            for facet in self.nodes[current.index()].facets.iter() {
                stack.extend(facet.edges().into_iter().map(|(_, id)| id));
            }
        }
        false
    }
}

/// Borrowed handle to a node in a [`Document`].
///
/// Equality and hashing use the process-unique node identity.
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    id: NodeId,
}

impl<'d> NodeRef<'d> {
    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id.index()]
    }

    fn at(&self, id: NodeId) -> NodeRef<'d> {
        NodeRef { doc: self.doc, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Process-unique identity of this node.
    pub fn uid(&self) -> u64 {
        self.data().uid
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.data().parent.map(|id| self.at(id))
    }

    /// Topmost ancestor reachable through parent links (self for a root).
    pub fn top(&self) -> NodeRef<'d> {
        let mut current = *self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn raw(&self) -> Option<&'d [u8]> {
        self.data().content.as_deref()
    }

    pub fn raw_bytes(&self) -> Option<&'d Bytes> {
        self.data().content.as_ref()
    }

    /// Encoding of this node, inherited from the nearest ancestor that
    /// declares one, UTF-8 otherwise.
    pub fn charset(&self) -> &'static Encoding {
        let mut current = Some(*self);
        while let Some(node) = current {
            if let Some(charset) = node.data().charset {
                return charset;
            }
            current = node.parent();
        }
        UTF_8
    }

    /// Raw payload decoded with [`charset`](Self::charset). Empty for
    /// synthetic nodes.
    pub fn text(&self) -> Cow<'d, str> {
        match self.raw() {
            Some(raw) => self.charset().decode_without_bom_handling(raw).0,
            None => Cow::Borrowed(""),
        }
    }

    pub fn kind(&self) -> NodeKind {
        let data = self.data();
        if !data.facets.is_empty() {
            NodeKind::Structured
        } else if data.content.is_some() {
            NodeKind::Raw
        } else {
            NodeKind::Synthetic
        }
    }

    pub fn note(&self) -> Option<&'d str> {
        self.data().note.as_deref()
    }

    pub fn facets(&self) -> impl Iterator<Item = &'d dyn Facet> {
        self.data().facets.iter()
    }

    pub fn facet<F: Facet>(&self) -> Option<&'d F> {
        self.data().facets.get::<F>()
    }

    pub fn has_facet<F: Facet>(&self) -> bool {
        self.data().facets.contains::<F>()
    }

    pub fn facet_names(&self) -> Vec<&'static str> {
        self.facets().map(|f| f.name()).collect()
    }

    /// All `(key, child)` edges across all facets, in facet order.
    pub fn edges(&self) -> Vec<(&'d str, NodeRef<'d>)> {
        let mut out = Vec::new();
        for facet in self.facets() {
            out.extend(facet.edges().into_iter().map(|(key, id)| (key, self.at(id))));
        }
        out
    }

    /// Children across all facets, ignoring keys.
    pub fn children(&self) -> Vec<NodeRef<'d>> {
        self.edges().into_iter().map(|(_, child)| child).collect()
    }

    /// First child reachable under `key`.
    pub fn first(&self, key: &str) -> Option<NodeRef<'d>> {
        self.edges()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, child)| child)
    }

    /// All children reachable under `key`, in edge order.
    pub fn all(&self, key: &str) -> Vec<NodeRef<'d>> {
        self.edges()
            .into_iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, child)| child)
            .collect()
    }

    /// Key of the first parent edge leading to this node.
    pub fn key_in_parent(&self) -> Option<&'d str> {
        let parent = self.parent()?;
        parent
            .edges()
            .into_iter()
            .find(|(_, child)| child.id == self.id)
            .map(|(key, _)| key)
    }

    /// Dotted path from the root to this node.
    ///
    /// A node whose parent has no edge to it yet (a plugin created it but
    /// has not attached its facet) appears as `#<index>`, so it never
    /// shares a path with its parent.
    pub fn path(&self) -> String {
        let mut keys = Vec::new();
        let mut current = *self;
        while let Some(parent) = current.parent() {
            match current.key_in_parent() {
                Some(key) => keys.push(key.to_string()),
                None => keys.push(format!("#{}", current.id.index())),
            }
            current = parent;
        }
        keys.reverse();
        keys.join(".")
    }

    /// Whether this node starts an embedded message.
    ///
    /// A boundary facet on a node without any edges does not count.
    pub fn is_boundary(&self) -> bool {
        self.facets().any(|f| f.is_boundary()) && self.facets().any(|f| !f.edges().is_empty())
    }

    /// Embedded messages beneath this node, keyed by their dotted path
    /// relative to it.
    ///
    /// Descends depth-first and stops at each boundary, yielding the
    /// boundary node itself.
    pub fn nested_members(&self) -> Vec<(String, NodeRef<'d>)> {
        let mut out = Vec::new();
        for (key, child) in self.edges() {
            child.collect_boundaries(key.to_string(), &mut out);
        }
        out
    }

    fn collect_boundaries(&self, prefix: String, out: &mut Vec<(String, NodeRef<'d>)>) {
        if self.is_boundary() {
            out.push((prefix, *self));
            return;
        }
        for (key, child) in self.edges() {
            child.collect_boundaries(format!("{prefix}.{key}"), out);
        }
    }

    /// All transitive descendants, excluding this node.
    ///
    /// Direct children come first, followed by each child's own
    /// descendants.
    pub fn descendants(&self) -> Vec<NodeRef<'d>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_descendants(&mut out, &mut seen);
        out
    }

    fn collect_descendants(&self, out: &mut Vec<NodeRef<'d>>, seen: &mut HashSet<NodeId>) {
        let fresh: Vec<_> = self
            .children()
            .into_iter()
            .filter(|child| seen.insert(child.id))
            .collect();
        out.extend(fresh.iter().copied());
        for child in fresh {
            child.collect_descendants(out, seen);
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.uid() == other.uid()
    }
}

impl Eq for NodeRef<'_> {}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid().hash(state);
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("uid", &self.uid())
            .field("path", &self.path())
            .field("facets", &self.facet_names())
            .finish()
    }
}
