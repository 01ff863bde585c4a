//! Facets: typed annotations that give a node its structure.
//!
//! A node exposes children only through its facets. Each facet kind
//! contributes zero or more `(key, child)` edges and declares whether it
//! marks a nested-message boundary. A node holds at most one facet per
//! kind; adding a facet of a kind already present replaces it in place.

use std::any::{Any, TypeId};
use std::fmt;

use smallvec::SmallVec;

use super::NodeId;

/// Edges contributed by a single facet, in declaration order.
pub type Edges<'a> = SmallVec<[(&'a str, NodeId); 4]>;

/// A typed annotation attached to a node.
///
/// Implementations must be cheap to query: `edges` is called on every
/// traversal step.
pub trait Facet: Any + Send + Sync + fmt::Debug {
    /// Short kind name, as exposed to predicates through `facets`.
    fn name(&self) -> &'static str;

    /// Named child edges contributed by this facet.
    fn edges(&self) -> Edges<'_> {
        Edges::new()
    }

    /// Whether the content beneath this facet is an independently
    /// addressable embedded message.
    fn is_boundary(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implements the `Any` accessors of [`Facet`] for a concrete type.
#[macro_export]
macro_rules! facet_any {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

/// Insertion-ordered facet collection with one slot per kind.
#[derive(Default)]
pub struct FacetSet {
    entries: Vec<(TypeId, Box<dyn Facet>)>,
}

impl FacetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a facet, replacing an existing facet of the same kind.
    ///
    /// Returns the replaced facet, if any. A replaced facet keeps its
    /// position in iteration order.
    pub fn insert<F: Facet>(&mut self, facet: F) -> Option<Box<dyn Facet>> {
        let type_id = TypeId::of::<F>();
        let boxed: Box<dyn Facet> = Box::new(facet);
        match self.entries.iter_mut().find(|(id, _)| *id == type_id) {
            Some(slot) => Some(std::mem::replace(&mut slot.1, boxed)),
            None => {
                self.entries.push((type_id, boxed));
                None
            }
        }
    }

    pub fn get<F: Facet>(&self) -> Option<&F> {
        let type_id = TypeId::of::<F>();
        self.entries
            .iter()
            .find(|(id, _)| *id == type_id)
            .and_then(|(_, facet)| facet.as_any().downcast_ref::<F>())
    }

    pub fn get_mut<F: Facet>(&mut self) -> Option<&mut F> {
        let type_id = TypeId::of::<F>();
        self.entries
            .iter_mut()
            .find(|(id, _)| *id == type_id)
            .and_then(|(_, facet)| facet.as_any_mut().downcast_mut::<F>())
    }

    pub fn contains<F: Facet>(&self) -> bool {
        let type_id = TypeId::of::<F>();
        self.entries.iter().any(|(id, _)| *id == type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Facet> {
        self.entries.iter().map(|(_, facet)| facet.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for FacetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(_, facet)| facet.name()))
            .finish()
    }
}
