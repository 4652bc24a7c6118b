pub use pact_common::Span;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

/// Identity of an AST node, unique for the life of the process.
///
/// Ids come out of a single monotonic counter, so a node parsed later
/// always carries a larger id than one parsed earlier. Downstream that
/// ordering is load-bearing: the code generator's function work queue and
/// its dispatch tables sort by id, and since the driver parses sources in
/// key order, id order (and with it emission order) is reproducible for a
/// given source set.
#[derive(
    Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash, Default,
)]
pub struct NodeId(u32);

impl NodeId {
    /// Draw the next id from the global counter.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value, for building derived names that must stay
    /// unique across an inheritance hierarchy.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// An AST node: a syntactic payload together with the span it covers and
/// its process-unique id.
///
/// The id is assigned here, at construction, which is what ties id order
/// to parse order. Serialized forms drop it (and regain a default on the
/// way back in), because ids are only meaningful inside one process.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Node<T> {
    pub kind: T,
    #[serde(skip)]
    pub id: NodeId,
    pub span: Span,
}

impl<T> Node<T> {
    pub fn new(kind: T, span: Span) -> Self {
        Self {
            kind,
            id: NodeId::fresh(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, NodeId, Span};

    #[test]
    fn ids_ascend_in_creation_order() {
        let first = Node::new((), Span::empty());
        let second = Node::new((), Span::empty());
        assert!(first.id < second.id);
    }

    #[test]
    fn clones_keep_their_id() {
        let node = Node::new("kind", Span::new(1, 5));
        let copy = node.clone();
        assert_eq!(node.id, copy.id);
        assert_ne!(Node::new("kind", Span::new(1, 5)).id, node.id);
    }

    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(NodeId::fresh(), NodeId::fresh());
    }
}
