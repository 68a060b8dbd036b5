//! Knowledge graph store: URI interning, concurrent batched construction,
//! optional weight and cluster layers, and binary snapshot persistence.

pub mod snapshot;
pub mod store;

pub use store::{ClusterTable, EdgeBatch, GraphStore, StoreConfig, Topology};

use petgraph::graph::NodeIndex;

/// Dense, 0-based identifier of an interned URI.
///
/// Ids are assigned contiguously on first sight of a URI and are never
/// reused. The id doubles as the index into the store's reverse URI table
/// and into per-vertex side tables (cluster assignments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VertexId(u32);

impl VertexId {
    pub fn new(raw: u32) -> Self {
        VertexId(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The petgraph node index backing this vertex.
    pub(crate) fn node(self) -> NodeIndex<u32> {
        NodeIndex::new(self.0 as usize)
    }

    pub(crate) fn from_node(node: NodeIndex<u32>) -> Self {
        VertexId(node.index() as u32)
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
