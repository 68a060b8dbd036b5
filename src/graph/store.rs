//! The shared knowledge graph store.
//!
//! Two independent lock domains protect the store during construction:
//!
//! - the **vertex domain**: a reader/writer lock over the URI interning
//!   tables, taken very frequently (three lookups per parsed triple);
//! - the **graph domain**: a reader/writer lock over the topology (edge
//!   structure plus label/weight/cluster layers), written only when a
//!   writer commits a whole batch of edges.
//!
//! RDF parsing produces far more vertex lookups than structure commits, so
//! the two domains are never merged — interning proceeds while another
//! thread holds the graph lock for a batch commit. Once construction is
//! done, relatedness queries take cheap uncontended read guards on the
//! graph domain.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use petgraph::graph::{DiGraph, EdgeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;

use crate::error::GraphError;

use super::VertexId;

/// Edges a writer buffers locally before attempting a batch commit.
pub const BATCH_SIZE: usize = 16_384;

/// Configuration for a [`GraphStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity hint: expected number of vertices.
    pub reserve_vertices: usize,
    /// Capacity hint: expected number of edges.
    pub reserve_edges: usize,
    /// Maintain the per-edge weight layer (initialized to `+∞` per edge
    /// until a weighting pass assigns real values).
    pub weighted: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reserve_vertices: 1 << 12,
            reserve_edges: 1 << 16,
            weighted: true,
        }
    }
}

/// URI interning tables: the forward map owns no string data of its own,
/// both directions share one `Arc<str>` per URI.
struct UriTable {
    forward: FxHashMap<Arc<str>, VertexId>,
    reverse: Vec<Arc<str>>,
}

/// Hierarchical cluster assignment: one single-byte label per vertex per
/// level, coarsest level first. Vertex-major layout.
#[derive(Debug, Clone)]
pub struct ClusterTable {
    levels: usize,
    assign: Vec<u8>,
}

impl ClusterTable {
    /// Create a table for `vertex_count` vertices with all labels zero.
    pub fn new(levels: usize, vertex_count: usize) -> Self {
        Self {
            levels,
            assign: vec![0; levels * vertex_count],
        }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn vertex_count(&self) -> usize {
        if self.levels == 0 {
            0
        } else {
            self.assign.len() / self.levels
        }
    }

    /// Cluster label of `vertex` at `level`, or `None` when the vertex was
    /// interned after the clustering pass ran.
    pub fn label(&self, vertex: VertexId, level: usize) -> Option<u8> {
        debug_assert!(level < self.levels);
        self.assign.get(vertex.index() * self.levels + level).copied()
    }

    pub fn set_label(&mut self, vertex: VertexId, level: usize, label: u8) {
        self.assign[vertex.index() * self.levels + level] = label;
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.assign
    }

    pub(crate) fn from_raw(levels: usize, assign: Vec<u8>) -> Self {
        Self { levels, assign }
    }
}

/// The graph-domain state: edge structure plus side layers.
///
/// Edges carry their predicate label as the petgraph edge weight, so the
/// label table is structurally the same length as the edge list. The weight
/// layer is a parallel `Vec<f64>` indexed by edge insertion rank; the
/// commit path keeps it in lockstep with the edge count.
pub struct Topology {
    graph: DiGraph<(), VertexId, u32>,
    weights: Option<Vec<f64>>,
    clusters: Option<ClusterTable>,
}

impl Topology {
    fn new(config: &StoreConfig) -> Self {
        Self {
            graph: DiGraph::with_capacity(config.reserve_vertices, config.reserve_edges),
            weights: config.weighted.then(|| Vec::with_capacity(config.reserve_edges)),
            clusters: None,
        }
    }

    /// Number of vertices committed to the edge structure. May lag behind
    /// the store's interned vertex count between batch commits.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Endpoints of edge `eid` in insertion order, `(from, to)`.
    pub fn endpoints(&self, eid: usize) -> Option<(VertexId, VertexId)> {
        self.graph
            .edge_endpoints(EdgeIndex::new(eid))
            .map(|(a, b)| (VertexId::from_node(a), VertexId::from_node(b)))
    }

    /// Predicate label of edge `eid`.
    pub fn label(&self, eid: usize) -> Option<VertexId> {
        self.graph.edge_weight(EdgeIndex::new(eid)).copied()
    }

    /// Weight of edge `eid`: the weight-layer value (default `+∞` until a
    /// weighting pass runs), or `1.0` on unweighted stores.
    pub fn edge_weight(&self, eid: usize) -> f64 {
        match &self.weights {
            Some(w) => w[eid],
            None => 1.0,
        }
    }

    pub fn has_weights(&self) -> bool {
        self.weights.is_some()
    }

    pub(crate) fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Assign the weight of edge `eid`. Fails on stores built without a
    /// weight layer.
    pub fn set_edge_weight(&mut self, eid: usize, weight: f64) -> Result<(), GraphError> {
        match &mut self.weights {
            Some(w) => {
                w[eid] = weight;
                Ok(())
            }
            None => Err(GraphError::WeightLayerMissing),
        }
    }

    /// Enable the weight layer, filling existing edges with `+∞`.
    pub(crate) fn ensure_weight_layer(&mut self) {
        let ecount = self.graph.edge_count();
        self.weights
            .get_or_insert_with(Vec::new)
            .resize(ecount, f64::INFINITY);
    }

    pub fn clusters(&self) -> Option<&ClusterTable> {
        self.clusters.as_ref()
    }

    /// The cluster table, or an error when no clustering pass has run on
    /// this store.
    pub fn require_clusters(&self) -> Result<&ClusterTable, GraphError> {
        self.clusters.as_ref().ok_or(GraphError::ClusterLayerMissing)
    }

    pub(crate) fn set_clusters(&mut self, table: ClusterTable) {
        self.clusters = Some(table);
    }

    /// Edges incident to `vertex` in the undirected view: yields
    /// `(edge id, other endpoint)` for outgoing then incoming edges.
    /// Vertices interned but not yet committed have no incident edges.
    pub fn incident_edges(
        &self,
        vertex: VertexId,
    ) -> impl Iterator<Item = (usize, VertexId)> + '_ {
        let node = (vertex.index() < self.graph.node_count()).then(|| vertex.node());
        node.into_iter().flat_map(move |n| {
            self.graph
                .edges_directed(n, Direction::Outgoing)
                .map(|e| (e.id().index(), VertexId::from_node(e.target())))
                .chain(
                    self.graph
                        .edges_directed(n, Direction::Incoming)
                        .map(|e| (e.id().index(), VertexId::from_node(e.source()))),
                )
        })
    }

    /// Append edges from a batch. Every endpoint and label must be an
    /// interned id below `vertex_count`; an out-of-range id fails the whole
    /// batch before anything is appended.
    fn append(&mut self, batch: &mut EdgeBatch, vertex_count: usize) -> Result<(), GraphError> {
        for &(from, to, label) in &batch.edges {
            for v in [from, to, label] {
                if v.index() >= vertex_count {
                    return Err(GraphError::VertexOutOfRange {
                        id: v.get(),
                        vertex_count,
                    });
                }
            }
        }
        while self.graph.node_count() < vertex_count {
            self.graph.add_node(());
        }
        for &(from, to, label) in &batch.edges {
            self.graph.add_edge(from.node(), to.node(), label);
        }
        if let Some(w) = &mut self.weights {
            w.resize(self.graph.edge_count(), f64::INFINITY);
        }
        batch.edges.clear();
        Ok(())
    }

    /// Append edges during snapshot restore.
    pub(crate) fn restore_edges(
        &mut self,
        batch: &mut EdgeBatch,
        vertex_count: usize,
    ) -> Result<(), GraphError> {
        self.append(batch, vertex_count)
    }
}

/// A writer-private, bounded edge buffer.
///
/// Writers accumulate `(from, to, label)` triples here and merge them into
/// the shared store in batches: opportunistically with
/// [`GraphStore::try_commit`] while parsing, and unconditionally with
/// [`GraphStore::commit_blocking`] at end-of-input so nothing is dropped.
#[derive(Debug, Default)]
pub struct EdgeBatch {
    edges: Vec<(VertexId, VertexId, VertexId)>,
}

impl EdgeBatch {
    pub fn new() -> Self {
        Self {
            edges: Vec::with_capacity(BATCH_SIZE),
        }
    }

    /// Buffer one edge. Endpoints and label must already be interned.
    pub fn add(&mut self, from: VertexId, to: VertexId, label: VertexId) {
        self.edges.push((from, to, label));
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether the batch reached the commit threshold.
    pub fn is_full(&self) -> bool {
        self.edges.len() >= BATCH_SIZE
    }
}

/// Memory-resident knowledge graph shared by writer threads during
/// construction and reader threads during query.
pub struct GraphStore {
    uris: RwLock<UriTable>,
    topology: RwLock<Topology>,
}

impl GraphStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            uris: RwLock::new(UriTable {
                forward: FxHashMap::with_capacity_and_hasher(
                    config.reserve_vertices,
                    Default::default(),
                ),
                reverse: Vec::with_capacity(config.reserve_vertices),
            }),
            topology: RwLock::new(Topology::new(&config)),
        }
    }

    /// Intern a URI, assigning the next sequential id on first sight.
    ///
    /// Safe under concurrent calls from multiple writer threads: a lookup
    /// miss releases the read lock, takes the write lock, and re-checks
    /// before inserting, so a race between two writers cannot assign two
    /// ids to the same URI.
    pub fn intern(&self, uri: &str) -> VertexId {
        {
            let table = self.uris.read().expect("uri lock poisoned");
            if let Some(&id) = table.forward.get(uri) {
                return id;
            }
        }

        let mut table = self.uris.write().expect("uri lock poisoned");
        // Re-check: another writer may have interned it between the locks.
        if let Some(&id) = table.forward.get(uri) {
            return id;
        }
        let id = VertexId::new(table.reverse.len() as u32);
        let shared: Arc<str> = Arc::from(uri);
        table.reverse.push(Arc::clone(&shared));
        table.forward.insert(shared, id);
        id
    }

    /// Look up the id of an already interned URI.
    pub fn lookup(&self, uri: &str) -> Option<VertexId> {
        self.uris
            .read()
            .expect("uri lock poisoned")
            .forward
            .get(uri)
            .copied()
    }

    /// The URI interned under `id`.
    pub fn uri(&self, id: VertexId) -> Option<Arc<str>> {
        self.uris
            .read()
            .expect("uri lock poisoned")
            .reverse
            .get(id.index())
            .cloned()
    }

    pub fn vertex_count(&self) -> usize {
        self.uris.read().expect("uri lock poisoned").reverse.len()
    }

    pub fn edge_count(&self) -> usize {
        self.topology.read().expect("graph lock poisoned").edge_count()
    }

    /// Non-blocking commit attempt: merges the batch if the graph lock is
    /// free, otherwise leaves the batch untouched and returns `Ok(false)`
    /// so the writer can keep accumulating and retry later. A batch edge
    /// referencing an id that was never interned is an error.
    pub fn try_commit(&self, batch: &mut EdgeBatch) -> Result<bool, GraphError> {
        match self.topology.try_write() {
            Ok(mut topo) => {
                let vcount = self.vertex_count();
                topo.append(batch, vcount)?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Blocking commit: waits for the graph lock. Used for the final flush
    /// at end-of-input, where dropping buffered edges is not an option.
    pub fn commit_blocking(&self, batch: &mut EdgeBatch) -> Result<(), GraphError> {
        let mut topo = self.topology.write().expect("graph lock poisoned");
        let vcount = self.vertex_count();
        topo.append(batch, vcount)
    }

    /// Read access to the topology for queries. The guard is held for the
    /// duration of one relatedness computation.
    pub fn topology(&self) -> RwLockReadGuard<'_, Topology> {
        self.topology.read().expect("graph lock poisoned")
    }

    /// Write access for weighting/clustering passes and snapshot restore.
    pub(crate) fn topology_mut(&self) -> RwLockWriteGuard<'_, Topology> {
        self.topology.write().expect("graph lock poisoned")
    }

    /// Intern a URI under a known id during snapshot restore.
    ///
    /// Ids in the vertex stream are contiguous, so the reverse table is
    /// pre-sized by the caller and filled by id. Returns the id the URI
    /// was previously bound to, if any, so the caller can reject streams
    /// that bind one URI twice.
    pub(crate) fn restore_vertex(&self, id: VertexId, uri: &str) -> Option<VertexId> {
        let mut table = self.uris.write().expect("uri lock poisoned");
        let shared: Arc<str> = Arc::from(uri);
        table.reverse[id.index()] = Arc::clone(&shared);
        table.forward.insert(shared, id)
    }

    pub(crate) fn presize_vertices(&self, count: usize) {
        let mut table = self.uris.write().expect("uri lock poisoned");
        table.reverse.resize(count, Arc::from(""));
        table.forward.reserve(count);
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("vertices", &self.vertex_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let store = GraphStore::new(StoreConfig::default());
        assert_eq!(store.vertex_count(), 0);
        let a = store.intern("http://example.org/A");
        assert_eq!(store.vertex_count(), 1);
        let b = store.intern("http://example.org/A");
        assert_eq!(store.vertex_count(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn ids_are_dense_and_sequential() {
        let store = GraphStore::new(StoreConfig::default());
        for i in 0..100u32 {
            let id = store.intern(&format!("http://example.org/{i}"));
            assert_eq!(id.get(), i);
        }
        assert_eq!(store.vertex_count(), 100);
        // reverse[forward[u]] == u
        for i in 0..100u32 {
            let uri = format!("http://example.org/{i}");
            let id = store.lookup(&uri).unwrap();
            assert_eq!(&*store.uri(id).unwrap(), uri.as_str());
        }
    }

    #[test]
    fn concurrent_interning_assigns_one_id_per_uri() {
        let store = Arc::new(GraphStore::new(StoreConfig::default()));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..500 {
                    ids.push(store.intern(&format!("http://example.org/{}", i % 50)));
                }
                ids
            }));
        }
        let all: Vec<Vec<VertexId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(store.vertex_count(), 50);
        // Every thread saw the same id for the same URI.
        for ids in &all[1..] {
            assert_eq!(ids, &all[0]);
        }
    }

    #[test]
    fn batch_commit_keeps_arrays_in_lockstep() {
        let store = GraphStore::new(StoreConfig::default());
        let a = store.intern("a");
        let b = store.intern("b");
        let p = store.intern("p");

        let mut batch = EdgeBatch::new();
        batch.add(a, b, p);
        batch.add(b, a, p);
        store.commit_blocking(&mut batch).unwrap();
        assert!(batch.is_empty());

        let topo = store.topology();
        assert_eq!(topo.edge_count(), 2);
        assert_eq!(topo.node_count(), 3);
        assert_eq!(topo.weights().unwrap().len(), topo.edge_count());
        assert_eq!(topo.label(0), Some(p));
        assert_eq!(topo.endpoints(0), Some((a, b)));
        // Weight layer defaults to +inf until a weighting pass runs.
        assert!(topo.edge_weight(0).is_infinite());
    }

    #[test]
    fn try_commit_fails_while_lock_is_held() {
        let store = GraphStore::new(StoreConfig::default());
        let a = store.intern("a");
        let b = store.intern("b");
        let p = store.intern("p");

        let mut batch = EdgeBatch::new();
        batch.add(a, b, p);

        let guard = store.topology();
        assert!(!store.try_commit(&mut batch).unwrap());
        assert_eq!(batch.len(), 1);
        drop(guard);

        assert!(store.try_commit(&mut batch).unwrap());
        assert!(batch.is_empty());
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn committing_an_uninterned_endpoint_is_an_error() {
        let store = GraphStore::new(StoreConfig::default());
        let a = store.intern("a");
        let p = store.intern("p");

        let mut batch = EdgeBatch::new();
        batch.add(a, VertexId::new(99), p);
        let err = store.commit_blocking(&mut batch).unwrap_err();
        assert!(matches!(
            err,
            GraphError::VertexOutOfRange { id: 99, vertex_count: 2 }
        ));
        // Nothing was appended and the batch is intact for inspection.
        assert_eq!(store.edge_count(), 0);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn weight_writes_need_the_weight_layer() {
        let store = GraphStore::new(StoreConfig {
            weighted: false,
            ..Default::default()
        });
        let a = store.intern("a");
        let p = store.intern("p");
        let mut batch = EdgeBatch::new();
        batch.add(a, a, p);
        store.commit_blocking(&mut batch).unwrap();

        let mut topo = store.topology_mut();
        assert!(matches!(
            topo.set_edge_weight(0, 0.5),
            Err(GraphError::WeightLayerMissing)
        ));
    }

    #[test]
    fn require_clusters_reports_the_missing_layer() {
        let store = GraphStore::new(StoreConfig::default());
        let topo = store.topology();
        assert!(matches!(
            topo.require_clusters(),
            Err(GraphError::ClusterLayerMissing)
        ));
    }

    #[test]
    fn incident_edges_cover_both_directions() {
        let store = GraphStore::new(StoreConfig::default());
        let a = store.intern("a");
        let b = store.intern("b");
        let c = store.intern("c");
        let p = store.intern("p");

        let mut batch = EdgeBatch::new();
        batch.add(a, b, p);
        batch.add(c, b, p);
        store.commit_blocking(&mut batch).unwrap();

        let topo = store.topology();
        let mut others: Vec<VertexId> = topo.incident_edges(b).map(|(_, v)| v).collect();
        others.sort();
        assert_eq!(others, vec![a, c]);

        // An interned but uncommitted vertex has no incident edges.
        let d = store.intern("d");
        assert_eq!(topo.incident_edges(d).count(), 0);
    }

    #[test]
    fn unweighted_store_has_unit_edge_weights() {
        let store = GraphStore::new(StoreConfig {
            weighted: false,
            ..Default::default()
        });
        let a = store.intern("a");
        let b = store.intern("b");
        let p = store.intern("p");
        let mut batch = EdgeBatch::new();
        batch.add(a, b, p);
        store.commit_blocking(&mut batch).unwrap();

        let topo = store.topology();
        assert!(!topo.has_weights());
        assert_eq!(topo.edge_weight(0), 1.0);
    }
}
