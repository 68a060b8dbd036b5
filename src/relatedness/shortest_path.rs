//! Bounded shortest-path relatedness (Dijkstra).
//!
//! Runs Dijkstra over the *undirected* view of the directed graph, restricted
//! to paths of at most `max_dist` edges. Before the relaxation loop, a
//! bounded breadth expansion from the source pre-populates the priority
//! queue with only the vertices reachable within the hop bound — the queue
//! is sized by the local neighborhood, not the whole graph.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::graph::{GraphStore, VertexId};
use crate::pqueue::IndexedMinQueue;

use super::Relatedness;

/// Shortest-path relatedness with per-instance scratch state.
///
/// The distance/hop arrays and the queue are reused across queries on one
/// thread; entries touched by the previous query are reset lazily at the
/// start of the next one.
pub struct ShortestPath {
    store: Arc<GraphStore>,
    max_dist: usize,
    /// Tentative distance per vertex; doubles as the queue's weight array.
    dist: Vec<f64>,
    /// Hop count of the tentative shortest path per vertex.
    hops: Vec<u32>,
    /// Breadth-expansion visit marker; a vertex is collected when
    /// `mark[v] == epoch`.
    mark: Vec<u64>,
    epoch: u64,
    queue: IndexedMinQueue,
    /// Vertices whose dist/hops entries need resetting before the next query.
    touched: Vec<u32>,
}

impl ShortestPath {
    pub fn new(store: Arc<GraphStore>, max_dist: usize) -> Self {
        let n = store.vertex_count();
        Self {
            store,
            max_dist,
            dist: vec![f64::INFINITY; n],
            hops: vec![u32::MAX; n],
            mark: vec![0; n],
            epoch: 0,
            queue: IndexedMinQueue::with_positions(n),
            touched: Vec::new(),
        }
    }

    fn reset(&mut self, vertex_count: usize) {
        for &v in &self.touched {
            self.dist[v as usize] = f64::INFINITY;
            self.hops[v as usize] = u32::MAX;
        }
        self.touched.clear();
        self.queue.clear();
        if self.dist.len() < vertex_count {
            self.dist.resize(vertex_count, f64::INFINITY);
            self.hops.resize(vertex_count, u32::MAX);
            self.mark.resize(vertex_count, 0);
            self.queue.ensure_key_capacity(vertex_count);
        }
        self.epoch += 1;
    }
}

impl Relatedness for ShortestPath {
    fn relatedness(&mut self, from: &str, to: &str) -> f64 {
        let store = Arc::clone(&self.store);
        let (Some(from), Some(to)) = (store.lookup(from), store.lookup(to)) else {
            return f64::INFINITY;
        };
        let topo = store.topology();
        self.reset(store.vertex_count());

        let source = from.get();
        let target = to.get();
        self.dist[source as usize] = 0.0;
        self.hops[source as usize] = 0;
        self.touched.push(source);

        // Breadth expansion: enqueue exactly the vertices within max_dist
        // hops of the source.
        self.mark[source as usize] = self.epoch;
        self.queue.insert(source, &self.dist);
        let mut frontier: VecDeque<(u32, usize)> = VecDeque::new();
        frontier.push_back((source, 0));
        while let Some((u, depth)) = frontier.pop_front() {
            if depth >= self.max_dist {
                continue;
            }
            for (_eid, v) in topo.incident_edges(VertexId::new(u)) {
                let v = v.get();
                if self.mark[v as usize] != self.epoch {
                    self.mark[v as usize] = self.epoch;
                    self.touched.push(v);
                    self.queue.insert(v, &self.dist);
                    frontier.push_back((v, depth + 1));
                }
            }
        }

        while let Some(u) = self.queue.pop_min(&self.dist) {
            if u == target {
                break;
            }
            let hops_u = self.hops[u as usize];
            if hops_u as u64 > self.max_dist as u64 {
                break;
            }
            for (eid, v) in topo.incident_edges(VertexId::new(u)) {
                let v = v.get();
                let alt = self.dist[u as usize] + topo.edge_weight(eid);
                if alt < self.dist[v as usize] && (hops_u as usize) + 1 <= self.max_dist {
                    self.dist[v as usize] = alt;
                    self.hops[v as usize] = hops_u + 1;
                    self.touched.push(v);
                    self.queue.decrease_key(v, &self.dist);
                }
            }
        }

        self.dist[target as usize]
    }
}
