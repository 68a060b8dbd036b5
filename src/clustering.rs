//! Hierarchical graph clustering for the cluster relatedness variant.
//!
//! Each level partitions the vertex set into twice as many parts as the
//! level before it: level 0 is the coarsest split (2 parts), level `L-1`
//! the finest (`2^L` parts). The partitioning backend is pluggable; the
//! built-in [`RecursiveBisection`] grows regions breadth-first and needs
//! no external solver.

use tracing::info;

use crate::graph::store::ClusterTable;
use crate::graph::{GraphStore, VertexId};

/// Labels are stored as `u8`, so the finest level caps at 256 parts.
pub const MAX_LEVELS: usize = 8;

/// Splits an undirected weighted adjacency into `parts` groups.
///
/// Edge weights are similarities (higher means the endpoints belong
/// together). Returns one group id per vertex, each `< parts`.
pub trait Partitioner {
    fn partition(&self, adjacency: &[Vec<(u32, f64)>], parts: u32) -> Vec<u32>;
}

/// Breadth-first recursive bisection.
///
/// Every round splits each current group in two by growing a region from
/// the group's first vertex until half the group is claimed; whatever the
/// growth did not reach lands on the far side. Rounds repeat until the
/// requested part count is reached or no group can split further.
pub struct RecursiveBisection;

impl RecursiveBisection {
    fn bisect(adjacency: &[Vec<(u32, f64)>], group: &[u32]) -> (Vec<u32>, Vec<u32>) {
        if group.len() < 2 {
            return (group.to_vec(), Vec::new());
        }
        let target = group.len() / 2;
        let member: rustc_hash::FxHashSet<u32> = group.iter().copied().collect();
        let mut near = Vec::with_capacity(target);
        let mut claimed = rustc_hash::FxHashSet::default();
        let mut frontier = std::collections::VecDeque::new();

        // Seed from well-connected vertices first so regions grow along
        // the structure instead of starting on isolated vertices; extra
        // seeds keep disconnected pieces filling the near side.
        let mut seed_order: Vec<u32> = group.to_vec();
        seed_order.sort_by_key(|&v| std::cmp::Reverse(adjacency[v as usize].len()));
        let mut seeds = seed_order.into_iter();
        while near.len() < target {
            let Some(seed) = seeds.find(|s| !claimed.contains(s)) else { break };
            claimed.insert(seed);
            frontier.push_back(seed);
            while let Some(u) = frontier.pop_front() {
                near.push(u);
                if near.len() >= target {
                    break;
                }
                for &(v, _) in &adjacency[u as usize] {
                    if member.contains(&v) && claimed.insert(v) {
                        frontier.push_back(v);
                    }
                }
            }
            frontier.clear();
        }

        let near_set: rustc_hash::FxHashSet<u32> = near.iter().copied().collect();
        let far: Vec<u32> = group.iter().copied().filter(|v| !near_set.contains(v)).collect();
        (near, far)
    }
}

impl Partitioner for RecursiveBisection {
    fn partition(&self, adjacency: &[Vec<(u32, f64)>], parts: u32) -> Vec<u32> {
        let n = adjacency.len();
        let mut groups: Vec<Vec<u32>> = vec![(0..n as u32).collect()];
        while (groups.len() as u32) < parts {
            let before = groups.len();
            groups = groups
                .into_iter()
                .flat_map(|g| {
                    let (a, b) = Self::bisect(adjacency, &g);
                    [a, b].into_iter().filter(|side| !side.is_empty())
                })
                .collect();
            if groups.len() == before {
                break;
            }
        }
        let mut assign = vec![0u32; n];
        for (label, group) in groups.iter().enumerate() {
            for &v in group {
                assign[v as usize] = label as u32;
            }
        }
        assign
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterStats {
    pub levels: usize,
    pub vertices: usize,
}

/// Compute `levels` nested partitions and install them as the store's
/// cluster layer.
///
/// The adjacency is snapshotted under the read lock with edge weights
/// inverted into similarities; the finished table is swapped in under the
/// write lock in one step.
pub fn compute_clusters(
    store: &GraphStore,
    partitioner: &dyn Partitioner,
    levels: usize,
) -> ClusterStats {
    let levels = levels.min(MAX_LEVELS);
    let vcount = store.vertex_count();
    info!(vertices = vcount, levels, "computing hierarchical clusters");

    let adjacency = {
        let topo = store.topology();
        let mut adj: Vec<Vec<(u32, f64)>> = vec![Vec::new(); vcount];
        for eid in 0..topo.edge_count() {
            let Some((from, to)) = topo.endpoints(eid) else { continue };
            let w = topo.edge_weight(eid);
            let similarity = if w.is_finite() && w > 0.0 { 1.0 / w } else { 1.0 };
            adj[from.index()].push((to.get(), similarity));
            adj[to.index()].push((from.get(), similarity));
        }
        adj
    };

    let mut table = ClusterTable::new(levels, vcount);
    let mut parts = 2u32;
    for level in 0..levels {
        info!(level, parts, "partitioning");
        let assign = partitioner.partition(&adjacency, parts);
        for (v, &label) in assign.iter().enumerate() {
            table.set_label(VertexId::new(v as u32), level, label as u8);
        }
        parts <<= 1;
    }

    store.topology_mut().set_clusters(table);
    ClusterStats { levels, vertices: vcount }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::{EdgeBatch, StoreConfig};
    use crate::relatedness::{ClusterRelatedness, Relatedness};
    use std::sync::Arc;

    /// Two triangles with no edge between them.
    fn two_triangles() -> GraphStore {
        let store = GraphStore::new(StoreConfig::default());
        let pred = store.intern("p");
        let a: Vec<_> = ["a0", "a1", "a2"].iter().map(|u| store.intern(u)).collect();
        let b: Vec<_> = ["b0", "b1", "b2"].iter().map(|u| store.intern(u)).collect();
        let mut batch = EdgeBatch::new();
        for tri in [&a, &b] {
            batch.add(tri[0], tri[1], pred);
            batch.add(tri[1], tri[2], pred);
            batch.add(tri[2], tri[0], pred);
        }
        store.commit_blocking(&mut batch).unwrap();
        store
    }

    #[test]
    fn bisection_separates_disconnected_components() {
        let store = two_triangles();
        compute_clusters(&store, &RecursiveBisection, 1);
        let topo = store.topology();
        let table = topo.clusters().expect("cluster layer installed");
        assert_eq!(table.levels(), 1);

        let label = |uri: &str| {
            let v = store.lookup(uri).unwrap();
            table.label(v, 0).unwrap()
        };
        assert_eq!(label("a0"), label("a1"));
        assert_eq!(label("a1"), label("a2"));
        assert_eq!(label("b0"), label("b1"));
        assert_ne!(label("a0"), label("b0"));
    }

    #[test]
    fn cluster_relatedness_prefers_same_component() {
        let store = two_triangles();
        compute_clusters(&store, &RecursiveBisection, 2);
        let mut alg = ClusterRelatedness::new(Arc::new(store));
        let same = alg.relatedness("a0", "a1");
        let cross = alg.relatedness("a0", "b0");
        assert!(same < cross, "{same} vs {cross}");
    }

    #[test]
    fn levels_are_capped_by_label_width() {
        let store = two_triangles();
        let stats = compute_clusters(&store, &RecursiveBisection, 32);
        assert_eq!(stats.levels, MAX_LEVELS);
    }

    #[test]
    fn partition_labels_stay_in_range() {
        let store = two_triangles();
        let adjacency = {
            let topo = store.topology();
            let mut adj: Vec<Vec<(u32, f64)>> = vec![Vec::new(); store.vertex_count()];
            for eid in 0..topo.edge_count() {
                let (from, to) = topo.endpoints(eid).unwrap();
                adj[from.index()].push((to.get(), 1.0));
                adj[to.index()].push((from.get(), 1.0));
            }
            adj
        };
        for parts in [2u32, 4, 8] {
            let assign = RecursiveBisection.partition(&adjacency, parts);
            assert_eq!(assign.len(), store.vertex_count());
            assert!(assign.iter().all(|&l| l < parts));
        }
    }
}
