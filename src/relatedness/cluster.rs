//! Cluster-membership relatedness.
//!
//! Compares two vertices' positions in the hierarchical clustering layer:
//! sharing a cluster at a coarse level is worth little, sharing one at the
//! finest level is worth a lot. Scores are still distance-like (lower is
//! more related) but bounded: `1.0` for totally unrelated vertices down
//! toward `0.0` as agreement deepens. Constant time per query, no
//! traversal.

use std::sync::Arc;

use crate::graph::GraphStore;

use super::Relatedness;

pub struct ClusterRelatedness {
    store: Arc<GraphStore>,
}

impl ClusterRelatedness {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl Relatedness for ClusterRelatedness {
    fn relatedness(&mut self, from: &str, to: &str) -> f64 {
        let store = Arc::clone(&self.store);
        let (Some(from), Some(to)) = (store.lookup(from), store.lookup(to)) else {
            return 1.0;
        };
        let topo = store.topology();
        let Some(table) = topo.clusters() else {
            return 1.0;
        };

        // Walk from the finest level to the coarsest, halving the discount
        // as levels get coarser. Agreement at level L-1 (finest) contributes
        // 1/2, at L-2 contributes 1/4, and so on.
        let mut score = 1.0;
        let mut denom = 2.0;
        for level in (0..table.levels()).rev() {
            if let (Some(a), Some(b)) = (table.label(from, level), table.label(to, level)) {
                if a == b {
                    score -= 1.0 / denom;
                }
            }
            denom *= 2.0;
        }
        score
    }
}
