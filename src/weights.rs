//! Combined information-content edge weighting.
//!
//! Rates every edge by how informative its predicate and its object are:
//! rare predicates and rare objects carry more information, so edges using
//! them should read as "closer" to the relatedness algorithms. For an edge
//! with predicate `p` and object `o`,
//!
//! ```text
//! ic(x) = -ln(count(x) / edge_count)
//! weight = 1 / (ic(p) + ic(o))
//! ```
//!
//! Edges whose predicate or object never occurs in the counting pass keep
//! the default weight of `1.0`.

use tracing::info;

use crate::error::GraphError;
use crate::graph::GraphStore;

/// Outcome of a weighting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightStats {
    pub edges: usize,
    /// Edges that received a computed weight (the rest stay at `1.0`).
    pub weighted: usize,
}

/// Recompute the weight layer of `store` from predicate and object
/// occurrence statistics.
///
/// Counting runs under the read lock; the layer swap takes the write lock
/// once at the end, so concurrent queries see either the old weights or
/// the new ones, never a half-written layer.
pub fn compute_combi_weights(store: &GraphStore) -> Result<WeightStats, GraphError> {
    let vcount = store.vertex_count();

    let (ecount, weights) = {
        let topo = store.topology();
        let ecount = topo.edge_count();
        info!(vertices = vcount, edges = ecount, "computing combined edge weights");

        let mut pred_count = vec![0u64; vcount];
        let mut obj_count = vec![0u64; vcount];
        for eid in 0..ecount {
            let Some((_, to)) = topo.endpoints(eid) else { continue };
            let Some(pred) = topo.label(eid) else { continue };
            obj_count[to.index()] += 1;
            pred_count[pred.index()] += 1;
        }

        let ic = |count: u64| {
            if count > 0 {
                Some(-((count as f64 / ecount as f64).ln()))
            } else {
                None
            }
        };
        let ic_pred: Vec<Option<f64>> = pred_count.iter().map(|&c| ic(c)).collect();
        let ic_obj: Vec<Option<f64>> = obj_count.iter().map(|&c| ic(c)).collect();

        let weights: Vec<f64> = (0..ecount)
            .map(|eid| {
                let pair = topo.endpoints(eid).zip(topo.label(eid));
                match pair {
                    Some(((_, to), pred)) => {
                        match (ic_pred[pred.index()], ic_obj[to.index()]) {
                            (Some(p), Some(o)) => 1.0 / (p + o),
                            _ => 1.0,
                        }
                    }
                    None => 1.0,
                }
            })
            .collect();
        (ecount, weights)
    };

    let weighted = weights.iter().filter(|&&w| w != 1.0).count();
    let mut topo = store.topology_mut();
    topo.ensure_weight_layer();
    for (eid, w) in weights.into_iter().enumerate() {
        topo.set_edge_weight(eid, w)?;
    }
    drop(topo);

    info!(edges = ecount, weighted, "edge weighting finished");
    Ok(WeightStats { edges: ecount, weighted })
}
