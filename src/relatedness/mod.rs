//! Relatedness algorithms over the knowledge graph.
//!
//! All algorithms satisfy one contract: `relatedness(from, to)` returns a
//! distance-like score where lower means more related, and `+∞` when either
//! URI is unknown or no relation exists within the configured bound
//! (cluster comparison caps out at `1.0` instead, see [`cluster`]).
//!
//! Instances hold private, reusable scratch state and are **not** safe for
//! concurrent use; callers needing parallelism create one instance per
//! worker (see [`crate::pool`]).

pub mod cluster;
pub mod dfs;
pub mod shortest_path;

pub use cluster::ClusterRelatedness;
pub use dfs::DfsRelatedness;
pub use shortest_path::ShortestPath;

use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::graph::GraphStore;

/// Common contract for relatedness computation.
///
/// `&mut self` because every call reuses the instance's scratch state.
pub trait Relatedness: Send {
    /// Relatedness between the two URIs; lower is more related.
    fn relatedness(&mut self, from: &str, to: &str) -> f64;
}

/// Selectable relatedness algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmKind {
    /// Bounded Dijkstra over the undirected, weighted view of the graph.
    ShortestPath,
    /// Bounded depth-first relaxation; cheaper at small hop bounds, no
    /// optimality guarantee.
    Dfs,
    /// Hierarchical cluster-membership comparison.
    Cluster,
}

impl AlgorithmKind {
    /// Create a fresh algorithm instance with its own scratch state.
    pub fn instantiate(self, store: Arc<GraphStore>, max_dist: usize) -> Box<dyn Relatedness> {
        match self {
            AlgorithmKind::ShortestPath => Box::new(ShortestPath::new(store, max_dist)),
            AlgorithmKind::Dfs => Box::new(DfsRelatedness::new(store, max_dist)),
            AlgorithmKind::Cluster => Box::new(ClusterRelatedness::new(store)),
        }
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlgorithmKind::ShortestPath => "shortest-path",
            AlgorithmKind::Dfs => "dfs",
            AlgorithmKind::Cluster => "cluster",
        };
        write!(f, "{name}")
    }
}
