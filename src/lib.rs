//! # semrel
//!
//! Semantic relatedness and word-sense disambiguation over an RDF-derived
//! knowledge graph.
//!
//! ## Architecture
//!
//! - **Graph store** (`graph`): URI-interned, concurrently built directed
//!   graph with weight and cluster layers and per-stream binary snapshots
//! - **Relatedness** (`relatedness`): three interchangeable algorithms —
//!   bounded Dijkstra, bounded DFS relaxation, hierarchical cluster lookup
//! - **Task pool** (`pool`): OS-thread fan-out of pairwise relatedness
//!   queries into a per-request dependency graph
//! - **Disambiguation** (`disambiguation`): windowed pair generation,
//!   centrality ranking, confidence write-back
//! - **Offline passes** (`ingest`, `weights`, `clustering`): RDF parsing,
//!   information-content edge weighting, hierarchical partitioning
//! - **Server** (`server`): length-prefixed JSON requests over TCP
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use semrel::graph::{GraphStore, store::StoreConfig};
//! use semrel::relatedness::{AlgorithmKind, Relatedness};
//!
//! let store = Arc::new(GraphStore::new(StoreConfig::default()));
//! let mut alg = AlgorithmKind::ShortestPath.instantiate(Arc::clone(&store), 2);
//! let score = alg.relatedness("http://ex/a", "http://ex/b");
//! assert!(score.is_infinite()); // empty store: everything is unrelated
//! ```

pub mod centrality;
pub mod clustering;
pub mod disambiguation;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod pool;
pub mod pqueue;
pub mod relatedness;
pub mod server;
pub mod weights;

pub use error::{SemrelError, SemrelResult};
