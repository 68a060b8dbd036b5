//! Word-sense disambiguation pipeline.
//!
//! A request carries an ordered list of terms, each with candidate entity
//! URIs. The pipeline flattens all candidates into a contiguous id space,
//! queries pairwise relatedness between candidates of nearby terms
//! (windowed by `max_dist`), ranks the resulting dependency graph with a
//! centrality measure, normalizes the scores into `[0, 1]`, and writes one
//! confidence per candidate back onto the request. Higher confidence means
//! the candidate is the more plausible sense.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::centrality::{self, CentralityKind};
use crate::error::DisambiguationError;
use crate::pool::RelatednessPool;
use crate::relatedness::AlgorithmKind;

/// One candidate sense for a term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub uri: String,
    /// Set by the pipeline; stays empty for candidates whose URI is not in
    /// the graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Candidate {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            confidence: None,
        }
    }
}

/// One surface-form term with its candidate senses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    pub candidates: Vec<Candidate>,
}

/// A disambiguation request. Unset tuning fields fall back to the
/// server-side [`PipelineConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationRequest {
    pub terms: Vec<Term>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dist: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relatedness: Option<AlgorithmKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centrality: Option<CentralityKind>,
}

/// Pipeline defaults, applied where a request leaves a knob unset.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Term window and relatedness hop bound.
    pub max_dist: usize,
    pub relatedness: AlgorithmKind,
    pub centrality: CentralityKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dist: 2,
            relatedness: AlgorithmKind::ShortestPath,
            centrality: CentralityKind::Degree,
        }
    }
}

/// Run the pipeline, writing confidences back into `request`.
pub fn disambiguate(
    pool: &mut RelatednessPool,
    config: &PipelineConfig,
    request: &mut DisambiguationRequest,
) -> Result<(), DisambiguationError> {
    let max_dist = request.max_dist.unwrap_or(config.max_dist);
    let relatedness = request.relatedness.unwrap_or(config.relatedness);
    let centrality_kind = request.centrality.unwrap_or(config.centrality);

    // Flatten candidates into a contiguous dependency-graph id space;
    // terms without candidates contribute no vertices.
    let mut offsets = Vec::with_capacity(request.terms.len());
    let mut total = 0usize;
    for term in &request.terms {
        offsets.push(total);
        total += term.candidates.len();
    }

    info!(
        terms = request.terms.len(),
        candidates = total,
        max_dist,
        %relatedness,
        centrality = %centrality_kind,
        "disambiguating"
    );

    let store = std::sync::Arc::clone(pool.store());

    // Centrality is undefined on fewer than two vertices; a lone known
    // candidate is trivially the right sense.
    if total < 2 {
        for term in &mut request.terms {
            for candidate in &mut term.candidates {
                if store.lookup(&candidate.uri).is_some() {
                    candidate.confidence = Some(1.0);
                }
            }
        }
        return Ok(());
    }

    pool.set_algorithm(relatedness, max_dist)?;
    pool.reset(total)?;

    // Pair every candidate of term i with every candidate of the next
    // max_dist terms.
    for i in 0..request.terms.len() {
        let window_end = request.terms.len().min(i.saturating_add(max_dist).saturating_add(1));
        for j in (i + 1)..window_end {
            for (t, from) in request.terms[i].candidates.iter().enumerate() {
                for (s, to) in request.terms[j].candidates.iter().enumerate() {
                    pool.add_task(
                        &from.uri,
                        &to.uri,
                        (offsets[i] + t) as u32,
                        (offsets[j] + s) as u32,
                    )?;
                }
            }
        }
    }

    let tasks = pool.task_count();
    pool.run()?;

    let scores = {
        let result = pool.result();
        debug!(tasks, edges = result.edge_count(), "dependency graph built");
        centrality::scores(&result, centrality_kind)
    };

    // Normalize into [0, 1]; a flat score vector means every candidate is
    // equally plausible.
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let normalize = |s: f64| if max > min { (s - min) / (max - min) } else { 1.0 };

    for (i, term) in request.terms.iter_mut().enumerate() {
        for (t, candidate) in term.candidates.iter_mut().enumerate() {
            if store.lookup(&candidate.uri).is_none() {
                continue;
            }
            candidate.confidence = Some(normalize(scores[offsets[i] + t]));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::{EdgeBatch, StoreConfig};
    use crate::graph::GraphStore;
    use std::sync::Arc;

    fn store_with_edges(edges: &[(&str, &str, f64)]) -> Arc<GraphStore> {
        let store = GraphStore::new(StoreConfig::default());
        let pred = store.intern("p");
        let mut batch = EdgeBatch::new();
        for &(from, to, _) in edges {
            batch.add(store.intern(from), store.intern(to), pred);
        }
        store.commit_blocking(&mut batch).unwrap();
        let mut topo = store.topology_mut();
        for (eid, &(_, _, w)) in edges.iter().enumerate() {
            topo.set_edge_weight(eid, w).unwrap();
        }
        drop(topo);
        Arc::new(store)
    }

    fn request(terms: &[(&str, &[&str])]) -> DisambiguationRequest {
        DisambiguationRequest {
            terms: terms
                .iter()
                .map(|(term, candidates)| Term {
                    term: term.to_string(),
                    candidates: candidates.iter().copied().map(Candidate::new).collect(),
                })
                .collect(),
            max_dist: None,
            relatedness: None,
            centrality: None,
        }
    }

    #[test]
    fn two_single_candidate_terms_both_get_full_confidence() {
        let store = store_with_edges(&[("X", "Y", 1.0)]);
        let mut pool = RelatednessPool::new(store, 2, AlgorithmKind::ShortestPath, 1);
        let mut req = request(&[("x", &["X"]), ("y", &["Y"])]);
        req.max_dist = Some(1);
        disambiguate(&mut pool, &PipelineConfig::default(), &mut req).unwrap();

        assert_eq!(pool.result().edge_count(), 1);
        assert_eq!(req.terms[0].candidates[0].confidence, Some(1.0));
        assert_eq!(req.terms[1].candidates[0].confidence, Some(1.0));
    }

    #[test]
    fn lone_known_candidate_is_trivially_confident() {
        let store = store_with_edges(&[("X", "Y", 1.0)]);
        let mut pool = RelatednessPool::new(store, 1, AlgorithmKind::ShortestPath, 1);
        let mut req = request(&[("x", &["X"])]);
        disambiguate(&mut pool, &PipelineConfig::default(), &mut req).unwrap();
        assert_eq!(req.terms[0].candidates[0].confidence, Some(1.0));
    }

    #[test]
    fn unknown_candidates_get_no_confidence() {
        let store = store_with_edges(&[("X", "Y", 1.0)]);
        let mut pool = RelatednessPool::new(store, 1, AlgorithmKind::ShortestPath, 1);
        let mut req = request(&[("x", &["X", "http://nowhere/"]), ("y", &["Y"])]);
        req.max_dist = Some(1);
        disambiguate(&mut pool, &PipelineConfig::default(), &mut req).unwrap();

        assert!(req.terms[0].candidates[0].confidence.is_some());
        assert_eq!(req.terms[0].candidates[1].confidence, None);
        assert!(req.terms[1].candidates[0].confidence.is_some());
    }

    #[test]
    fn more_central_candidate_ranks_higher() {
        // Both senses of "x" connect to Y, but X1 over a heavier edge;
        // under weighted degree, X1 ends up more central than X2.
        let store = store_with_edges(&[("X1", "Y", 5.0), ("X2", "Y", 1.0)]);
        let mut pool = RelatednessPool::new(store, 2, AlgorithmKind::ShortestPath, 1);
        let mut req = request(&[("x", &["X1", "X2"]), ("y", &["Y"])]);
        req.max_dist = Some(1);
        disambiguate(&mut pool, &PipelineConfig::default(), &mut req).unwrap();

        let x1 = req.terms[0].candidates[0].confidence.unwrap();
        let x2 = req.terms[0].candidates[1].confidence.unwrap();
        let y = req.terms[1].candidates[0].confidence.unwrap();
        assert!(x1 > x2, "{x1} vs {x2}");
        assert_eq!(y, 1.0);
        assert_eq!(x2, 0.0);
    }

    #[test]
    fn empty_candidate_lists_are_skipped_without_error() {
        let store = store_with_edges(&[("X", "Y", 1.0)]);
        let mut pool = RelatednessPool::new(store, 1, AlgorithmKind::ShortestPath, 1);
        let mut req = request(&[("gap", &[]), ("x", &["X"]), ("y", &["Y"])]);
        req.max_dist = Some(1);
        disambiguate(&mut pool, &PipelineConfig::default(), &mut req).unwrap();

        assert!(req.terms[0].candidates.is_empty());
        assert_eq!(req.terms[1].candidates[0].confidence, Some(1.0));
        assert_eq!(req.terms[2].candidates[0].confidence, Some(1.0));
    }

    #[test]
    fn window_limits_which_terms_are_paired() {
        let store = store_with_edges(&[("A", "B", 1.0), ("B", "C", 1.0)]);
        let mut pool = RelatednessPool::new(store, 2, AlgorithmKind::ShortestPath, 1);
        let mut req = request(&[("a", &["A"]), ("b", &["B"]), ("c", &["C"])]);
        req.max_dist = Some(1);
        disambiguate(&mut pool, &PipelineConfig::default(), &mut req).unwrap();

        // Pairs (a,b) and (b,c) only; (a,c) is outside the window.
        assert_eq!(pool.result().edge_count(), 2);
    }

    #[test]
    fn request_roundtrips_through_json() {
        let mut req = request(&[("x", &["X"])]);
        req.relatedness = Some(AlgorithmKind::Dfs);
        req.centrality = Some(CentralityKind::Pagerank);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"dfs\""));
        assert!(json.contains("\"pagerank\""));
        let back: DisambiguationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.terms.len(), 1);
        assert_eq!(back.relatedness, Some(AlgorithmKind::Dfs));
    }
}
