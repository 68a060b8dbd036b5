//! End-to-end tests for the semrel pipeline.
//!
//! These exercise the full path from RDF text through ingestion, edge
//! weighting, clustering, snapshot persistence, and disambiguation,
//! validating that the store, the offline passes, and the query side all
//! agree on the data.

use std::sync::Arc;

use semrel::clustering::{self, RecursiveBisection};
use semrel::disambiguation::{self, Candidate, DisambiguationRequest, Term};
use semrel::graph::snapshot;
use semrel::graph::store::StoreConfig;
use semrel::graph::GraphStore;
use semrel::ingest;
use semrel::pool::RelatednessPool;
use semrel::relatedness::AlgorithmKind;
use semrel::weights;

/// A small corpus with two disconnected topic clusters (astronomy and
/// music) that share predicate vocabulary but no entities.
const CORPUS: &str = "\
<http://ex/sun> <http://ex/isA> <http://ex/star> .
<http://ex/moon> <http://ex/orbits> <http://ex/sun> .
<http://ex/earth> <http://ex/orbits> <http://ex/sun> .
<http://ex/star> <http://ex/subject> <http://ex/astronomy> .
<http://ex/guitar> <http://ex/isA> <http://ex/instrument> .
<http://ex/piano> <http://ex/isA> <http://ex/instrument> .
<http://ex/instrument> <http://ex/subject> <http://ex/music> .
<http://ex/sun> <http://ex/label> \"the sun\" .
";

fn build_store() -> GraphStore {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corpus.nt");
    std::fs::write(&path, CORPUS).unwrap();

    let store = GraphStore::new(StoreConfig::default());
    let stats = ingest::ingest_file(&store, &path, None).unwrap();
    assert_eq!(stats.triples, 8);
    assert_eq!(stats.edges, 7);
    assert_eq!(stats.skipped, 1); // the literal label
    store
}

#[test]
fn ingest_weight_query() {
    let store = build_store();
    weights::compute_combi_weights(&store).unwrap();

    let store = Arc::new(store);
    let mut alg = AlgorithmKind::ShortestPath.instantiate(Arc::clone(&store), 2);

    // moon and earth are two hops apart through sun.
    let related = alg.relatedness("http://ex/moon", "http://ex/earth");
    assert!(related.is_finite());

    // guitar and moon share nothing within two hops.
    let unrelated = alg.relatedness("http://ex/guitar", "http://ex/moon");
    assert!(unrelated.is_infinite());
}

#[test]
fn snapshot_survives_a_full_build() {
    let store = build_store();
    weights::compute_combi_weights(&store).unwrap();
    clustering::compute_clusters(&store, &RecursiveBisection, 2);

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("graph");
    snapshot::dump(&store, &prefix).unwrap();
    let restored = snapshot::restore(&prefix).unwrap();

    assert_eq!(restored.vertex_count(), store.vertex_count());
    assert_eq!(restored.edge_count(), store.edge_count());
    {
        let topo = restored.topology();
        assert!(topo.has_weights());
        assert_eq!(topo.clusters().map(|t| t.levels()), Some(2));
    }

    // Queries against the restored store agree with the original.
    let original = Arc::new(store);
    let restored = Arc::new(restored);
    for (from, to) in [
        ("http://ex/moon", "http://ex/earth"),
        ("http://ex/guitar", "http://ex/piano"),
        ("http://ex/guitar", "http://ex/moon"),
    ] {
        let mut a = AlgorithmKind::ShortestPath.instantiate(Arc::clone(&original), 2);
        let mut b = AlgorithmKind::ShortestPath.instantiate(Arc::clone(&restored), 2);
        let (x, y) = (a.relatedness(from, to), b.relatedness(from, to));
        assert!(x == y || (x.is_infinite() && y.is_infinite()), "{from} -> {to}: {x} vs {y}");
    }
}

#[test]
fn disambiguation_prefers_the_topical_sense() {
    let store = build_store();
    weights::compute_combi_weights(&store).unwrap();
    let store = Arc::new(store);

    // "sun" in a musical context is still a star here; the astronomy
    // candidate should win because its neighborhood links to the other
    // terms while the music candidate has no path to them.
    let mut request = DisambiguationRequest {
        terms: vec![
            Term {
                term: "moon".to_string(),
                candidates: vec![Candidate::new("http://ex/moon")],
            },
            Term {
                term: "sun".to_string(),
                candidates: vec![
                    Candidate::new("http://ex/sun"),
                    Candidate::new("http://ex/guitar"),
                ],
            },
            Term {
                term: "earth".to_string(),
                candidates: vec![Candidate::new("http://ex/earth")],
            },
        ],
        max_dist: Some(2),
        relatedness: None,
        centrality: None,
    };

    let mut pool = RelatednessPool::new(store, 4, AlgorithmKind::ShortestPath, 2);
    let config = disambiguation::PipelineConfig::default();
    disambiguation::disambiguate(&mut pool, &config, &mut request).unwrap();

    let sun = request.terms[1].candidates[0].confidence.unwrap();
    let guitar = request.terms[1].candidates[1].confidence.unwrap();
    assert!(sun > guitar, "sun {sun} vs guitar {guitar}");
}

#[test]
fn cluster_relatedness_tracks_the_partition() {
    let store = build_store();
    clustering::compute_clusters(&store, &RecursiveBisection, 2);
    let store = Arc::new(store);

    let mut alg = AlgorithmKind::Cluster.instantiate(Arc::clone(&store), 0);
    let within = alg.relatedness("http://ex/guitar", "http://ex/piano");
    let across = alg.relatedness("http://ex/guitar", "http://ex/moon");
    assert!(within <= across, "{within} vs {across}");
    assert!(across <= 1.0);
}
