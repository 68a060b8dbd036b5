//! RDF ingestion into the graph store.
//!
//! Files are memory-mapped and streamed through the rio parsers. Every
//! URI term is interned; an edge is recorded only when both subject and
//! object are named nodes (literal and blank objects contribute no edge).
//! Edges accumulate in a local batch that is committed opportunistically
//! with the non-blocking commit path and flushed with the blocking one at
//! end of file, so several ingest threads interleave without convoying on
//! the topology lock.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use rayon::prelude::*;
use rio_api::model::{Subject, Term};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesParser, TurtleError, TurtleParser};
use tracing::{debug, info, warn};

use crate::error::{GraphError, IngestError};
use crate::graph::store::EdgeBatch;
use crate::graph::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    Turtle,
    NTriples,
}

impl RdfFormat {
    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "ttl" | "turtle" => Some(RdfFormat::Turtle),
            "nt" | "ntriples" => Some(RdfFormat::NTriples),
            _ => None,
        }
    }
}

impl std::fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RdfFormat::Turtle => write!(f, "turtle"),
            RdfFormat::NTriples => write!(f, "ntriples"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Triples the parser produced.
    pub triples: u64,
    /// Triples that became graph edges.
    pub edges: u64,
    /// Triples skipped because subject or object was not a named node.
    pub skipped: u64,
}

impl IngestStats {
    fn merge(&mut self, other: IngestStats) {
        self.triples += other.triples;
        self.edges += other.edges;
        self.skipped += other.skipped;
    }
}

struct TripleSink<'a> {
    store: &'a GraphStore,
    batch: EdgeBatch,
    stats: IngestStats,
    /// First commit failure; reported once the parser is done with the file.
    failed: Option<GraphError>,
}

impl TripleSink<'_> {
    fn consume(&mut self, triple: rio_api::model::Triple<'_>) {
        self.stats.triples += 1;
        let subject = match triple.subject {
            Subject::NamedNode(n) => Some(n.iri),
            _ => None,
        };
        let object = match triple.object {
            Term::NamedNode(n) => Some(n.iri),
            _ => None,
        };
        let (Some(subject), Some(object)) = (subject, object) else {
            self.stats.skipped += 1;
            return;
        };

        let from = self.store.intern(subject);
        let to = self.store.intern(object);
        let label = self.store.intern(triple.predicate.iri);
        self.batch.add(from, to, label);
        self.stats.edges += 1;

        if self.batch.is_full() && self.failed.is_none() {
            // Opportunistic: keep batching if another thread holds the lock.
            if let Err(err) = self.store.try_commit(&mut self.batch) {
                self.failed = Some(err);
            }
        }
    }

    fn finish(mut self) -> Result<IngestStats, IngestError> {
        if let Some(err) = self.failed.take() {
            return Err(err.into());
        }
        if !self.batch.is_empty() {
            self.store.commit_blocking(&mut self.batch)?;
        }
        Ok(self.stats)
    }
}

/// Parse one RDF file into the store.
pub fn ingest_file(
    store: &GraphStore,
    path: &Path,
    format: Option<RdfFormat>,
) -> Result<IngestStats, IngestError> {
    let format = format
        .or_else(|| RdfFormat::from_path(path))
        .unwrap_or(RdfFormat::Turtle);
    debug!(path = %path.display(), %format, "ingesting RDF file");

    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    // Safety: the mapping is read-only and dropped before returning.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| IngestError::Mmap {
        path: path.display().to_string(),
        source,
    })?;

    let mut sink = TripleSink {
        store,
        batch: EdgeBatch::new(),
        stats: IngestStats::default(),
        failed: None,
    };
    let reader = Cursor::new(&mmap[..]);
    let result: Result<(), TurtleError> = match format {
        RdfFormat::Turtle => TurtleParser::new(reader, None).parse_all(&mut |t| {
            sink.consume(t);
            Ok(())
        }),
        RdfFormat::NTriples => NTriplesParser::new(reader).parse_all(&mut |t| {
            sink.consume(t);
            Ok(())
        }),
    };
    // Flush whatever parsed cleanly even when the tail of the file is bad.
    let flushed = sink.finish();
    if let Err(err) = result {
        return Err(IngestError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        });
    }
    let stats = flushed?;

    info!(
        path = %path.display(),
        triples = stats.triples,
        edges = stats.edges,
        skipped = stats.skipped,
        "ingest finished"
    );
    Ok(stats)
}

/// Parse several RDF files in parallel into one store.
///
/// Files that fail to parse are logged and skipped; the error is returned
/// only when every file failed.
pub fn ingest_files(
    store: &GraphStore,
    paths: &[PathBuf],
    format: Option<RdfFormat>,
) -> Result<IngestStats, IngestError> {
    let results: Vec<Result<IngestStats, IngestError>> = paths
        .par_iter()
        .map(|path| ingest_file(store, path, format))
        .collect();

    let mut stats = IngestStats::default();
    let mut succeeded = 0usize;
    let mut first_error = None;
    for result in results {
        match result {
            Ok(s) => {
                stats.merge(s);
                succeeded += 1;
            }
            Err(err) => {
                warn!(error = %err, "skipping RDF file");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    match first_error {
        Some(err) if succeeded == 0 && !paths.is_empty() => Err(err),
        _ => Ok(stats),
    }
}
