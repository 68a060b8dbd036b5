//! Rich diagnostic error types for the semrel engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::graph::snapshot::Stream;

/// Top-level error type for the semrel engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SemrelError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Disambiguation(#[from] DisambiguationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Server(#[from] ServerError),
}

// ---------------------------------------------------------------------------
// Graph store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("edge references vertex {id} but the store only has {vertex_count} vertices")]
    #[diagnostic(
        code(semrel::graph::vertex_out_of_range),
        help(
            "Every edge endpoint and label must be interned before the edge is \
             committed. This usually indicates a corrupt snapshot or a bug in \
             the ingest pipeline."
        )
    )]
    VertexOutOfRange { id: u32, vertex_count: usize },

    #[error("the weight layer is not enabled on this store")]
    #[diagnostic(
        code(semrel::graph::no_weight_layer),
        help(
            "Create the store with `StoreConfig {{ weighted: true, .. }}` or \
             restore a snapshot that contains a weight stream."
        )
    )]
    WeightLayerMissing,

    #[error("the cluster layer is not present on this store")]
    #[diagnostic(
        code(semrel::graph::no_cluster_layer),
        help(
            "Run a clustering pass (`clustering::compute_clusters`) or restore \
             a snapshot that contains a cluster stream before using the \
             cluster relatedness algorithm."
        )
    )]
    ClusterLayerMissing,
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("I/O error on {stream} stream: {source}")]
    #[diagnostic(
        code(semrel::snapshot::io),
        help(
            "A filesystem operation on a snapshot stream failed. Check that the \
             target directory exists, has correct permissions, and that the \
             disk is not full."
        )
    )]
    Io {
        stream: Stream,
        #[source]
        source: std::io::Error,
    },

    #[error("{stream} stream is truncated at byte offset {offset}")]
    #[diagnostic(
        code(semrel::snapshot::truncated),
        help(
            "The stream ended in the middle of a record. The snapshot is \
             corrupt and cannot be restored; re-create it from the original \
             RDF sources."
        )
    )]
    Truncated { stream: Stream, offset: u64 },

    #[error("{stream} stream is invalid at byte offset {offset}: {message}")]
    #[diagnostic(
        code(semrel::snapshot::invalid),
        help(
            "The stream decoded successfully but violates a store invariant \
             (for example an edge endpoint outside the vertex range). The \
             snapshot is corrupt; re-create it from the original RDF sources."
        )
    )]
    Invalid {
        stream: Stream,
        offset: u64,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Ingest errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error("cannot open RDF file {path}: {source}")]
    #[diagnostic(
        code(semrel::ingest::open),
        help("Check that the file exists and is readable.")
    )]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot memory-map RDF file {path}: {source}")]
    #[diagnostic(
        code(semrel::ingest::mmap),
        help("Check available virtual memory and that the file is a regular file.")
    )]
    Mmap {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    #[diagnostic(
        code(semrel::ingest::parse),
        help(
            "The RDF parser rejected the input. Verify the file matches the \
             format passed on the command line (turtle vs. ntriples)."
        )
    )]
    Parse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Task pool errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PoolError {
    #[error("cannot {operation} while the pool is running")]
    #[diagnostic(
        code(semrel::pool::busy),
        help(
            "Tasks can only be added and the pool reconfigured between runs. \
             Call `join()` first to wait for the current batch to finish."
        )
    )]
    Busy { operation: &'static str },
}

// ---------------------------------------------------------------------------
// Disambiguation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DisambiguationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pool(#[from] PoolError),
}

// ---------------------------------------------------------------------------
// Server errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ServerError {
    #[error("cannot bind to {addr}: {source}")]
    #[diagnostic(
        code(semrel::server::bind),
        help("Check that the port is free and that you have permission to bind it.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection I/O error: {source}")]
    #[diagnostic(code(semrel::server::io))]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("request frame of {len} bytes exceeds the {max} byte limit")]
    #[diagnostic(
        code(semrel::server::frame_too_large),
        help(
            "Requests are framed as a big-endian u32 length prefix followed by \
             a JSON body. A length this large usually means the client did not \
             write the prefix."
        )
    )]
    FrameTooLarge { len: usize, max: usize },

    #[error("cannot decode request: {source}")]
    #[diagnostic(
        code(semrel::server::decode),
        help("The request body must be a JSON-encoded disambiguation request.")
    )]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience alias for functions returning semrel results.
pub type SemrelResult<T> = std::result::Result<T, SemrelError>;
