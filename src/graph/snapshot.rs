//! Versioned flat binary persistence for the graph store.
//!
//! A snapshot is a set of per-stream files sharing a common path prefix:
//!
//! | stream   | file       | contents                                        |
//! |----------|------------|-------------------------------------------------|
//! | vertices | `<p>.vtx`  | u32 count, then (u32 id, u32 len, uri bytes)*   |
//! | edges    | `<p>.edg`  | u32 count, then (u32 from, u32 to)*             |
//! | labels   | `<p>.lbl`  | u32 count, then u32 label id per edge           |
//! | weights  | `<p>.wgt`  | u32 count, then f64 per edge                    |
//! | clusters | `<p>.cls`  | u32 level count, then per-vertex level bytes    |
//!
//! All integers and floats are big-endian. Edge-order streams are written in
//! edge-insertion order. The weight and cluster files are only written when
//! the corresponding layer is present, and a missing file on restore leaves
//! that layer empty. A truncated or inconsistent stream is a fatal restore
//! error reporting the stream identity and byte offset.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{SemrelResult, SnapshotError};

use super::store::{ClusterTable, GraphStore, StoreConfig};
use super::VertexId;

/// Identity of one snapshot stream, used in error reports and file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Vertices,
    Edges,
    Labels,
    Weights,
    Clusters,
}

impl Stream {
    fn extension(self) -> &'static str {
        match self {
            Stream::Vertices => "vtx",
            Stream::Edges => "edg",
            Stream::Labels => "lbl",
            Stream::Weights => "wgt",
            Stream::Clusters => "cls",
        }
    }

    fn path(self, prefix: &Path) -> PathBuf {
        PathBuf::from(format!("{}.{}", prefix.display(), self.extension()))
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stream::Vertices => "vertex",
            Stream::Edges => "edge",
            Stream::Labels => "label",
            Stream::Weights => "weight",
            Stream::Clusters => "cluster",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

struct StreamWriter {
    stream: Stream,
    inner: BufWriter<File>,
}

impl StreamWriter {
    fn create(prefix: &Path, stream: Stream) -> Result<Self, SnapshotError> {
        let file = File::create(stream.path(prefix))
            .map_err(|source| SnapshotError::Io { stream, source })?;
        Ok(Self {
            stream,
            inner: BufWriter::new(file),
        })
    }

    fn write_u32(&mut self, value: u32) -> Result<(), SnapshotError> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_f64(&mut self, value: f64) -> Result<(), SnapshotError> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        self.inner.write_all(bytes).map_err(|source| SnapshotError::Io {
            stream: self.stream,
            source,
        })
    }

    fn finish(mut self) -> Result<(), SnapshotError> {
        self.inner.flush().map_err(|source| SnapshotError::Io {
            stream: self.stream,
            source,
        })
    }
}

/// Dump the complete store to `<prefix>.{vtx,edg,lbl[,wgt][,cls]}`.
pub fn dump(store: &GraphStore, prefix: &Path) -> SemrelResult<()> {
    let topo = store.topology();
    let vcount = store.vertex_count();
    let ecount = topo.edge_count();

    // Vertex stream: explicit ids, so restore does not depend on record order.
    let mut vtx = StreamWriter::create(prefix, Stream::Vertices)?;
    vtx.write_u32(vcount as u32)?;
    for id in 0..vcount as u32 {
        let uri = store
            .uri(VertexId::new(id))
            .expect("reverse table shorter than vertex count");
        vtx.write_u32(id)?;
        vtx.write_u32(uri.len() as u32)?;
        vtx.write_all(uri.as_bytes())?;
    }
    vtx.finish()?;
    info!(vertices = vcount, "dumped vertex URI data");

    let mut edg = StreamWriter::create(prefix, Stream::Edges)?;
    edg.write_u32(ecount as u32)?;
    for eid in 0..ecount {
        let (from, to) = topo.endpoints(eid).expect("edge id in range");
        edg.write_u32(from.get())?;
        edg.write_u32(to.get())?;
    }
    edg.finish()?;
    info!(edges = ecount, "dumped edge data");

    let mut lbl = StreamWriter::create(prefix, Stream::Labels)?;
    lbl.write_u32(ecount as u32)?;
    for eid in 0..ecount {
        lbl.write_u32(topo.label(eid).expect("edge id in range").get())?;
    }
    lbl.finish()?;
    info!(labels = ecount, "dumped edge label data");

    if let Some(weights) = topo.weights() {
        let mut wgt = StreamWriter::create(prefix, Stream::Weights)?;
        wgt.write_u32(weights.len() as u32)?;
        for &w in weights {
            wgt.write_f64(w)?;
        }
        wgt.finish()?;
        info!(weights = weights.len(), "dumped edge weight data");
    }

    if let Some(clusters) = topo.clusters() {
        let mut cls = StreamWriter::create(prefix, Stream::Clusters)?;
        cls.write_u32(clusters.levels() as u32)?;
        cls.write_all(clusters.raw())?;
        cls.finish()?;
        info!(
            levels = clusters.levels(),
            vertices = clusters.vertex_count(),
            "dumped cluster data"
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

struct StreamReader {
    stream: Stream,
    inner: BufReader<File>,
    offset: u64,
}

impl StreamReader {
    /// Open a stream file; `Ok(None)` when the file does not exist (the
    /// layer is simply absent from this snapshot).
    fn open(prefix: &Path, stream: Stream) -> Result<Option<Self>, SnapshotError> {
        match File::open(stream.path(prefix)) {
            Ok(file) => Ok(Some(Self {
                stream,
                inner: BufReader::new(file),
                offset: 0,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Io { stream, source }),
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), SnapshotError> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(SnapshotError::Truncated {
                stream: self.stream,
                offset: self.offset,
            }),
            Err(source) => Err(SnapshotError::Io {
                stream: self.stream,
                source,
            }),
        }
    }

    fn read_u32(&mut self) -> Result<u32, SnapshotError> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_f64(&mut self) -> Result<f64, SnapshotError> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// The declared record count must account for the whole file; leftover
    /// bytes mean the count header is corrupt.
    fn expect_eof(&mut self) -> Result<(), SnapshotError> {
        let mut probe = [0u8; 1];
        match self.inner.read(&mut probe) {
            Ok(0) => Ok(()),
            Ok(_) => Err(self.invalid("trailing bytes after the declared record count")),
            Err(source) => Err(SnapshotError::Io {
                stream: self.stream,
                source,
            }),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> SnapshotError {
        SnapshotError::Invalid {
            stream: self.stream,
            offset: self.offset,
            message: message.into(),
        }
    }
}

/// Restore a store from the streams at `prefix`.
///
/// Missing weight/cluster files leave those layers empty; a snapshot without
/// vertex and edge streams yields an empty store.
pub fn restore(prefix: &Path) -> SemrelResult<GraphStore> {
    let store = GraphStore::new(StoreConfig {
        weighted: false,
        ..Default::default()
    });

    let mut vcount = 0usize;
    if let Some(mut vtx) = StreamReader::open(prefix, Stream::Vertices)? {
        vcount = vtx.read_u32()? as usize;
        store.presize_vertices(vcount);
        // vcount records with distinct in-range ids cover the whole table,
        // so a duplicate check is also a completeness check.
        let mut seen = vec![false; vcount];
        let mut uri_buf = Vec::new();
        for _ in 0..vcount {
            let id = vtx.read_u32()?;
            if id as usize >= vcount {
                return Err(vtx
                    .invalid(format!("vertex id {id} outside declared count {vcount}"))
                    .into());
            }
            if std::mem::replace(&mut seen[id as usize], true) {
                return Err(vtx.invalid(format!("vertex id {id} appears twice")).into());
            }
            let len = vtx.read_u32()? as usize;
            uri_buf.resize(len, 0);
            vtx.fill(&mut uri_buf)?;
            let uri = std::str::from_utf8(&uri_buf)
                .map_err(|_| vtx.invalid(format!("vertex {id} URI is not valid UTF-8")))?;
            if let Some(prev) = store.restore_vertex(VertexId::new(id), uri) {
                return Err(vtx
                    .invalid(format!("URI of vertex {id} already bound to vertex {prev}"))
                    .into());
            }
        }
        vtx.expect_eof()?;
        info!(vertices = vcount, "restored vertex URI data");
    }

    let mut ecount = 0usize;
    if let Some(mut edg) = StreamReader::open(prefix, Stream::Edges)? {
        ecount = edg.read_u32()? as usize;
        let mut lbl = StreamReader::open(prefix, Stream::Labels)?
            .ok_or_else(|| SnapshotError::Invalid {
                stream: Stream::Labels,
                offset: 0,
                message: format!("label stream missing but edge stream has {ecount} edges"),
            })?;
        let lcount = lbl.read_u32()? as usize;
        if lcount != ecount {
            return Err(lbl
                .invalid(format!("label count {lcount} does not match edge count {ecount}"))
                .into());
        }

        let mut topo = store.topology_mut();
        let mut batch = super::store::EdgeBatch::new();
        for _ in 0..ecount {
            let from = edg.read_u32()?;
            let to = edg.read_u32()?;
            let label = lbl.read_u32()?;
            for id in [from, to, label] {
                if id as usize >= vcount {
                    return Err(edg
                        .invalid(format!("edge endpoint {id} outside vertex range {vcount}"))
                        .into());
                }
            }
            batch.add(VertexId::new(from), VertexId::new(to), VertexId::new(label));
        }
        topo.restore_edges(&mut batch, vcount)?;
        drop(topo);
        edg.expect_eof()?;
        lbl.expect_eof()?;
        info!(edges = ecount, "restored edge and label data");
    }

    if let Some(mut wgt) = StreamReader::open(prefix, Stream::Weights)? {
        let wcount = wgt.read_u32()? as usize;
        if wcount != ecount {
            return Err(wgt
                .invalid(format!("weight count {wcount} does not match edge count {ecount}"))
                .into());
        }
        let mut topo = store.topology_mut();
        topo.ensure_weight_layer();
        for eid in 0..wcount {
            topo.set_edge_weight(eid, wgt.read_f64()?)?;
        }
        drop(topo);
        wgt.expect_eof()?;
        info!(weights = wcount, "restored edge weight data");
    }

    if let Some(mut cls) = StreamReader::open(prefix, Stream::Clusters)? {
        let levels = cls.read_u32()? as usize;
        let mut assign = vec![0u8; levels * vcount];
        cls.fill(&mut assign)?;
        cls.expect_eof()?;
        store
            .topology_mut()
            .set_clusters(ClusterTable::from_raw(levels, assign));
        info!(levels, "restored cluster data");
    }

    Ok(store)
}
