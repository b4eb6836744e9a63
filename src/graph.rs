//! On-disk graph artifact: the title table in id order plus the edge list
//! sorted by source id.

use crate::config::GRAPH_VERSION;
use crate::driver::Graph;
use crate::interner::Interner;
use crate::list::Edge;
use anyhow::{bail, Context, Result};
use bincode::Options;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub version: u32,
    pub input_path: String,
    pub input_mtime: u64,
    pub input_size: u64,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Streams titles straight out of the interner instead of collecting them.
struct TitleTable<'a>(&'a Interner);

impl Serialize for TitleTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

#[derive(Serialize)]
struct GraphFileSer<'a> {
    metadata: GraphMetadata,
    titles: TitleTable<'a>,
    edges: &'a [Edge],
}

#[derive(Deserialize)]
struct GraphFileDe {
    metadata: GraphMetadata,
    titles: Vec<Vec<u8>>,
    edges: Vec<Edge>,
}

/// A graph read back from disk. Ids match the ones assigned at build time.
pub struct LoadedGraph {
    pub metadata: GraphMetadata,
    pub interner: Interner,
    /// Sorted by source id; duplicates preserved.
    pub edges: Vec<Edge>,
}

impl LoadedGraph {
    pub fn node_count(&self) -> usize {
        self.interner.len()
    }

    pub fn title(&self, id: u32) -> &[u8] {
        self.interner.get(id)
    }

    /// Edges leaving `id`, in discovery order.
    pub fn outgoing(&self, id: u32) -> &[Edge] {
        let start = self.edges.partition_point(|e| e.from < id);
        let end = self.edges.partition_point(|e| e.from <= id);
        &self.edges[start..end]
    }
}

fn get_input_metadata(input_path: &str) -> Result<(u64, u64)> {
    let metadata = fs::metadata(input_path)
        .with_context(|| format!("Failed to get metadata for: {}", input_path))?;
    let mtime = metadata
        .modified()
        .context("Failed to get modification time")?
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("Invalid modification time")?
        .as_secs();
    let size = metadata.len();
    Ok((mtime, size))
}

/// Serializes `contents` into `writer` and flushes it.
fn serialize_graph<W: Write>(writer: &mut BufWriter<W>, contents: &GraphFileSer) -> Result<()> {
    bincode::DefaultOptions::new()
        .serialize_into(&mut *writer, contents)
        .context("Failed to serialize graph")?;
    writer.flush().context("Failed to flush graph file")
}

/// Writes `graph` to `output_path` atomically via rename.
pub fn write_graph(graph: &Graph, input_path: &str, output_path: &Path) -> Result<GraphMetadata> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let (mtime, size) = get_input_metadata(input_path)?;

    let mut edges = graph.edges.as_slice().to_vec();
    edges.sort_by_key(|e| e.from);

    let metadata = GraphMetadata {
        version: GRAPH_VERSION,
        input_path: input_path.to_string(),
        input_mtime: mtime,
        input_size: size,
        node_count: graph.interner.len(),
        edge_count: edges.len(),
    };

    let file_contents = GraphFileSer {
        metadata: metadata.clone(),
        titles: TitleTable(&graph.interner),
        edges: &edges,
    };

    let tmp_path = output_path.with_extension("tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp graph file: {:?}", tmp_path))?;
    let mut writer = BufWriter::with_capacity(256 * 1024, file);
    serialize_graph(&mut writer, &file_contents)?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to finish graph file")?
        .sync_all()
        .with_context(|| format!("Failed to sync temp graph file: {:?}", tmp_path))?;

    fs::rename(&tmp_path, output_path)
        .with_context(|| format!("Failed to rename temp graph file to: {:?}", output_path))?;

    info!(
        nodes = metadata.node_count,
        edges = metadata.edge_count,
        path = ?output_path,
        "Graph written"
    );

    Ok(metadata)
}

fn read_graph_file(path: &Path) -> Result<GraphFileDe> {
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let file = File::open(path).with_context(|| format!("Failed to open graph file: {:?}", path))?;
    let reader = BufReader::with_capacity(256 * 1024, file);

    let options = bincode::options().with_limit(file_size.saturating_add(1024));
    options
        .deserialize_from(reader)
        .context("Failed to deserialize graph")
}

fn into_loaded(file: GraphFileDe) -> Result<LoadedGraph> {
    let GraphFileDe {
        metadata,
        titles,
        edges,
    } = file;

    let bytes: usize = titles.iter().map(|t| t.len() + 1).sum();
    let mut interner = Interner::with_capacity(bytes, titles.len());
    for (expected, title) in titles.iter().enumerate() {
        let id = interner.intern(title);
        if id as usize != expected {
            bail!("Graph file repeats title at id {}", expected);
        }
    }

    let nodes = interner.len() as u32;
    if let Some(bad) = edges.iter().find(|e| e.from >= nodes || e.to >= nodes) {
        bail!(
            "Graph file edge {} -> {} references a missing node (have {})",
            bad.from,
            bad.to,
            nodes
        );
    }
    if edges.windows(2).any(|w| w[0].from > w[1].from) {
        bail!("Graph file edges are not sorted by source");
    }

    Ok(LoadedGraph {
        metadata,
        interner,
        edges,
    })
}

/// Returns `Ok(Some(graph))` if the artifact is readable and was built from
/// the current `input_path`, `Ok(None)` if missing or stale.
pub fn try_load_graph(path: &Path, input_path: &str) -> Result<Option<LoadedGraph>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = match read_graph_file(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Graph file is corrupt or unreadable");
            return Ok(None);
        }
    };

    if file.metadata.version != GRAPH_VERSION {
        info!(
            cached = file.metadata.version,
            current = GRAPH_VERSION,
            "Graph version mismatch"
        );
        return Ok(None);
    }

    if file.metadata.input_path != input_path {
        info!(
            cached = file.metadata.input_path,
            current = input_path,
            "Graph input path mismatch"
        );
        return Ok(None);
    }

    let (mtime, size) = get_input_metadata(input_path)?;
    if file.metadata.input_mtime != mtime || file.metadata.input_size != size {
        info!(
            cached_mtime = file.metadata.input_mtime,
            current_mtime = mtime,
            cached_size = file.metadata.input_size,
            current_size = size,
            "Input file has changed since graph was built"
        );
        return Ok(None);
    }

    match into_loaded(file) {
        Ok(graph) => Ok(Some(graph)),
        Err(e) => {
            warn!(error = %e, "Graph file failed validation");
            Ok(None)
        }
    }
}

pub fn is_graph_current(path: &Path, input_path: &str) -> Result<bool> {
    Ok(try_load_graph(path, input_path)?.is_some())
}

/// Loads a graph artifact without checking it against its input.
pub fn load_graph(path: &Path) -> Result<LoadedGraph> {
    if !path.exists() {
        bail!("Graph file does not exist: {:?}", path);
    }

    let graph = into_loaded(read_graph_file(path)?)?;

    info!(
        nodes = graph.metadata.node_count,
        edges = graph.metadata.edge_count,
        "Graph loaded"
    );

    Ok(graph)
}
