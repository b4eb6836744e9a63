use crate::config::{EDGE_TYPE, NODE_LABEL};
use crate::graph::LoadedGraph;
use anyhow::{Context, Result};
use csv::Writer;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Writes `nodes.csv` and `edges.csv` into `output_dir` in bulk-import layout.
pub fn export_csv(graph: &LoadedGraph, output_dir: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    let nodes_path = Path::new(output_dir).join("nodes.csv");
    let mut nodes_writer = Writer::from_writer(BufWriter::with_capacity(
        128 * 1024,
        File::create(&nodes_path)
            .with_context(|| format!("Failed to create {:?}", nodes_path))?,
    ));
    nodes_writer.write_record(["id:ID", "title", ":LABEL"])?;

    let mut id_buf = itoa::Buffer::new();
    for (id, title) in graph.interner.iter().enumerate() {
        nodes_writer.write_record([
            id_buf.format(id).as_bytes(),
            title,
            NODE_LABEL.as_bytes(),
        ])?;
    }
    nodes_writer.flush()?;

    let edges_path = Path::new(output_dir).join("edges.csv");
    let mut edges_writer = Writer::from_writer(BufWriter::with_capacity(
        128 * 1024,
        File::create(&edges_path)
            .with_context(|| format!("Failed to create {:?}", edges_path))?,
    ));
    edges_writer.write_record([":START_ID", ":END_ID", ":TYPE"])?;

    let mut from_buf = itoa::Buffer::new();
    let mut to_buf = itoa::Buffer::new();
    for edge in &graph.edges {
        edges_writer.write_record([
            from_buf.format(edge.from),
            to_buf.format(edge.to),
            EDGE_TYPE,
        ])?;
    }
    edges_writer.flush()?;

    info!(
        nodes = graph.node_count(),
        edges = graph.edges.len(),
        output_dir,
        "CSV export complete"
    );
    Ok(())
}
