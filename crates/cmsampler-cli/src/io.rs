//! TSV readers and writers for graph/label inputs and sampled edge lists.
//!
//! Parsed with the `csv` crate in tab-delimited, headerless mode; malformed
//! lines become `CmError::Input` carrying the 1-based line number.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use cmsampler_core::{CmError, ErrorInfo, LabelId, NodeId};
use cmsampler_graph::LabelRecord;

fn reader_for(path: &Path) -> Result<csv::Reader<File>, CmError> {
    let file = File::open(path).map_err(|err| {
        CmError::Input(
            ErrorInfo::new("unreadable-file", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(file))
}

fn parse_u32(path: &Path, line: u64, field: &str, raw: &str) -> Result<u32, CmError> {
    raw.trim().parse::<u32>().map_err(|_| {
        CmError::Input(
            ErrorInfo::new("non-integer-id", format!("field `{field}` is not an integer"))
                .with_context("path", path.display().to_string())
                .with_context("line", line.to_string())
                .with_context("value", raw.to_string()),
        )
    })
}

/// Reads a headerless `u\tv` edge-list TSV, returning the edges in file
/// order and the degree sequence implied by them (sized to `max(id) + 1`).
pub fn read_graph_tsv(path: &Path) -> Result<(Vec<(NodeId, NodeId)>, Vec<u32>), CmError> {
    let mut reader = reader_for(path)?;
    let mut edges = Vec::new();
    let mut max_id = 0u32;
    for (idx, record) in reader.records().enumerate() {
        let line = idx as u64 + 1;
        let record = record.map_err(|err| {
            CmError::Input(
                ErrorInfo::new("malformed-tsv", err.to_string())
                    .with_context("path", path.display().to_string())
                    .with_context("line", line.to_string()),
            )
        })?;
        if record.len() < 2 {
            return Err(CmError::Input(
                ErrorInfo::new("malformed-tsv", "expected `u\\tv`")
                    .with_context("path", path.display().to_string())
                    .with_context("line", line.to_string()),
            ));
        }
        let u = parse_u32(path, line, "u", &record[0])?;
        let v = parse_u32(path, line, "v", &record[1])?;
        max_id = max_id.max(u).max(v);
        edges.push((NodeId::from_raw(u), NodeId::from_raw(v)));
    }
    let mut degrees = vec![0u32; max_id as usize + 1];
    for &(u, v) in &edges {
        degrees[u.index()] += 1;
        degrees[v.index()] += 1;
    }
    Ok((edges, degrees))
}

/// Reads a headerless `node_id\tlabel_id[\tinner_or_outer]` TSV into one
/// [`LabelRecord`] per node, indexed by node id. Every node in `0..num_nodes`
/// must have an entry; a missing node is a fatal input-format error.
pub fn read_labels_tsv(path: &Path, num_nodes: usize) -> Result<Vec<LabelRecord>, CmError> {
    let mut reader = reader_for(path)?;
    let mut slots: Vec<Option<LabelRecord>> = vec![None; num_nodes];
    for (idx, record) in reader.records().enumerate() {
        let line = idx as u64 + 1;
        let record = record.map_err(|err| {
            CmError::Input(
                ErrorInfo::new("malformed-tsv", err.to_string())
                    .with_context("path", path.display().to_string())
                    .with_context("line", line.to_string()),
            )
        })?;
        if record.len() < 2 {
            return Err(CmError::Input(
                ErrorInfo::new("malformed-tsv", "expected `node_id\\tlabel_id[\\tinner_or_outer]`")
                    .with_context("path", path.display().to_string())
                    .with_context("line", line.to_string()),
            ));
        }
        let node = parse_u32(path, line, "node_id", &record[0])?;
        let label = parse_u32(path, line, "label_id", &record[1])?;
        let inner_or_outer = record.get(2).map(|s| s.trim().to_string());
        let slot = slots.get_mut(node as usize).ok_or_else(|| {
            CmError::Input(
                ErrorInfo::new("node-out-of-range", "label file names a node outside the graph")
                    .with_context("path", path.display().to_string())
                    .with_context("line", line.to_string())
                    .with_context("node", node.to_string()),
            )
        })?;
        *slot = Some(LabelRecord {
            label: LabelId::from_raw(label),
            inner_or_outer,
        });
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(node, slot)| {
            slot.ok_or_else(|| {
                CmError::Input(
                    ErrorInfo::new("missing-label", "graph node has no label")
                        .with_context("path", path.display().to_string())
                        .with_context("node", node.to_string()),
                )
            })
        })
        .collect()
}

/// Writes one `u\tv` line per edge, in index order.
pub fn write_edges_tsv(path: &Path, edges: &[(NodeId, NodeId)]) -> Result<(), CmError> {
    let mut file = File::create(path).map_err(|err| {
        CmError::Io(
            ErrorInfo::new("unwritable-file", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    for &(u, v) in edges {
        writeln!(file, "{}\t{}", u.as_raw(), v.as_raw()).map_err(|err| {
            CmError::Io(
                ErrorInfo::new("write-failed", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
    }
    Ok(())
}
