//! CLI commands

pub mod export;
pub mod lint;
pub mod owner;
pub mod resolve;
pub mod verify;

use kanvas_core::{CoreError, Graph};
use std::path::Path;

use crate::error::CliError;

/// Load a graph snapshot, mapping failures to snapshot errors
pub(crate) fn load_graph(path: &Path) -> Result<Graph, CliError> {
    let graph = Graph::from_file(path).map_err(|e| match e {
        e @ CoreError::SnapshotNotFound { .. } => CliError::snapshot(
            e.to_string(),
            Some("Export the canvas as a YAML or JSON snapshot first".to_string()),
        ),
        CoreError::Io(io) => CliError::from(io),
        other => CliError::snapshot(format!("{}: {}", path.display(), other), None),
    })?;
    tracing::debug!(
        path = %path.display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "loaded snapshot"
    );
    Ok(graph)
}
