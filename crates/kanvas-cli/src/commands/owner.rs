//! Owner command - show which node holds a field of a resolved document

use console::style;
use kanvas_core::FieldPath;
use kanvas_engine::owner_of;
use kanvas_engine::suggestions::{SuggestionCategory, did_you_mean};
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use super::load_graph;
use crate::error::CliError;

pub fn run(graph_path: &Path, node_id: &str, path: &str, json: bool) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let Some(node) = graph.node(node_id) else {
        let hint = did_you_mean(
            node_id,
            graph.nodes.iter().map(|n| n.id.as_str()),
            SuggestionCategory::NodeId,
        );
        return Err(CliError::usage(format!("No node '{}' in {}", node_id, graph_path.display()), hint).into());
    };

    let owner = owner_of(&graph, node, &FieldPath::parse(path));
    if json {
        println!("{}", serde_json::to_string_pretty(&owner).into_diagnostic()?);
    } else {
        let local = if owner.local_path.is_empty() {
            "(root)".to_string()
        } else {
            owner.local_path.to_string()
        };
        println!("{} {}", style("node:").bold(), owner.node_id);
        println!("{} {}", style("path:").bold(), local);
    }
    Ok(())
}
