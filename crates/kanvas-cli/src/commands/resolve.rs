//! Resolve command - print or write the documents a graph produces

use console::style;
use kanvas_core::Bundle;
use kanvas_engine::Pipeline;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::Path;

use super::load_graph;
use crate::display::yaml_stream;
use crate::util::bundle_name;

pub fn run(graph_path: &Path, output_dir: Option<&Path>, json: bool) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let documents = Pipeline::new().documents(&graph);
    let values: Vec<_> = documents.iter().map(|d| &d.value).collect();

    if let Some(dir) = output_dir {
        let bundle = Bundle::from_documents(&bundle_name(graph_path), values.iter().copied())
            .into_diagnostic()
            .wrap_err("Failed to render documents")?;
        bundle
            .write_dir(dir)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write {}", dir.display()))?;

        for file in &bundle.files {
            println!("{} {}", style("wrote").green(), dir.join(&file.path).display());
        }
        return Ok(());
    }

    if json {
        let out = serde_json::to_string_pretty(&values).into_diagnostic()?;
        println!("{}", out);
    } else {
        let out = yaml_stream(values.iter().copied())
            .into_diagnostic()
            .wrap_err("Failed to render documents")?;
        print!("{}", out);
    }
    Ok(())
}
