//! Export command - write the resolved documents as a bundle archive

use console::style;
use kanvas_core::Bundle;
use kanvas_core::bundle::read_manifest;
use kanvas_engine::Pipeline;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::Path;

use super::load_graph;
use crate::util::{bundle_name, format_size};

pub fn run(graph_path: &Path, output: &Path, name: Option<&str>) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let name = name.map(str::to_string).unwrap_or_else(|| bundle_name(graph_path));
    let documents = Pipeline::new().documents(&graph);

    println!(
        "{} {} ({} document(s))",
        style("Exporting").cyan().bold(),
        name,
        documents.len()
    );

    let bundle = Bundle::from_documents(&name, documents.iter().map(|d| &d.value))
        .into_diagnostic()
        .wrap_err("Failed to render documents")?;
    bundle
        .write_archive(output)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write {}", output.display()))?;

    let size = std::fs::metadata(output).into_diagnostic()?.len();
    println!("  {} {}", style("Created").green().bold(), output.display());
    println!("  {} {}", style("Size").dim(), format_size(size));

    let manifest = read_manifest(output).into_diagnostic()?;
    println!();
    println!("{}:", style("Contents").bold());
    for entry in &manifest.files {
        println!("  {}", entry.path);
    }
    println!();
    println!("{}: sha256:{}", style("Digest").bold(), manifest.digest);

    Ok(())
}
