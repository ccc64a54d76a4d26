//! Lint command - run the rule set over a graph snapshot

use console::style;
use kanvas_core::{KubeVersion, ProjectConfig, SchemaCatalog, ValidationContext};
use kanvas_engine::suggestions::{SuggestionCategory, did_you_mean};
use kanvas_engine::{Pipeline, RuleEngine};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use super::load_graph;
use crate::display::{Summary, WarningReport};
use crate::error::CliError;

/// Options of `kanvas lint`
#[derive(Debug, Default)]
pub struct LintOptions {
    pub kube_version: Option<String>,
    pub schema: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub ignore: Vec<String>,
    pub json: bool,
    pub strict: bool,
}

pub fn run(graph_path: &Path, options: &LintOptions) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let context = build_context(graph_path, options)?;
    let output = Pipeline::new().run(&graph, &context);
    let summary = Summary::of(&output.warnings);

    if options.json {
        let report = serde_json::json!({
            "projectVersion": context.project_version.to_string(),
            "summary": summary,
            "warnings": output.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else {
        println!(
            "{} Linting {} ({} nodes, Kubernetes {})",
            style("→").blue(),
            graph_path.display(),
            graph.nodes.len(),
            context.project_version
        );
        let report = WarningReport::new(&output.warnings);
        report.display();
        println!();
        report.print_summary(options.strict);
    }

    if summary.danger > 0 || (options.strict && summary.total() > 0) {
        return Err(CliError::lint_failed(summary.danger, summary.total()).into());
    }
    Ok(())
}

/// Layer command-line flags over the project configuration.
///
/// The config comes from `--config`, else `kanvas.yaml` next to the snapshot.
pub fn build_context(graph_path: &Path, options: &LintOptions) -> Result<ValidationContext, CliError> {
    let config = match &options.config {
        Some(path) => ProjectConfig::load_from(path)?,
        None => {
            let dir = graph_path.parent().unwrap_or_else(|| Path::new("."));
            ProjectConfig::discover(dir)?
        }
    };
    let mut context = config.validation_context()?;

    if let Some(version) = &options.kube_version {
        context.project_version = KubeVersion::parse(version).map_err(|e| {
            CliError::usage(e.to_string(), Some("Use a version like 1.29 or v1.29.3".to_string()))
        })?;
    }
    if let Some(schema) = &options.schema {
        context = context.with_catalog(SchemaCatalog::from_file(schema)?);
    }

    let engine = RuleEngine::with_defaults();
    for rule in &options.ignore {
        if !engine.rule_ids().any(|id| id == rule) {
            let hint = did_you_mean(rule, engine.rule_ids(), SuggestionCategory::RuleId);
            eprintln!(
                "{} unknown rule '{}' in --ignore{}",
                style("warning:").yellow().bold(),
                rule,
                hint.map(|h| format!(". {}", h)).unwrap_or_default()
            );
        }
        context = context.ignore_rule(rule.clone());
    }

    tracing::debug!(
        version = %context.project_version,
        catalog = context.catalog.is_some(),
        ignored = context.ignored_rules.len(),
        "validation context ready"
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("kanvas.yaml"),
            "apiVersion: kanvas.io/v1\nprojectVersion: \"1.21\"\nignoredRules: [default-namespace]\n",
        )
        .unwrap();
        let graph = dir.path().join("graph.yaml");

        let context = build_context(&graph, &LintOptions::default()).unwrap();
        assert_eq!(context.project_version, KubeVersion::new(1, 21));
        assert!(context.is_ignored("default-namespace"));

        let options = LintOptions {
            kube_version: Some("v1.30".into()),
            ignore: vec!["run-as-root".into()],
            ..Default::default()
        };
        let context = build_context(&graph, &options).unwrap();
        assert_eq!(context.project_version, KubeVersion::new(1, 30));
        assert!(context.is_ignored("default-namespace"));
        assert!(context.is_ignored("run-as-root"));
    }

    #[test]
    fn test_bad_version_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let options = LintOptions {
            kube_version: Some("latest".into()),
            ..Default::default()
        };
        let err = build_context(&dir.path().join("graph.yaml"), &options).unwrap_err();
        assert!(matches!(err, CliError::Usage { .. }));
    }

    #[test]
    fn test_schema_flag_loads_catalog() {
        let dir = TempDir::new().unwrap();
        let schema = dir.path().join("catalog.yaml");
        std::fs::write(&schema, "kinds:\n  - { group: apps, version: v1, kind: Deployment }\n").unwrap();
        let options = LintOptions {
            schema: Some(schema),
            ..Default::default()
        };
        let context = build_context(&dir.path().join("graph.yaml"), &options).unwrap();
        assert_eq!(context.catalog.unwrap().kinds.len(), 1);
    }
}
