//! One evaluation pass: resolve, inject, validate

use kanvas_core::{Graph, ValidationContext};
use serde::Serialize;

use crate::inject::Injector;
use crate::resolver::{self, Document};
use crate::rules::{RuleEngine, Warning};

/// Output of one pass over a graph snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// Resource documents in snapshot order, then plugin-emitted documents
    pub documents: Vec<Document>,
    pub warnings: Vec<Warning>,
}

impl PipelineOutput {
    /// Document materialized from the given Resource node
    pub fn document(&self, node_id: &str) -> Option<&Document> {
        self.documents
            .iter()
            .find(|d| d.node_id == node_id && d.origin == resolver::Origin::Resource)
    }

    /// Warnings citing the given node
    pub fn warnings_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Warning> {
        self.warnings
            .iter()
            .filter(move |w| w.nodes.iter().any(|n| n == node_id))
    }
}

/// Resolution, injection and validation wired together
///
/// Every run starts from the raw graph, so running the same snapshot twice
/// gives equal output.
#[derive(Debug, Default)]
pub struct Pipeline {
    injector: Injector,
    rules: RuleEngine,
}

impl Pipeline {
    /// Pipeline with the built-in plugin kinds and rules
    pub fn new() -> Self {
        Self::with(Injector::with_defaults(), RuleEngine::with_defaults())
    }

    pub fn with(injector: Injector, rules: RuleEngine) -> Self {
        Self { injector, rules }
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Resolved and injected documents, without validation
    pub fn documents(&self, graph: &Graph) -> Vec<Document> {
        let mut documents = resolver::resolve(graph);
        self.injector.inject(graph, &mut documents);
        documents
    }

    pub fn run(&self, graph: &Graph, context: &ValidationContext) -> PipelineOutput {
        let documents = self.documents(graph);
        let warnings = self.rules.evaluate(graph, &documents, context);
        tracing::debug!(
            nodes = graph.nodes.len(),
            documents = documents.len(),
            warnings = warnings.len(),
            "pipeline pass complete"
        );
        PipelineOutput {
            documents,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Level;
    use kanvas_core::{Edge, Node};
    use serde_json::json;

    fn shop() -> Graph {
        let mut graph = Graph::new(
            vec![
                Node::resource(
                    "api",
                    "Deployment",
                    json!({
                        "metadata": {"name": "api", "namespace": "shop"},
                        "spec": {"template": {"spec": {"containers": ["#ref-api-container"]}}}
                    }),
                ),
                Node::reference(
                    "api-container",
                    "Deployment",
                    "containers",
                    json!({"name": "api", "image": "shop/api:1.4.2"}),
                ),
                Node::plugin("db", "database", json!({"name": "orders", "engine": "postgres"})),
                Node::plugin("creds", "secret", json!({"name": "api-secrets"})),
            ],
            vec![Edge::new("api-container", "api")],
        );
        graph.attach("db", "api", Some("api"));
        graph.attach("creds", "api", Some("api"));
        graph
    }

    #[test]
    fn test_run_injects_before_validation() {
        let output = Pipeline::new().run(&shop(), &ValidationContext::default());
        let api = output.document("api").unwrap();
        let container = &api.value["spec"]["template"]["spec"]["containers"][0];
        let env = container["env"].as_array().unwrap();
        assert!(env.iter().any(|e| e["name"] == "DB_HOST"));
        assert_eq!(container["envFrom"][0]["secretRef"]["name"], "api-secrets");

        // Injected env does not trip any rule about the image
        assert!(!output.warnings.iter().any(|w| w.rule_id == "unsafe-image-tag"));
    }

    #[test]
    fn test_run_is_idempotent() {
        let graph = shop();
        let pipeline = Pipeline::new();
        let ctx = ValidationContext::default();
        assert_eq!(pipeline.run(&graph, &ctx), pipeline.run(&graph, &ctx));
    }

    #[test]
    fn test_container_warnings_cite_the_reference() {
        let output = Pipeline::new().run(&shop(), &ValidationContext::default());
        let probe = output
            .warnings
            .iter()
            .find(|w| w.rule_id == "missing-liveness-probe")
            .unwrap();
        assert_eq!(probe.nodes, vec!["api-container", "api"]);
        assert_eq!(probe.field_path.to_string(), "livenessProbe");
        assert!(output.warnings_for("api-container").count() >= 1);
    }

    #[test]
    fn test_detach_removes_injected_fields() {
        let mut graph = shop();
        let pipeline = Pipeline::new();
        graph.detach("creds", "api");
        let documents = pipeline.documents(&graph);
        let container = &documents[0].value["spec"]["template"]["spec"]["containers"][0];
        assert!(container.get("envFrom").is_none());
    }

    #[test]
    fn test_empty_graph() {
        let output = Pipeline::new().run(&Graph::default(), &ValidationContext::default());
        assert!(output.documents.is_empty());
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_ids_are_fresh_per_run() {
        let graph = shop();
        let pipeline = Pipeline::new();
        let ctx = ValidationContext::default();
        for _ in 0..2 {
            let output = pipeline.run(&graph, &ctx);
            let first_danger = output.warnings.iter().find(|w| w.level == Level::Danger);
            assert_eq!(first_danger.map(|w| w.id), Some(1000));
        }
    }
}
