//! Attachment injection
//!
//! Runs after reference resolution. Every attachment edge (plugin node →
//! target node) merges a plugin-kind specific fragment into the target's
//! resolved document, at the scope its [`AttachmentHandler`] declares.
//!
//! Documents are fresh clones on every pass and collection entries are keyed,
//! so injecting an unchanged graph twice gives identical output.

mod plugins;
mod registry;
mod site;

pub use plugins::{
    ConfigMapRef, Connection, Ingress, LoggingSidecar, Monitoring, RegistryCredential,
    SecretRef, ServiceAccount, Storage,
};
pub use registry::{AttachmentHandler, AttachmentRegistry, Scope};
pub use site::{InjectionSite, pod_spec_for, strip_volumes, upsert_entry};

use kanvas_core::values::find_placeholder;
use kanvas_core::{Attachment, FieldPath, Graph, NodeData};
use std::collections::HashSet;

use crate::resolver::{Document, Origin};
use crate::suggestions::{did_you_mean, SuggestionCategory};

/// Merges plugin fragments into resolved documents
#[derive(Debug, Default)]
pub struct Injector {
    registry: AttachmentRegistry,
}

/// An attachment whose target document has been located
struct Planned<'g, 'r> {
    attachment: Attachment<'g>,
    handler: &'r dyn AttachmentHandler,
    document: usize,
    base: FieldPath,
}

impl Injector {
    pub fn new(registry: AttachmentRegistry) -> Self {
        Self { registry }
    }

    pub fn with_defaults() -> Self {
        Self::new(AttachmentRegistry::with_defaults())
    }

    pub fn registry(&self) -> &AttachmentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AttachmentRegistry {
        &mut self.registry
    }

    /// Inject every attachment of `graph` into `documents`.
    ///
    /// Dangling edges and unknown plugin kinds are skipped. Documents emitted
    /// by document-scoped plugins are appended after the existing ones, in
    /// attachment order.
    pub fn inject(&self, graph: &Graph, documents: &mut Vec<Document>) {
        let planned = self.plan(graph, documents);

        for item in planned.iter().filter(|p| p.handler.resets_volumes()) {
            let value = &mut documents[item.document].value;
            let pod_spec = pod_spec_for(value, &item.base);
            strip_volumes(value, &item.base, &pod_spec);
        }

        let mut emitted = Vec::new();
        for item in &planned {
            let Attachment {
                plugin_id,
                target_id,
                ..
            } = item.attachment;
            let container = graph
                .node(target_id)
                .and_then(|n| n.plugin_slot(plugin_id))
                .and_then(|slot| slot.container_name.as_deref());

            let scope = item.handler.scope();
            tracing::debug!(plugin = plugin_id, target = target_id, %scope, "injecting attachment");
            let mut site = InjectionSite::new(
                &mut documents[item.document].value,
                target_id,
                scope,
                item.base.clone(),
                container,
            );
            item.handler.inject(&mut site, &item.attachment);

            emitted.extend(site.into_emitted().into_iter().map(|value| Document {
                node_id: plugin_id.to_string(),
                origin: Origin::Plugin {
                    target: target_id.to_string(),
                },
                value,
            }));
        }

        documents.extend(emitted);
    }

    fn plan<'g, 'r>(&'r self, graph: &'g Graph, documents: &[Document]) -> Vec<Planned<'g, 'r>> {
        let mut planned = Vec::new();
        for attachment in graph.attachments() {
            let kind = attachment.plugin.plugin_kind.as_str();
            let Some(handler) = self.registry.get(kind) else {
                tracing::debug!(
                    plugin = attachment.plugin_id,
                    kind,
                    hint = ?did_you_mean(kind, self.registry.kinds(), SuggestionCategory::PluginKind),
                    "unknown plugin kind, nothing injected"
                );
                continue;
            };
            let Some((document, base)) =
                locate(graph, documents, attachment.target_id, &mut HashSet::new())
            else {
                tracing::debug!(
                    plugin = attachment.plugin_id,
                    target = attachment.target_id,
                    "attachment target has no document, skipped"
                );
                continue;
            };
            planned.push(Planned {
                attachment,
                handler,
                document,
                base,
            });
        }
        planned
    }
}

/// Find the document and path where `node_id`'s values landed.
///
/// Resource nodes own a whole document. Reference nodes are followed up their
/// outbound reference edges to the holder embedding them, then down to the
/// placeholder's position.
fn locate<'g>(
    graph: &'g Graph,
    documents: &[Document],
    node_id: &'g str,
    visited: &mut HashSet<&'g str>,
) -> Option<(usize, FieldPath)> {
    if !visited.insert(node_id) {
        return None;
    }
    let node = graph.node(node_id)?;
    match &node.data {
        NodeData::Resource(_) => documents
            .iter()
            .position(|d| d.origin == Origin::Resource && d.node_id == node_id)
            .map(|index| (index, FieldPath::root())),
        NodeData::Reference(_) => graph.reference_targets(node_id).find_map(|holder_id| {
            let local = find_placeholder(graph.node(holder_id)?.values()?, node_id)?;
            let (index, base) = locate(graph, documents, holder_id, visited)?;
            Some((index, base.join(&local)))
        }),
        NodeData::Plugin(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use kanvas_core::{Edge, Node};
    use serde_json::{json, Value as JsonValue};

    fn two_containers() -> Node {
        Node::resource(
            "web",
            "Deployment",
            json!({
                "metadata": {"name": "web", "namespace": "shop"},
                "spec": {"replicas": 2, "template": {"spec": {"containers": [
                    {"name": "app", "image": "shop:1.0"},
                    {"name": "sidecar", "image": "envoy:1.29"}
                ]}}}
            }),
        )
    }

    fn run(graph: &Graph) -> Vec<Document> {
        let mut docs = resolve(graph);
        Injector::with_defaults().inject(graph, &mut docs);
        docs
    }

    fn pod(docs: &[Document]) -> &JsonValue {
        &docs[0].value["spec"]["template"]["spec"]
    }

    #[test]
    fn test_secret_scoped_to_named_container() {
        let mut graph = Graph::new(
            vec![two_containers(), Node::plugin("creds", "secret", json!({"secretName": "db"}))],
            vec![],
        );
        graph.attach("creds", "web", Some("app"));

        let docs = run(&graph);
        assert_eq!(
            pod(&docs)["containers"][0]["envFrom"],
            json!([{"secretRef": {"name": "db"}}])
        );
        assert!(pod(&docs)["containers"][1].get("envFrom").is_none());

        graph
            .node_mut("web")
            .unwrap()
            .set_plugin_container("creds", Some("sidecar".into()));
        let docs = run(&graph);
        assert!(pod(&docs)["containers"][0].get("envFrom").is_none());
        assert_eq!(
            pod(&docs)["containers"][1]["envFrom"],
            json!([{"secretRef": {"name": "db"}}])
        );
    }

    #[test]
    fn test_unmatched_container_falls_back_to_root() {
        let mut graph = Graph::new(
            vec![two_containers(), Node::plugin("creds", "secret", json!({"secretName": "db"}))],
            vec![],
        );
        graph.attach("creds", "web", Some("nope"));

        let docs = run(&graph);
        assert_eq!(docs[0].value["envFrom"], json!([{"secretRef": {"name": "db"}}]));
        assert!(pod(&docs)["containers"][0].get("envFrom").is_none());
    }

    #[test]
    fn test_storage_replaces_stale_volumes() {
        let mut deployment = two_containers();
        if let NodeData::Resource(r) = &mut deployment.data {
            r.values["spec"]["template"]["spec"]["volumes"] = json!([{"name": "stale", "emptyDir": {}}]);
            r.values["spec"]["template"]["spec"]["containers"][0]["volumeMounts"] =
                json!([{"name": "stale", "mountPath": "/old"}]);
        }
        let mut graph = Graph::new(
            vec![
                deployment,
                Node::plugin("pvc", "storage", json!({"name": "uploads", "mountPath": "/uploads"})),
            ],
            vec![],
        );
        graph.attach("pvc", "web", Some("app"));

        let docs = run(&graph);
        assert_eq!(
            pod(&docs)["volumes"],
            json!([{"name": "uploads", "persistentVolumeClaim": {"claimName": "uploads"}}])
        );
        assert_eq!(
            pod(&docs)["containers"][0]["volumeMounts"],
            json!([{"name": "uploads", "mountPath": "/uploads"}])
        );
    }

    #[test]
    fn test_no_accumulation_when_storage_is_swapped() {
        let mut graph = Graph::new(
            vec![
                two_containers(),
                Node::plugin("first", "storage", json!({"name": "data"})),
                Node::plugin("second", "storage", json!({"name": "data", "mountPath": "/srv"})),
            ],
            vec![],
        );
        graph.attach("first", "web", Some("app"));
        run(&graph);
        graph.detach("first", "web");
        graph.attach("second", "web", Some("app"));

        let docs = run(&graph);
        assert_eq!(pod(&docs)["volumes"].as_array().unwrap().len(), 1);
        assert_eq!(
            pod(&docs)["containers"][0]["volumeMounts"],
            json!([{"name": "data", "mountPath": "/srv"}])
        );
        assert_eq!(run(&graph), docs);
    }

    #[test]
    fn test_pod_and_metadata_scopes() {
        let mut graph = Graph::new(
            vec![
                two_containers(),
                Node::plugin("reg", "registry", json!({"secretName": "ghcr"})),
                Node::plugin("sa", "serviceAccount", json!({"name": "web-sa"})),
                Node::plugin("mon", "monitoring", json!({"port": 9090})),
            ],
            vec![],
        );
        graph.attach("reg", "web", None);
        graph.attach("sa", "web", None);
        graph.attach("mon", "web", None);

        let docs = run(&graph);
        assert_eq!(pod(&docs)["imagePullSecrets"], json!([{"name": "ghcr"}]));
        assert_eq!(pod(&docs)["serviceAccountName"], "web-sa");
        assert_eq!(
            docs[0].value["metadata"]["annotations"],
            json!({
                "prometheus.io/scrape": "true",
                "prometheus.io/port": "9090",
                "prometheus.io/path": "/metrics"
            })
        );
    }

    #[test]
    fn test_logging_sidecar() {
        let mut graph = Graph::new(
            vec![two_containers(), Node::plugin("logs", "logging", json!({}))],
            vec![],
        );
        graph.attach("logs", "web", None);

        let docs = run(&graph);
        let containers = pod(&docs)["containers"].as_array().unwrap();
        assert_eq!(containers.len(), 3);
        assert_eq!(containers[2]["name"], "log-shipper");
        assert_eq!(
            containers[0]["volumeMounts"],
            json!([{"name": "app-logs", "mountPath": "/var/log/app"}])
        );
        assert!(containers[1].get("volumeMounts").is_none());
        assert_eq!(pod(&docs)["volumes"], json!([{"name": "app-logs", "emptyDir": {}}]));
    }

    #[test]
    fn test_database_env() {
        let mut graph = Graph::new(
            vec![
                two_containers(),
                Node::plugin(
                    "db",
                    "database",
                    json!({"engine": "mysql", "host": "mysql.shop", "databaseName": "orders", "secretName": "mysql-creds"}),
                ),
            ],
            vec![],
        );
        graph.attach("db", "web", Some("app"));

        let docs = run(&graph);
        assert_eq!(
            pod(&docs)["containers"][0]["env"],
            json!([
                {"name": "DB_HOST", "value": "mysql.shop"},
                {"name": "DB_PORT", "value": "3306"},
                {"name": "DB_NAME", "value": "orders"},
                {"name": "DB_PASSWORD", "valueFrom": {"secretKeyRef": {"name": "mysql-creds", "key": "password"}}}
            ])
        );
    }

    #[test]
    fn test_ingress_emits_new_document() {
        let mut graph = Graph::new(
            vec![
                two_containers(),
                Node::plugin("edge", "ingress", json!({"host": "shop.example.com", "servicePort": 8080})),
            ],
            vec![],
        );
        graph.attach("edge", "web", None);

        let docs = run(&graph);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].node_id, "edge");
        assert_eq!(docs[1].origin, Origin::Plugin { target: "web".into() });
        assert_eq!(
            docs[1].value,
            json!({
                "apiVersion": "networking.k8s.io/v1",
                "kind": "Ingress",
                "metadata": {"name": "web-ingress", "namespace": "shop"},
                "spec": {"rules": [{
                    "host": "shop.example.com",
                    "http": {"paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": {"service": {"name": "web", "port": {"number": 8080}}}
                    }]}
                }]}
            })
        );
        assert!(docs[0].value.get("spec").unwrap().get("rules").is_none());
    }

    #[test]
    fn test_attachment_to_reference_node() {
        let mut graph = Graph::new(
            vec![
                Node::resource(
                    "web",
                    "Deployment",
                    json!({"metadata": {"name": "web"}, "spec": {"template": {"spec": {"containers": ["#ref-app"]}}}}),
                ),
                Node::reference("app", "Deployment", "containers", json!({"name": "app", "image": "shop:1.0"})),
                Node::plugin("creds", "secret", json!({"secretName": "db"})),
                Node::plugin("reg", "registry", json!({"secretName": "ghcr"})),
            ],
            vec![Edge::new("app", "web")],
        );
        graph.attach("creds", "app", None);
        graph.attach("reg", "app", None);

        let docs = run(&graph);
        assert_eq!(
            pod(&docs)["containers"][0]["envFrom"],
            json!([{"secretRef": {"name": "db"}}])
        );
        assert_eq!(pod(&docs)["imagePullSecrets"], json!([{"name": "ghcr"}]));
    }

    #[test]
    fn test_dangling_and_unknown_attachments_are_skipped() {
        let graph = Graph::new(
            vec![
                two_containers(),
                Node::plugin("ghost", "secret", json!({"secretName": "x"})),
                Node::plugin("future", "quantumTunnel", json!({})),
            ],
            vec![Edge::new("ghost", "missing"), Edge::new("future", "web")],
        );

        let docs = run(&graph);
        assert_eq!(docs, resolve(&graph));
    }

    struct TeamLabel(Scope);

    impl AttachmentHandler for TeamLabel {
        fn kind(&self) -> &'static str {
            "teamLabel"
        }

        fn scope(&self) -> Scope {
            self.0
        }

        fn inject(&self, site: &mut InjectionSite<'_>, _attachment: &Attachment<'_>) {
            site.target_mut()["team"] = JsonValue::String("payments".into());
        }
    }

    #[test]
    fn test_declared_scope_picks_the_target() {
        let mut graph = Graph::new(
            vec![two_containers(), Node::plugin("label", "teamLabel", json!({}))],
            vec![],
        );
        graph.attach("label", "web", Some("sidecar"));

        let cases = [
            (Scope::Container, "/spec/template/spec/containers/1/team"),
            (Scope::Pod, "/spec/template/spec/team"),
            (Scope::Metadata, "/metadata/team"),
        ];
        for (scope, pointer) in cases {
            let mut registry = AttachmentRegistry::new();
            registry.register(TeamLabel(scope));
            let mut docs = resolve(&graph);
            Injector::new(registry).inject(&graph, &mut docs);
            assert_eq!(docs[0].value.pointer(pointer), Some(&json!("payments")), "{}", scope);
        }
    }

    #[test]
    fn test_monitoring_merges_into_existing_annotations() {
        let mut deployment = two_containers();
        if let NodeData::Resource(r) = &mut deployment.data {
            r.values["metadata"]["annotations"] = json!({"owner": "shop-team"});
        }
        let mut graph = Graph::new(
            vec![deployment, Node::plugin("mon", "monitoring", json!({"scrape": false}))],
            vec![],
        );
        graph.attach("mon", "web", None);

        let docs = run(&graph);
        assert_eq!(
            docs[0].value["metadata"]["annotations"],
            json!({
                "owner": "shop-team",
                "prometheus.io/scrape": "false",
                "prometheus.io/path": "/metrics"
            })
        );
    }

    #[test]
    fn test_injection_is_idempotent() {
        let mut graph = Graph::new(
            vec![
                two_containers(),
                Node::plugin("creds", "secret", json!({"secretName": "db"})),
                Node::plugin("logs", "logging", json!({})),
                Node::plugin("pvc", "storage", json!({"name": "data"})),
            ],
            vec![],
        );
        graph.attach("creds", "web", Some("app"));
        graph.attach("logs", "web", None);
        graph.attach("pvc", "web", Some("app"));

        assert_eq!(run(&graph), run(&graph));
    }
}
