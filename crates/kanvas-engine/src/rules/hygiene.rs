//! Resource hygiene: namespaces, replicas, config map contents, service accounts

use kanvas_core::FieldPath;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::{Finding, Level, Rule, RuleInput};
use crate::error::RuleResult;
use crate::resolver;
use crate::workload::is_cluster_scoped;

/// Key names that look like credentials
static SECRET_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(password|passwd|secret|token|api[_-]?key|private[_-]?key|credential|access[_-]?key)",
    )
    .expect("valid secret key regex")
});

const SCALABLE_KINDS: &[&str] = &["Deployment", "StatefulSet", "ReplicaSet"];

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "default-namespace",
            level: Level::Warn,
            title: "Default namespace",
            check: default_namespace,
        },
        Rule {
            id: "hardcoded-replicas",
            level: Level::Warn,
            title: "Hardcoded replica count",
            check: hardcoded_replicas,
        },
        Rule {
            id: "secret-in-configmap",
            level: Level::Danger,
            title: "Secret in ConfigMap",
            check: secret_in_configmap,
        },
        Rule {
            id: "missing-service-account",
            level: Level::Warn,
            title: "No service account",
            check: missing_service_account,
        },
    ]
}

fn metadata_str<'a>(document: &'a JsonValue, key: &str) -> Option<&'a str> {
    document
        .get("metadata")
        .and_then(|m| m.get(key))
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}

fn default_namespace(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    let Some((kind, document)) = input.resource() else {
        return Ok(None);
    };
    if is_cluster_scoped(kind) {
        return Ok(None);
    }
    let message = match metadata_str(document, "namespace") {
        None => format!("{} has no namespace and will land in 'default'", kind),
        Some("default") => format!("{} is deployed to the 'default' namespace", kind),
        Some(_) => return Ok(None),
    };
    Ok(Some(Finding::new(FieldPath::parse("metadata.namespace"), message)))
}

fn hardcoded_replicas(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    let Some((kind, document)) = input.resource() else {
        return Ok(None);
    };
    if !SCALABLE_KINDS.contains(&kind) {
        return Ok(None);
    }
    let Some(replicas) = document.get("spec").and_then(|s| s.get("replicas")) else {
        return Ok(None);
    };
    if replicas.is_null() {
        return Ok(None);
    }

    let name = metadata_str(document, "name");
    if let Some(name) = name {
        if has_autoscaler(input, kind, name) {
            return Ok(None);
        }
    }

    Ok(Some(
        Finding::new(
            FieldPath::parse("spec.replicas"),
            format!(
                "{} '{}' pins replicas to {} and no HorizontalPodAutoscaler targets it",
                kind,
                name.unwrap_or("unnamed"),
                replicas
            ),
        )
        .with_hint("Add a HorizontalPodAutoscaler or drop spec.replicas"),
    ))
}

/// Whether an HPA in the graph scales `kind`/`name`
fn has_autoscaler(input: &RuleInput<'_>, kind: &str, name: &str) -> bool {
    input
        .graph
        .resources_of_kind("HorizontalPodAutoscaler")
        .filter_map(|hpa| resolver::resolve_document(input.graph, hpa))
        .any(|hpa| {
            let Some(target) = hpa.get("spec").and_then(|s| s.get("scaleTargetRef")) else {
                return false;
            };
            let name_matches = target.get("name").and_then(JsonValue::as_str) == Some(name);
            let kind_matches = target
                .get("kind")
                .and_then(JsonValue::as_str)
                .is_none_or(|k| k == kind);
            name_matches && kind_matches
        })
}

fn secret_in_configmap(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    let Some(("ConfigMap", document)) = input.resource() else {
        return Ok(None);
    };
    for section in ["data", "binaryData"] {
        let Some(data) = document.get(section).and_then(JsonValue::as_object) else {
            continue;
        };
        if let Some(key) = data.keys().find(|key| SECRET_KEY.is_match(key)) {
            let name = metadata_str(document, "name").unwrap_or("unnamed");
            return Ok(Some(
                Finding::new(
                    FieldPath::from_segments([section, key.as_str()]),
                    format!("ConfigMap '{}' key '{}' looks like a secret", name, key),
                )
                .with_hint("Move it to a Secret and attach it with a secret plugin"),
            ));
        }
    }
    Ok(None)
}

fn missing_service_account(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    let Some(workload) = input.workload() else {
        return Ok(None);
    };
    let set = ["serviceAccountName", "serviceAccount"].iter().any(|field| {
        workload
            .pod_field(field)
            .and_then(JsonValue::as_str)
            .is_some_and(|s| !s.is_empty())
    });
    if set {
        return Ok(None);
    }
    Ok(Some(Finding::new(
        workload.pod_spec_path.child("serviceAccountName"),
        format!("{} pods run with the namespace's default service account", workload.kind),
    )))
}
