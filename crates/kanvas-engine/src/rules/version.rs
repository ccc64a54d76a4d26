//! Version awareness: deprecated and unknown API versions

use kanvas_core::{DeprecationStatus, FieldPath, GroupVersionKind};
use serde_json::Value as JsonValue;

use super::{Finding, Level, Rule, RuleInput};
use crate::error::RuleResult;
use crate::suggestions::{did_you_mean, SuggestionCategory};

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "deprecated-api",
            level: Level::Warn,
            title: "Deprecated API version",
            check: deprecated_api,
        },
        Rule {
            id: "unknown-kind",
            level: Level::Danger,
            title: "Resource not available in target version",
            check: unknown_kind,
        },
    ]
}

fn gvk(input: &RuleInput<'_>) -> Option<GroupVersionKind> {
    let (kind, document) = input.resource()?;
    let api_version = document.get("apiVersion").and_then(JsonValue::as_str)?;
    Some(GroupVersionKind::from_api_version(api_version, kind))
}

fn deprecated_api(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    let Some(gvk) = gvk(input) else {
        return Ok(None);
    };
    let target = &input.context.project_version;
    let Some(deprecation) = input.context.deprecation_for(&gvk) else {
        return Ok(None);
    };

    let (level, state) = match deprecation.status_at(target) {
        None => return Ok(None),
        Some(DeprecationStatus::Deprecated) => (
            Level::Warn,
            format!("is deprecated since Kubernetes {}", deprecation.deprecated_in),
        ),
        Some(DeprecationStatus::Removed) => (
            Level::Danger,
            match &deprecation.removed_in {
                Some(removed) => format!("was removed in Kubernetes {}", removed),
                None => "was removed".to_string(),
            },
        ),
    };

    let mut finding = Finding::new(
        FieldPath::parse("apiVersion"),
        format!("{} {} (target {})", gvk, state, target),
    )
    .with_level(level);
    if let Some(replacement) = deprecation.replacement_api_version() {
        finding = finding.with_hint(format!("Use apiVersion: {}", replacement));
    } else if let Some(note) = &deprecation.note {
        finding = finding.with_hint(note.clone());
    }
    Ok(Some(finding))
}

fn unknown_kind(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    let Some(catalog) = input.context.catalog.as_ref().filter(|c| !c.kinds.is_empty()) else {
        return Ok(None);
    };
    let Some(gvk) = gvk(input) else {
        return Ok(None);
    };
    if catalog.knows(&gvk) {
        return Ok(None);
    }
    // Already reported as removed
    let removed = input
        .context
        .deprecation_for(&gvk)
        .and_then(|d| d.status_at(&input.context.project_version))
        == Some(DeprecationStatus::Removed);
    if removed {
        return Ok(None);
    }

    let served: Vec<String> = catalog.versions_of(&gvk.kind).map(|k| k.api_version()).collect();
    let (path, hint) = if served.is_empty() {
        let kinds = catalog.kinds.iter().map(|k| k.kind.as_str());
        (
            FieldPath::parse("kind"),
            did_you_mean(&gvk.kind, kinds, SuggestionCategory::Kind),
        )
    } else {
        (
            FieldPath::parse("apiVersion"),
            Some(format!("{} is served as: {}", gvk.kind, served.join(", "))),
        )
    };

    let mut finding = Finding::new(
        path,
        format!(
            "{} is not served by Kubernetes {}",
            gvk, input.context.project_version
        ),
    );
    if let Some(hint) = hint {
        finding = finding.with_hint(hint);
    }
    Ok(Some(finding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanvas_core::{Graph, KubeVersion, Node, SchemaCatalog, ValidationContext};
    use serde_json::json;

    fn check(
        rule: fn(&RuleInput<'_>) -> RuleResult<Option<Finding>>,
        kind: &str,
        api_version: &str,
        context: &ValidationContext,
    ) -> Option<Finding> {
        let graph = Graph::new(vec![Node::resource("n", kind, json!({}))], vec![]);
        let document = json!({"apiVersion": api_version, "kind": kind});
        let input = RuleInput {
            node: &graph.nodes[0],
            index: 0,
            graph: &graph,
            document: Some(&document),
            documents: &[],
            context,
        };
        rule(&input).unwrap()
    }

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::from_yaml(
            r#"
kinds:
  - { group: apps, version: v1, kind: Deployment }
  - { group: "", version: v1, kind: Service }
  - { group: networking.k8s.io, version: v1, kind: Ingress }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deprecated_then_removed() {
        let at = |minor| ValidationContext::new(KubeVersion::new(1, minor));

        assert!(check(deprecated_api, "Ingress", "networking.k8s.io/v1beta1", &at(18)).is_none());

        let finding = check(deprecated_api, "Ingress", "networking.k8s.io/v1beta1", &at(20)).unwrap();
        assert_eq!(finding.level, Some(Level::Warn));
        assert_eq!(finding.hint.as_deref(), Some("Use apiVersion: networking.k8s.io/v1"));

        let finding = check(deprecated_api, "Ingress", "networking.k8s.io/v1beta1", &at(29)).unwrap();
        assert_eq!(finding.level, Some(Level::Danger));
        assert!(finding.message.contains("was removed in Kubernetes 1.22"));
        assert_eq!(finding.path.to_string(), "apiVersion");
    }

    #[test]
    fn test_current_api_is_fine() {
        let ctx = ValidationContext::default();
        assert!(check(deprecated_api, "Deployment", "apps/v1", &ctx).is_none());
    }

    #[test]
    fn test_unknown_kind_needs_catalog() {
        let ctx = ValidationContext::default();
        assert!(check(unknown_kind, "Deploymnt", "apps/v1", &ctx).is_none());
    }

    #[test]
    fn test_unknown_kind_suggests_close_kind() {
        let ctx = ValidationContext::default().with_catalog(catalog());
        let finding = check(unknown_kind, "Deploymnt", "apps/v1", &ctx).unwrap();
        assert_eq!(finding.path.to_string(), "kind");
        assert_eq!(finding.hint.as_deref(), Some("Did you mean `Deployment`?"));
        assert!(check(unknown_kind, "Service", "v1", &ctx).is_none());
    }

    #[test]
    fn test_unknown_version_lists_served_versions() {
        let ctx = ValidationContext::default().with_catalog(catalog());
        let finding = check(unknown_kind, "Ingress", "networking.k8s.io/v2", &ctx).unwrap();
        assert_eq!(finding.path.to_string(), "apiVersion");
        assert_eq!(
            finding.hint.as_deref(),
            Some("Ingress is served as: networking.k8s.io/v1")
        );
    }

    #[test]
    fn test_removed_api_is_left_to_deprecation_rule() {
        let ctx = ValidationContext::default().with_catalog(catalog());
        assert!(check(unknown_kind, "Ingress", "extensions/v1beta1", &ctx).is_none());
    }
}
