//! Container-level workload rules: resources, images, probes, security

use kanvas_core::FieldPath;
use serde_json::Value as JsonValue;

use super::{Finding, Level, Rule, RuleInput, Workload};
use crate::error::RuleResult;
use crate::quantity::{parse_cpu, parse_memory};
use crate::workload::{container_name, is_batch};

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "missing-resources",
            level: Level::Danger,
            title: "Missing resource requests",
            check: missing_resources,
        },
        Rule {
            id: "missing-limits",
            level: Level::Warn,
            title: "Missing resource limits",
            check: missing_limits,
        },
        Rule {
            id: "limits-below-requests",
            level: Level::Danger,
            title: "Limit lower than request",
            check: limits_below_requests,
        },
        Rule {
            id: "unsafe-image-tag",
            level: Level::Danger,
            title: "Unsafe image tag",
            check: unsafe_image_tag,
        },
        Rule {
            id: "image-pull-policy",
            level: Level::Warn,
            title: "Image pull policy not set",
            check: image_pull_policy,
        },
        Rule {
            id: "missing-liveness-probe",
            level: Level::Danger,
            title: "Missing liveness probe",
            check: missing_liveness_probe,
        },
        Rule {
            id: "missing-readiness-probe",
            level: Level::Danger,
            title: "Missing readiness probe",
            check: missing_readiness_probe,
        },
        Rule {
            id: "missing-security-context",
            level: Level::Danger,
            title: "Missing securityContext",
            check: missing_security_context,
        },
        Rule {
            id: "run-as-root",
            level: Level::Danger,
            title: "Runs as root",
            check: run_as_root,
        },
        Rule {
            id: "privileged-container",
            level: Level::Danger,
            title: "Privileged container",
            check: privileged_container,
        },
        Rule {
            id: "privilege-escalation",
            level: Level::Warn,
            title: "Privilege escalation allowed",
            check: privilege_escalation,
        },
        Rule {
            id: "capabilities-without-drop",
            level: Level::Warn,
            title: "Capabilities added without dropping ALL",
            check: capabilities_without_drop,
        },
        Rule {
            id: "writable-root-fs",
            level: Level::Warn,
            title: "Writable root filesystem",
            check: writable_root_fs,
        },
    ]
}

/// Run `check` on each container of a workload, returning the first finding
fn each_container<F>(input: &RuleInput<'_>, mut check: F) -> RuleResult<Option<Finding>>
where
    F: FnMut(&Workload<'_>, &FieldPath, &str, &JsonValue) -> Option<Finding>,
{
    let Some(workload) = input.workload() else {
        return Ok(None);
    };
    for (path, container) in workload.containers()? {
        let name = container_name(container).unwrap_or("unnamed");
        if let Some(finding) = check(&workload, &path, name, container) {
            return Ok(Some(finding));
        }
    }
    Ok(None)
}

fn field<'a>(container: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    kanvas_core::values::get_path(container, &FieldPath::parse(path))
}

fn missing_keys(section: Option<&JsonValue>) -> Vec<&'static str> {
    ["cpu", "memory"]
        .into_iter()
        .filter(|key| section.and_then(|s| s.get(key)).is_none_or(JsonValue::is_null))
        .collect()
}

fn missing_resources(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        let missing = missing_keys(field(container, "resources.requests"));
        (!missing.is_empty()).then(|| {
            Finding::new(
                path.child("resources").child("requests"),
                format!("Container '{}' has no {} request", name, missing.join(" or ")),
            )
        })
    })
}

fn missing_limits(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        let missing = missing_keys(field(container, "resources.limits"));
        (!missing.is_empty()).then(|| {
            Finding::new(
                path.child("resources").child("limits"),
                format!("Container '{}' has no {} limit", name, missing.join(" or ")),
            )
        })
    })
}

fn limits_below_requests(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    type Parser = fn(&JsonValue) -> Option<f64>;
    let resources: [(&str, Parser); 2] = [("cpu", parse_cpu), ("memory", parse_memory)];

    each_container(input, |_, path, name, container| {
        resources.iter().find_map(|(resource, parse)| {
            let limit_value = field(container, &format!("resources.limits.{}", resource))?;
            let request_value = field(container, &format!("resources.requests.{}", resource))?;
            // Unparsable quantities are not comparable
            let limit = parse(limit_value)?;
            let request = parse(request_value)?;
            (limit < request).then(|| {
                Finding::new(
                    path.child("resources").child("limits").child(*resource),
                    format!(
                        "Container '{}' {} limit {} is lower than its request {}",
                        name,
                        resource,
                        display(limit_value),
                        display(request_value)
                    ),
                )
            })
        })
    })
}

fn display(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Tag classification of an image reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageTag {
    Pinned,
    Latest,
    Untagged,
}

fn image_tag(image: &str) -> ImageTag {
    if image.contains('@') {
        return ImageTag::Pinned;
    }
    // A registry port (`host:5000/app`) sits before the last slash
    let last = image.rsplit('/').next().unwrap_or(image);
    match last.split_once(':') {
        Some((_, "latest")) => ImageTag::Latest,
        Some((_, "")) | None => ImageTag::Untagged,
        Some(_) => ImageTag::Pinned,
    }
}

fn unsafe_image_tag(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        let image = container.get("image")?.as_str()?;
        let problem = match image_tag(image) {
            ImageTag::Pinned => return None,
            ImageTag::Latest => "uses the mutable ':latest' tag",
            ImageTag::Untagged => "has no tag and resolves to ':latest'",
        };
        Some(
            Finding::new(
                path.child("image"),
                format!("Container '{}' image '{}' {}", name, image, problem),
            )
            .with_hint("Pin a version tag or digest"),
        )
    })
}

fn image_pull_policy(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        container.get("imagePullPolicy").is_none().then(|| {
            Finding::new(
                path.child("imagePullPolicy"),
                format!("Container '{}' does not set imagePullPolicy", name),
            )
        })
    })
}

fn missing_probe(input: &RuleInput<'_>, probe: &str, what: &str) -> RuleResult<Option<Finding>> {
    if input.workload().is_some_and(|w| is_batch(w.kind)) {
        return Ok(None);
    }
    each_container(input, |_, path, name, container| {
        container.get(probe).is_none().then(|| {
            Finding::new(
                path.child(probe),
                format!("Container '{}' has no {} probe", name, what),
            )
        })
    })
}

fn missing_liveness_probe(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    missing_probe(input, "livenessProbe", "liveness")
}

fn missing_readiness_probe(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    missing_probe(input, "readinessProbe", "readiness")
}

fn missing_security_context(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |workload, path, name, container| {
        let has_context =
            container.get("securityContext").is_some() || workload.pod_field("securityContext").is_some();
        (!has_context).then(|| {
            Finding::new(
                path.child("securityContext"),
                format!("Container '{}' has no securityContext", name),
            )
        })
    })
}

fn run_as_root(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |workload, path, name, container| {
        let own = field(container, "securityContext.runAsUser");
        let (value, at) = match own {
            Some(v) => (v, path.child("securityContext").child("runAsUser")),
            None => (
                field(workload.pod_spec?, "securityContext.runAsUser")?,
                workload.pod_spec_path.child("securityContext").child("runAsUser"),
            ),
        };
        (value.as_u64() == Some(0)).then(|| {
            Finding::new(at, format!("Container '{}' runs as root (runAsUser: 0)", name))
        })
    })
}

fn security_flag(container: &JsonValue, flag: &str) -> bool {
    field(container, &format!("securityContext.{}", flag)).and_then(JsonValue::as_bool) == Some(true)
}

fn privileged_container(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        security_flag(container, "privileged").then(|| {
            Finding::new(
                path.child("securityContext").child("privileged"),
                format!("Container '{}' runs privileged", name),
            )
        })
    })
}

fn privilege_escalation(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        security_flag(container, "allowPrivilegeEscalation").then(|| {
            Finding::new(
                path.child("securityContext").child("allowPrivilegeEscalation"),
                format!("Container '{}' allows privilege escalation", name),
            )
        })
    })
}

fn capabilities_without_drop(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        let added = field(container, "securityContext.capabilities.add")?.as_array()?;
        if added.is_empty() {
            return None;
        }
        let drops_all = field(container, "securityContext.capabilities.drop")
            .and_then(JsonValue::as_array)
            .is_some_and(|drop| drop.iter().any(|c| c.as_str() == Some("ALL")));
        (!drops_all).then(|| {
            Finding::new(
                path.child("securityContext").child("capabilities").child("drop"),
                format!("Container '{}' adds capabilities without dropping ALL", name),
            )
        })
    })
}

fn writable_root_fs(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    each_container(input, |_, path, name, container| {
        container.get("securityContext")?;
        (!security_flag(container, "readOnlyRootFilesystem")).then(|| {
            Finding::new(
                path.child("securityContext").child("readOnlyRootFilesystem"),
                format!("Container '{}' has a writable root filesystem", name),
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanvas_core::{Graph, Node, ValidationContext};
    use serde_json::json;

    fn check(rule: fn(&RuleInput<'_>) -> RuleResult<Option<Finding>>, kind: &str, pod: JsonValue) -> Option<Finding> {
        let graph = Graph::new(vec![Node::resource("d", kind, json!({}))], vec![]);
        let document = if kind == "Pod" {
            json!({"kind": kind, "spec": pod})
        } else {
            json!({"kind": kind, "spec": {"template": {"spec": pod}}})
        };
        let context = ValidationContext::default();
        let input = RuleInput {
            node: &graph.nodes[0],
            index: 0,
            graph: &graph,
            document: Some(&document),
            documents: &[],
            context: &context,
        };
        rule(&input).unwrap()
    }

    fn hardened() -> JsonValue {
        json!({
            "name": "app",
            "image": "shop:1.4.2",
            "imagePullPolicy": "IfNotPresent",
            "resources": {
                "requests": {"cpu": "100m", "memory": "128Mi"},
                "limits": {"cpu": "500m", "memory": "256Mi"}
            },
            "livenessProbe": {"httpGet": {"path": "/healthz", "port": 8080}},
            "readinessProbe": {"httpGet": {"path": "/ready", "port": 8080}},
            "securityContext": {
                "runAsNonRoot": true,
                "allowPrivilegeEscalation": false,
                "readOnlyRootFilesystem": true,
                "capabilities": {"drop": ["ALL"]}
            }
        })
    }

    #[test]
    fn test_hardened_container_passes_every_rule() {
        for rule in rules() {
            let finding = check(rule.check, "Deployment", json!({"containers": [hardened()]}));
            assert_eq!(finding, None, "{}", rule.id);
        }
    }

    #[test]
    fn test_missing_requests_names_the_gap() {
        let mut container = hardened();
        container["resources"]["requests"] = json!({"cpu": "100m"});
        let finding = check(missing_resources, "Deployment", json!({"containers": [container]})).unwrap();
        assert_eq!(
            finding.path.to_string(),
            "spec.template.spec.containers.0.resources.requests"
        );
        assert_eq!(finding.message, "Container 'app' has no memory request");
    }

    #[test]
    fn test_limits_below_requests_is_unit_aware() {
        let mut container = hardened();
        container["resources"]["limits"]["memory"] = json!("100M");
        let finding = check(limits_below_requests, "Deployment", json!({"containers": [container]})).unwrap();
        assert_eq!(
            finding.path.to_string(),
            "spec.template.spec.containers.0.resources.limits.memory"
        );

        let mut container = hardened();
        container["resources"]["limits"]["cpu"] = json!("0.05");
        let finding = check(limits_below_requests, "Deployment", json!({"containers": [container]})).unwrap();
        assert!(finding.message.contains("cpu limit 0.05"));
    }

    #[test]
    fn test_unparsable_quantities_are_skipped() {
        let mut container = hardened();
        container["resources"]["limits"]["memory"] = json!("lots");
        assert!(check(limits_below_requests, "Deployment", json!({"containers": [container]})).is_none());
    }

    #[test]
    fn test_image_tags() {
        assert_eq!(image_tag("nginx:latest"), ImageTag::Latest);
        assert_eq!(image_tag("nginx"), ImageTag::Untagged);
        assert_eq!(image_tag("registry:5000/team/app"), ImageTag::Untagged);
        assert_eq!(image_tag("registry:5000/team/app:1.2"), ImageTag::Pinned);
        assert_eq!(image_tag("nginx@sha256:abc"), ImageTag::Pinned);
    }

    #[test]
    fn test_reports_first_offending_container() {
        let mut second = hardened();
        second["name"] = json!("worker");
        second["image"] = json!("worker:latest");
        let finding = check(unsafe_image_tag, "Pod", json!({"containers": [hardened(), second]})).unwrap();
        assert_eq!(finding.path.to_string(), "spec.containers.1.image");
        assert!(finding.message.contains("'worker'"));
    }

    #[test]
    fn test_probes_not_required_for_jobs() {
        let mut container = hardened();
        container.as_object_mut().unwrap().remove("livenessProbe");
        let pod = json!({"containers": [container]});
        assert!(check(missing_liveness_probe, "Job", pod.clone()).is_none());
        assert!(check(missing_liveness_probe, "Deployment", pod).is_some());
    }

    #[test]
    fn test_pod_security_context_counts() {
        let mut container = hardened();
        container.as_object_mut().unwrap().remove("securityContext");
        let pod = json!({"securityContext": {"runAsUser": 0}, "containers": [container]});
        assert!(check(missing_security_context, "Deployment", pod.clone()).is_none());

        let finding = check(run_as_root, "Deployment", pod).unwrap();
        assert_eq!(finding.path.to_string(), "spec.template.spec.securityContext.runAsUser");
    }

    #[test]
    fn test_security_flags() {
        let mut container = hardened();
        container["securityContext"]["privileged"] = json!(true);
        container["securityContext"]["allowPrivilegeEscalation"] = json!(true);
        container["securityContext"]["readOnlyRootFilesystem"] = json!(false);
        container["securityContext"]["capabilities"] = json!({"add": ["NET_ADMIN"], "drop": ["MKNOD"]});
        let pod = json!({"containers": [container]});

        assert!(check(privileged_container, "Deployment", pod.clone()).is_some());
        assert!(check(privilege_escalation, "Deployment", pod.clone()).is_some());
        assert!(check(writable_root_fs, "Deployment", pod.clone()).is_some());
        assert!(check(capabilities_without_drop, "Deployment", pod).is_some());
    }

    #[test]
    fn test_non_workloads_are_ignored() {
        let graph = Graph::new(vec![Node::resource("s", "Service", json!({}))], vec![]);
        let document = json!({"kind": "Service", "spec": {"containers": [{"image": "x:latest"}]}});
        let context = ValidationContext::default();
        let input = RuleInput {
            node: &graph.nodes[0],
            index: 0,
            graph: &graph,
            document: Some(&document),
            documents: &[],
            context: &context,
        };
        assert_eq!(unsafe_image_tag(&input).unwrap(), None);
    }
}
