//! Kubernetes kind knowledge shared by the injector and the rules

use kanvas_core::FieldPath;
use serde_json::Value as JsonValue;

/// Kinds whose documents embed a pod template
pub const WORKLOAD_KINDS: &[&str] = &[
    "Pod",
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "Job",
    "CronJob",
];

/// Kinds that are not namespaced
pub const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "Node",
    "PersistentVolume",
    "StorageClass",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "PriorityClass",
    "IngressClass",
    "ValidatingWebhookConfiguration",
    "MutatingWebhookConfiguration",
    "APIService",
];

pub fn is_workload(kind: &str) -> bool {
    WORKLOAD_KINDS.contains(&kind)
}

pub fn is_batch(kind: &str) -> bool {
    matches!(kind, "Job" | "CronJob")
}

pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Where the pod spec lives in a document of the given kind
pub fn pod_spec_path(kind: &str) -> Option<FieldPath> {
    let path = match kind {
        "Pod" => "spec",
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" => "spec.template.spec",
        "CronJob" => "spec.jobTemplate.spec.template.spec",
        _ => return None,
    };
    Some(FieldPath::parse(path))
}

/// apiVersion used when a resource node does not declare one
pub fn default_api_version(kind: &str) -> &'static str {
    match kind {
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "ControllerRevision" => {
            "apps/v1"
        }
        "Job" | "CronJob" => "batch/v1",
        "Ingress" | "IngressClass" | "NetworkPolicy" => "networking.k8s.io/v1",
        "HorizontalPodAutoscaler" => "autoscaling/v2",
        "PodDisruptionBudget" => "policy/v1",
        "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => {
            "rbac.authorization.k8s.io/v1"
        }
        "StorageClass" => "storage.k8s.io/v1",
        "CustomResourceDefinition" => "apiextensions.k8s.io/v1",
        "PriorityClass" => "scheduling.k8s.io/v1",
        _ => "v1",
    }
}

/// Find the nearest object (breadth-first) holding a `containers` array
pub fn find_containers_holder(value: &JsonValue) -> Option<FieldPath> {
    let mut queue = std::collections::VecDeque::from([(FieldPath::root(), value)]);
    while let Some((path, current)) = queue.pop_front() {
        match current {
            JsonValue::Object(map) => {
                if map.get("containers").is_some_and(JsonValue::is_array) {
                    return Some(path);
                }
                for (key, child) in map {
                    queue.push_back((path.child(key.clone()), child));
                }
            }
            JsonValue::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    queue.push_back((path.child(i.to_string()), child));
                }
            }
            _ => {}
        }
    }
    None
}

/// Name of a container entry
pub fn container_name(container: &JsonValue) -> Option<&str> {
    container.get("name").and_then(JsonValue::as_str)
}
