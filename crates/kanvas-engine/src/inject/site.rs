//! Injection sites: where inside a resolved document an attachment lands

use kanvas_core::values::{ensure_path, get_path, get_path_mut};
use kanvas_core::FieldPath;
use serde_json::{Map, Value as JsonValue};

use super::registry::Scope;
use crate::workload;

/// One attachment's view of its target document
///
/// `base` is where the target node's values landed inside the document: the
/// root for a Resource node, the embedding field for a Reference node.
/// `scope` is the handler's declared scope and picks what [`target_mut`]
/// hands out.
///
/// [`target_mut`]: InjectionSite::target_mut
pub struct InjectionSite<'a> {
    document: &'a mut JsonValue,
    target_id: &'a str,
    scope: Scope,
    base: FieldPath,
    pod_spec: FieldPath,
    container: Option<FieldPath>,
    emitted: Vec<JsonValue>,
}

impl<'a> InjectionSite<'a> {
    /// Build a site. `container_name` is the slot's container scope, if any.
    pub fn new(
        document: &'a mut JsonValue,
        target_id: &'a str,
        scope: Scope,
        base: FieldPath,
        container_name: Option<&str>,
    ) -> Self {
        let pod_spec = pod_spec_for(document, &base);
        let container = container_name.and_then(|name| find_container(document, &pod_spec, name));
        if let (Some(name), None) = (container_name, &container) {
            tracing::debug!(target = target_id, container = name, "container not found, injecting at root");
        }
        Self {
            document,
            target_id,
            scope,
            base,
            pod_spec,
            container,
            emitted: Vec::new(),
        }
    }

    /// Id of the node the plugin is attached to
    pub fn target_id(&self) -> &str {
        self.target_id
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn document(&self) -> &JsonValue {
        self.document
    }

    /// `metadata.name` of the target document
    pub fn target_name(&self) -> Option<&str> {
        self.document
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(JsonValue::as_str)
    }

    /// `metadata.namespace` of the target document
    pub fn target_namespace(&self) -> Option<&str> {
        self.document
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(JsonValue::as_str)
    }

    pub fn base_path(&self) -> &FieldPath {
        &self.base
    }

    pub fn pod_spec_path(&self) -> &FieldPath {
        &self.pod_spec
    }

    /// The matched container, or the injection root when the slot names no
    /// container or the name matches nothing
    pub fn container_path(&self) -> &FieldPath {
        self.container.as_ref().unwrap_or(&self.base)
    }

    /// Container a pod-scoped sidecar should share data with: the named
    /// container, else the root when it is a container itself, else the first
    /// container of the pod spec
    pub fn app_container_path(&self) -> FieldPath {
        if let Some(path) = &self.container {
            return path.clone();
        }
        let root_is_container = self.base != self.pod_spec
            && get_path(self.document, &self.base).is_some_and(|v| v.get("image").is_some());
        if root_is_container {
            return self.base.clone();
        }
        let first = self.pod_spec.child("containers").child("0");
        if get_path(self.document, &first).is_some() {
            first
        } else {
            self.base.clone()
        }
    }

    /// Path of the value the site's scope points at. A document scope points
    /// at the target document's root; its fragment goes through [`emit`].
    ///
    /// [`emit`]: InjectionSite::emit
    pub fn target_path(&self) -> FieldPath {
        match self.scope {
            Scope::Container => self.container_path().clone(),
            Scope::Pod => self.pod_spec.clone(),
            Scope::Metadata => FieldPath::parse("metadata"),
            Scope::Document => FieldPath::root(),
        }
    }

    /// The value the site's scope points at, created as an object if missing
    pub fn target_mut(&mut self) -> &mut JsonValue {
        let path = self.target_path();
        self.at_mut(&path)
    }

    pub fn pod_spec_mut(&mut self) -> &mut JsonValue {
        let path = self.pod_spec.clone();
        self.at_mut(&path)
    }

    /// Value at an absolute document path, created as an object if missing
    pub fn at_mut(&mut self, path: &FieldPath) -> &mut JsonValue {
        let value = ensure_path(self.document, path);
        if !value.is_object() {
            *value = JsonValue::Object(Map::new());
        }
        value
    }

    /// Queue a new document for the output set
    pub fn emit(&mut self, document: JsonValue) {
        self.emitted.push(document);
    }

    pub fn into_emitted(self) -> Vec<JsonValue> {
        self.emitted
    }
}

/// Pod spec governing `base`: the kind's pod spec path when it overlaps the
/// base, else the nearest object under the base holding `containers`, else
/// the base itself
pub fn pod_spec_for(document: &JsonValue, base: &FieldPath) -> FieldPath {
    let kind = document.get("kind").and_then(JsonValue::as_str).unwrap_or_default();
    if let Some(path) = workload::pod_spec_path(kind) {
        if path.segments().starts_with(base.segments()) || base.segments().starts_with(path.segments()) {
            return path;
        }
    }
    get_path(document, base)
        .and_then(workload::find_containers_holder)
        .map(|found| base.join(&found))
        .unwrap_or_else(|| base.clone())
}

fn find_container(document: &JsonValue, pod_spec: &FieldPath, name: &str) -> Option<FieldPath> {
    let containers = pod_spec.child("containers");
    let index = get_path(document, &containers)?
        .as_array()?
        .iter()
        .position(|c| workload::container_name(c) == Some(name))?;
    Some(containers.child(index.to_string()))
}

/// Clear `volumes` on the pod spec and `volumeMounts` on every container and
/// on the base
pub fn strip_volumes(document: &mut JsonValue, base: &FieldPath, pod_spec: &FieldPath) {
    if let Some(JsonValue::Object(spec)) = get_path_mut(document, pod_spec) {
        spec.remove("volumes");
        for field in ["containers", "initContainers"] {
            if let Some(JsonValue::Array(containers)) = spec.get_mut(field) {
                for container in containers.iter_mut().filter_map(JsonValue::as_object_mut) {
                    container.remove("volumeMounts");
                }
            }
        }
    }
    if let Some(JsonValue::Object(root)) = get_path_mut(document, base) {
        root.remove("volumeMounts");
    }
}

/// Insert `entry` into the array `field` of `holder`, replacing an entry with
/// the same key
///
/// Entries are keyed by `name`, or for `envFrom` by the referenced object.
pub fn upsert_entry(holder: &mut JsonValue, field: &str, entry: JsonValue) {
    if !holder.is_object() {
        *holder = JsonValue::Object(Map::new());
    }
    let Some(map) = holder.as_object_mut() else {
        return;
    };
    let slot = map
        .entry(field.to_string())
        .or_insert_with(|| JsonValue::Array(Vec::new()));
    if !slot.is_array() {
        *slot = JsonValue::Array(Vec::new());
    }
    let Some(items) = slot.as_array_mut() else {
        return;
    };

    let position = entry_key(&entry).and_then(|key| {
        items
            .iter()
            .position(|item| entry_key(item).as_deref() == Some(key.as_str()))
    });
    match position {
        Some(i) => items[i] = entry,
        None => items.push(entry),
    }
}

fn entry_key(entry: &JsonValue) -> Option<String> {
    if let Some(name) = entry.get("name").and_then(JsonValue::as_str) {
        return Some(name.to_string());
    }
    ["secretRef", "configMapRef"].iter().find_map(|source| {
        entry
            .get(source)
            .and_then(|r| r.get("name"))
            .and_then(JsonValue::as_str)
            .map(|name| format!("{}:{}", source, name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> JsonValue {
        json!({
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {"template": {"spec": {
                "containers": [
                    {"name": "app", "image": "nginx", "volumeMounts": [{"name": "old"}]},
                    {"name": "sidecar", "image": "busybox"}
                ],
                "volumes": [{"name": "old"}]
            }}}
        })
    }

    #[test]
    fn test_pod_spec_for_workloads_and_fragments() {
        let doc = deployment();
        assert_eq!(pod_spec_for(&doc, &FieldPath::root()).to_string(), "spec.template.spec");
        assert_eq!(
            pod_spec_for(&doc, &FieldPath::parse("spec.template.spec.containers.0")).to_string(),
            "spec.template.spec"
        );

        let custom = json!({"kind": "Rollout", "spec": {"template": {"spec": {"containers": []}}}});
        assert_eq!(pod_spec_for(&custom, &FieldPath::root()).to_string(), "spec.template.spec");
        assert!(pod_spec_for(&json!({"kind": "Service"}), &FieldPath::root()).is_empty());
    }

    #[test]
    fn test_container_lookup_and_fallback() {
        let mut doc = deployment();
        let site = InjectionSite::new(&mut doc, "d", Scope::Container, FieldPath::root(), Some("sidecar"));
        assert_eq!(site.container_path().to_string(), "spec.template.spec.containers.1");

        let site = InjectionSite::new(&mut doc, "d", Scope::Container, FieldPath::root(), Some("missing"));
        assert!(site.container_path().is_empty());
        assert_eq!(site.app_container_path().to_string(), "spec.template.spec.containers.0");
    }

    #[test]
    fn test_target_follows_scope() {
        let mut doc = deployment();
        let target = |doc: &mut JsonValue, scope| {
            InjectionSite::new(doc, "d", scope, FieldPath::root(), Some("sidecar"))
                .target_path()
                .to_string()
        };
        assert_eq!(target(&mut doc, Scope::Container), "spec.template.spec.containers.1");
        assert_eq!(target(&mut doc, Scope::Pod), "spec.template.spec");
        assert_eq!(target(&mut doc, Scope::Metadata), "metadata");
        assert_eq!(target(&mut doc, Scope::Document), "");

        let mut site = InjectionSite::new(&mut doc, "d", Scope::Pod, FieldPath::root(), None);
        site.target_mut()["hostNetwork"] = JsonValue::Bool(true);
        assert_eq!(doc["spec"]["template"]["spec"]["hostNetwork"], true);
    }

    #[test]
    fn test_strip_volumes() {
        let mut doc = deployment();
        strip_volumes(&mut doc, &FieldPath::root(), &FieldPath::parse("spec.template.spec"));
        let spec = &doc["spec"]["template"]["spec"];
        assert!(spec.get("volumes").is_none());
        assert!(spec["containers"][0].get("volumeMounts").is_none());
        assert_eq!(spec["containers"][0]["image"], "nginx");
    }

    #[test]
    fn test_upsert_entry_replaces_by_key() {
        let mut container = json!({"name": "app"});
        upsert_entry(&mut container, "envFrom", json!({"secretRef": {"name": "db"}}));
        upsert_entry(&mut container, "envFrom", json!({"configMapRef": {"name": "db"}}));
        upsert_entry(&mut container, "envFrom", json!({"secretRef": {"name": "db"}}));
        assert_eq!(container["envFrom"].as_array().unwrap().len(), 2);

        upsert_entry(&mut container, "env", json!({"name": "A", "value": "1"}));
        upsert_entry(&mut container, "env", json!({"name": "A", "value": "2"}));
        assert_eq!(container["env"], json!([{"name": "A", "value": "2"}]));
    }

    #[test]
    fn test_upsert_entry_replaces_non_array_field() {
        let mut pod = json!({"volumes": "broken"});
        upsert_entry(&mut pod, "volumes", json!({"name": "data"}));
        assert_eq!(pod["volumes"], json!([{"name": "data"}]));
    }
}
