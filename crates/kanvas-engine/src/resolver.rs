//! Reference resolution
//!
//! Expands `#ref-<id>` placeholders into the values of the referenced
//! Reference node. A placeholder only expands when a live reference edge runs
//! from that Reference node into the node holding the placeholder; anything
//! else (missing node, removed edge, a non-Reference source, a cycle)
//! resolves to `{}` so a half-wired graph still produces an inspectable
//! document.

use kanvas_core::{Graph, Node, NodeData, Placeholder};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::workload;

/// Where an output document came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Origin {
    /// Materialized from a Resource node
    Resource,
    /// Generated by a plugin attached to `target`
    Plugin { target: String },
}

/// One materialized output document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Resource node (or generating plugin node) this document belongs to
    pub node_id: String,
    pub origin: Origin,
    pub value: JsonValue,
}

impl Document {
    pub fn kind(&self) -> Option<&str> {
        self.value.get("kind").and_then(JsonValue::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(JsonValue::as_str)
    }
}

/// Resolve every Resource node into a document, in snapshot order
pub fn resolve(graph: &Graph) -> Vec<Document> {
    graph
        .resource_nodes()
        .filter_map(|node| {
            resolve_document(graph, node).map(|value| Document {
                node_id: node.id.clone(),
                origin: Origin::Resource,
                value,
            })
        })
        .collect()
}

/// Resolve one Resource node into a complete document with `apiVersion`
/// and `kind` first. Returns `None` for other node variants.
pub fn resolve_document(graph: &Graph, node: &Node) -> Option<JsonValue> {
    let NodeData::Resource(resource) = &node.data else {
        return None;
    };

    let values = resolve_node(graph, node);
    let api_version = resource
        .api_version
        .clone()
        .or_else(|| {
            values
                .get("apiVersion")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| workload::default_api_version(&resource.kind).to_string());

    let mut doc = Map::new();
    doc.insert("apiVersion".to_string(), JsonValue::String(api_version));
    doc.insert("kind".to_string(), JsonValue::String(resource.kind.clone()));
    if let JsonValue::Object(map) = values {
        for (key, value) in map {
            if key != "apiVersion" && key != "kind" {
                doc.insert(key, value);
            }
        }
    }
    Some(JsonValue::Object(doc))
}

/// Resolve the values of a Resource or Reference node, expanding placeholders.
/// Plugin nodes resolve to `{}`.
pub fn resolve_node(graph: &Graph, node: &Node) -> JsonValue {
    let Some(values) = node.values() else {
        return JsonValue::Object(Map::new());
    };
    let mut stack = vec![node.id.as_str()];
    resolve_value(graph, values, &node.id, &mut stack)
}

fn resolve_value<'g>(
    graph: &'g Graph,
    value: &JsonValue,
    holder: &str,
    stack: &mut Vec<&'g str>,
) -> JsonValue {
    match value {
        JsonValue::String(_) => match Placeholder::from_value(value) {
            Some(placeholder) => expand(graph, placeholder.node_id(), holder, stack),
            None => value.clone(),
        },
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| resolve_value(graph, item, holder, stack))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(graph, v, holder, stack)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn expand<'g>(graph: &'g Graph, id: &str, holder: &str, stack: &mut Vec<&'g str>) -> JsonValue {
    let Some(node) = graph.node(id).filter(|n| n.is_reference()) else {
        tracing::debug!(placeholder = id, holder, "placeholder has no reference node");
        return JsonValue::Object(Map::new());
    };
    if !graph.is_linked(id, holder) {
        tracing::debug!(placeholder = id, holder, "reference node is not connected");
        return JsonValue::Object(Map::new());
    }
    if stack.contains(&node.id.as_str()) {
        tracing::debug!(placeholder = id, holder, "reference cycle");
        return JsonValue::Object(Map::new());
    }

    stack.push(&node.id);
    let values = node.values().cloned().unwrap_or_default();
    let resolved = resolve_value(graph, &values, &node.id, stack);
    stack.pop();
    resolved
}
