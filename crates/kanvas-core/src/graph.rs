//! Graph model
//!
//! The editor hands the engine a snapshot of typed nodes and directed edges.
//! Three node variants matter:
//!
//! - **Resource** nodes are the roots of output documents (one Kubernetes object each)
//! - **Reference** nodes hold a fragment factored out of another node's values
//! - **Plugin** nodes describe a cross-cutting capability attached to a target
//!
//! # Example
//!
//! ```yaml
//! nodes:
//!   - id: web
//!     type: resource
//!     kind: Deployment
//!     apiVersion: apps/v1
//!     values:
//!       metadata: { name: web }
//!       spec: "#ref-web-spec"
//!     plugins:
//!       - sourceNodeId: db-secret
//!         sourceNodeType: secret
//!         containerName: app
//!   - id: web-spec
//!     type: reference
//!     ownerKind: Deployment
//!     fieldName: spec
//!     values: { replicas: 2 }
//!   - id: db-secret
//!     type: plugin
//!     pluginKind: secret
//!     config: { secretName: db-credentials }
//! edges:
//!   - source: web-spec
//!     target: web
//!     targetHandle: spec
//!   - source: db-secret
//!     target: web
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CoreError, Result};

/// A node on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id
    pub id: String,

    #[serde(flatten)]
    pub data: NodeData,
}

/// Variant-specific node payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeData {
    Resource(ResourceNode),
    Reference(ReferenceNode),
    Plugin(PluginNode),
}

/// Root of one output document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    /// Kubernetes kind (e.g. `Deployment`)
    pub kind: String,

    /// Declared apiVersion, if the user set one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kubernetes-shaped values, possibly containing placeholders
    #[serde(default = "empty_object")]
    pub values: JsonValue,

    /// Plugins attached to this node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginSlot>,
}

/// A fragment factored out of another node's values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceNode {
    /// Kind of the resource this fragment belongs to
    pub owner_kind: String,

    /// Field of the owner this fragment stands for
    pub field_name: String,

    #[serde(default = "empty_object")]
    pub values: JsonValue,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginSlot>,
}

/// A cross-cutting capability (secret, volume, sidecar, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginNode {
    /// Plugin kind tag (e.g. `secret`, `storage`, `ingress`)
    pub plugin_kind: String,

    #[serde(default = "empty_object")]
    pub config: JsonValue,
}

impl PluginNode {
    /// Read a string config entry, treating empty strings as unset
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Read a config entry that may be written as a number or a numeric string
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        match self.config.get(key)? {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read a boolean config entry
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        match self.config.get(key)? {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Record of one plugin attached to a target node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSlot {
    pub source_node_id: String,
    pub source_node_type: String,

    /// Container the plugin is scoped to, for container-scoped kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

impl Node {
    /// Create a resource node
    pub fn resource(id: impl Into<String>, kind: impl Into<String>, values: JsonValue) -> Self {
        Self {
            id: id.into(),
            data: NodeData::Resource(ResourceNode {
                kind: kind.into(),
                api_version: None,
                values,
                plugins: Vec::new(),
            }),
        }
    }

    /// Create a reference node
    pub fn reference(
        id: impl Into<String>,
        owner_kind: impl Into<String>,
        field_name: impl Into<String>,
        values: JsonValue,
    ) -> Self {
        Self {
            id: id.into(),
            data: NodeData::Reference(ReferenceNode {
                owner_kind: owner_kind.into(),
                field_name: field_name.into(),
                values,
                plugins: Vec::new(),
            }),
        }
    }

    /// Create a plugin node
    pub fn plugin(id: impl Into<String>, plugin_kind: impl Into<String>, config: JsonValue) -> Self {
        Self {
            id: id.into(),
            data: NodeData::Plugin(PluginNode {
                plugin_kind: plugin_kind.into(),
                config,
            }),
        }
    }

    /// Set the declared apiVersion (resource nodes only)
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        if let NodeData::Resource(resource) = &mut self.data {
            resource.api_version = Some(api_version.into());
        }
        self
    }

    pub fn as_resource(&self) -> Option<&ResourceNode> {
        match &self.data {
            NodeData::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceNode> {
        match &self.data {
            NodeData::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_plugin(&self) -> Option<&PluginNode> {
        match &self.data {
            NodeData::Plugin(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.data, NodeData::Resource(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.data, NodeData::Reference(_))
    }

    pub fn is_plugin(&self) -> bool {
        matches!(self.data, NodeData::Plugin(_))
    }

    /// Raw values of a resource or reference node
    pub fn values(&self) -> Option<&JsonValue> {
        match &self.data {
            NodeData::Resource(r) => Some(&r.values),
            NodeData::Reference(r) => Some(&r.values),
            NodeData::Plugin(_) => None,
        }
    }

    /// Plugin slots recorded on this node
    pub fn plugin_slots(&self) -> &[PluginSlot] {
        match &self.data {
            NodeData::Resource(r) => &r.plugins,
            NodeData::Reference(r) => &r.plugins,
            NodeData::Plugin(_) => &[],
        }
    }

    fn plugin_slots_mut(&mut self) -> Option<&mut Vec<PluginSlot>> {
        match &mut self.data {
            NodeData::Resource(r) => Some(&mut r.plugins),
            NodeData::Reference(r) => Some(&mut r.plugins),
            NodeData::Plugin(_) => None,
        }
    }

    /// Record a plugin attachment.
    ///
    /// Returns `false` without changing anything when the node already holds a
    /// slot for the same source, or when the node cannot hold slots.
    pub fn attach_plugin(&mut self, slot: PluginSlot) -> bool {
        let Some(slots) = self.plugin_slots_mut() else {
            return false;
        };
        if slots.iter().any(|s| s.source_node_id == slot.source_node_id) {
            return false;
        }
        slots.push(slot);
        true
    }

    /// Remove the slot for `source_id`. Returns whether a slot was removed.
    pub fn detach_plugin(&mut self, source_id: &str) -> bool {
        let Some(slots) = self.plugin_slots_mut() else {
            return false;
        };
        let before = slots.len();
        slots.retain(|s| s.source_node_id != source_id);
        slots.len() != before
    }

    /// Change the container a plugin is scoped to
    pub fn set_plugin_container(&mut self, source_id: &str, container: Option<String>) -> bool {
        let Some(slot) = self
            .plugin_slots_mut()
            .and_then(|slots| slots.iter_mut().find(|s| s.source_node_id == source_id))
        else {
            return false;
        };
        slot.container_name = container;
        true
    }

    /// Slot recorded for a given plugin source
    pub fn plugin_slot(&self, source_id: &str) -> Option<&PluginSlot> {
        self.plugin_slots()
            .iter()
            .find(|s| s.source_node_id == source_id)
    }

    /// Kubernetes kind of a resource node, or the owner kind of a reference node
    pub fn kind(&self) -> Option<&str> {
        match &self.data {
            NodeData::Resource(r) => Some(&r.kind),
            NodeData::Reference(r) => Some(&r.owner_kind),
            NodeData::Plugin(_) => None,
        }
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            source_handle: None,
            target: target.into(),
            target_handle: None,
        }
    }

    pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }
}

/// An attachment edge paired with its plugin node
#[derive(Debug, Clone, Copy)]
pub struct Attachment<'a> {
    pub plugin_id: &'a str,
    pub plugin: &'a PluginNode,
    pub target_id: &'a str,
}

/// A snapshot of the editor graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Load a snapshot from a YAML or JSON file (JSON is valid YAML)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::SnapshotNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let graph = if path.extension().is_some_and(|e| e == "json") {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        Ok(graph)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let graph: Self = serde_yaml::from_str(yaml)?;
        graph.check_unique_ids()?;
        Ok(graph)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let graph: Self = serde_json::from_str(json)?;
        graph.check_unique_ids()?;
        Ok(graph)
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(CoreError::InvalidSnapshot {
                    message: format!("duplicate node id '{}'", node.id),
                });
            }
        }
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Reference node by id (other variants yield `None`)
    pub fn reference(&self, id: &str) -> Option<&ReferenceNode> {
        self.node(id).and_then(Node::as_reference)
    }

    /// Resource nodes, in snapshot order
    pub fn resource_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_resource())
    }

    /// Resource nodes of the given kind
    pub fn resources_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Node> {
        self.resource_nodes().filter(move |n| n.kind() == Some(kind))
    }

    /// Whether a live reference edge runs from `source` into `target`.
    ///
    /// Only edges whose source is a Reference node count.
    pub fn is_linked(&self, source: &str, target: &str) -> bool {
        self.reference(source).is_some()
            && self
                .edges
                .iter()
                .any(|e| e.source == source && e.target == target)
    }

    /// Targets of the live reference edges leaving `source`
    pub fn reference_targets<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a str> {
        let is_reference = self.reference(source).is_some();
        self.edges
            .iter()
            .filter(move |e| is_reference && e.source == source)
            .map(|e| e.target.as_str())
    }

    /// Attachment edges (plugin source), one per `(plugin, target)` pair,
    /// in edge order
    pub fn attachments(&self) -> Vec<Attachment<'_>> {
        let mut seen = HashSet::new();
        let mut attachments = Vec::new();

        for edge in &self.edges {
            let Some(plugin) = self.node(&edge.source).and_then(Node::as_plugin) else {
                continue;
            };
            if !seen.insert((edge.source.as_str(), edge.target.as_str())) {
                continue;
            }
            attachments.push(Attachment {
                plugin_id: &edge.source,
                plugin,
                target_id: &edge.target,
            });
        }

        attachments
    }

    /// Add an edge unless an identical `(source, target)` edge exists
    pub fn connect(&mut self, edge: Edge) -> bool {
        if self
            .edges
            .iter()
            .any(|e| e.source == edge.source && e.target == edge.target)
        {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Remove every edge from `source` to `target`
    pub fn disconnect(&mut self, source: &str, target: &str) -> bool {
        let before = self.edges.len();
        self.edges
            .retain(|e| !(e.source == source && e.target == target));
        self.edges.len() != before
    }

    /// Attach a plugin node to a target: records the slot and the edge.
    ///
    /// Returns `false` when the pair was already attached.
    pub fn attach(&mut self, plugin_id: &str, target_id: &str, container: Option<&str>) -> bool {
        let Some(plugin_kind) = self
            .node(plugin_id)
            .and_then(Node::as_plugin)
            .map(|p| p.plugin_kind.clone())
        else {
            return false;
        };
        let Some(target) = self.node_mut(target_id) else {
            return false;
        };
        let recorded = target.attach_plugin(PluginSlot {
            source_node_id: plugin_id.to_string(),
            source_node_type: plugin_kind,
            container_name: container.map(str::to_string),
        });
        let connected = self.connect(Edge::new(plugin_id, target_id));
        recorded || connected
    }

    /// Detach a plugin from a target: removes the slot and the edge
    pub fn detach(&mut self, plugin_id: &str, target_id: &str) -> bool {
        let slot_removed = self
            .node_mut(target_id)
            .is_some_and(|t| t.detach_plugin(plugin_id));
        let edge_removed = self.disconnect(plugin_id, target_id);
        slot_removed || edge_removed
    }
}
