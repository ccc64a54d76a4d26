//! Field-owner resolution
//!
//! The inverse of [`crate::resolver`]: maps a path inside a resolved document
//! back to the graph node whose raw values hold that field, so a warning can
//! point at the node the user actually has to edit.
//!
//! The walk runs over *raw* values. Whenever the value under the cursor is a
//! placeholder for a connected Reference node, the walk jumps into that node
//! and the local path starts again from its root.

use kanvas_core::values::step;
use kanvas_core::{FieldPath, Graph, Node, Placeholder};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// The node owning a field, and the field's path relative to that node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOwner {
    pub node_id: String,
    pub local_path: FieldPath,
}

impl FieldOwner {
    fn new(node_id: &str, local_path: FieldPath) -> Self {
        Self {
            node_id: node_id.to_string(),
            local_path,
        }
    }
}

/// Find the owner of `path` inside `node`'s resolved document.
///
/// Never fails: if the path cannot be walked to the end, the last node reached
/// is returned with the unconsumed segments appended to its local path.
pub fn owner_of(graph: &Graph, node: &Node, path: &FieldPath) -> FieldOwner {
    let Some(values) = node.values() else {
        return FieldOwner::new(&node.id, path.clone());
    };

    let mut owner: &Node = node;
    let mut current: &JsonValue = values;
    let mut local = FieldPath::root();
    let mut visited: HashSet<&str> = HashSet::from([node.id.as_str()]);

    let segments = path.segments();
    for (consumed, segment) in segments.iter().enumerate() {
        if let Some((next, values)) = follow(graph, owner, current, &mut visited) {
            owner = next;
            current = values;
            local = FieldPath::root();
        }

        match step(current, segment) {
            Some(child) => {
                current = child;
                local.push(segment.clone());
            }
            None => {
                let rest = FieldPath::from_segments(segments[consumed..].iter().cloned());
                return FieldOwner::new(&owner.id, local.join(&rest));
            }
        }
    }

    // The addressed field itself may be factored out
    if let Some((next, _)) = follow(graph, owner, current, &mut visited) {
        return FieldOwner::new(&next.id, FieldPath::root());
    }

    FieldOwner::new(&owner.id, local)
}

/// If `value` is a placeholder for a Reference node linked into `holder`,
/// return that node and its raw values.
fn follow<'g>(
    graph: &'g Graph,
    holder: &Node,
    value: &JsonValue,
    visited: &mut HashSet<&'g str>,
) -> Option<(&'g Node, &'g JsonValue)> {
    let placeholder = Placeholder::from_value(value)?;
    let target = graph.node(placeholder.node_id())?;
    if !target.is_reference() || !graph.is_linked(&target.id, &holder.id) {
        return None;
    }
    if !visited.insert(target.id.as_str()) {
        tracing::debug!(node = %target.id, "reference cycle while resolving field owner");
        return None;
    }
    Some((target, target.values()?))
}
