//! Value trees and field paths
//!
//! Node values are free-form `serde_json::Value` trees. [`FieldPath`] is the
//! dot-delimited address used throughout the engine (`containers.0.image`),
//! and the helpers below walk, create and merge subtrees along it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::placeholder::Placeholder;

/// A path into a value tree, one segment per key or array index
///
/// Parsing accepts both `containers[0].image` and `containers.0.image`;
/// indices are always stored as numeric segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path (the root of a tree)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path with optional `[n]` index notation
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = path.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                    let index: String = chars.by_ref().take_while(|c| *c != ']').collect();
                    let index = index.trim();
                    if !index.is_empty() {
                        segments.push(index.to_string());
                    }
                }
                _ => current.push(c),
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }

        Self(segments)
    }

    /// Build a path from segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a key segment
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    /// Append an array index segment
    pub fn push_index(&mut self, index: usize) {
        self.0.push(index.to_string());
    }

    /// Return a new path with `segment` appended
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Return a new path with `other` appended
    pub fn join(&self, other: &FieldPath) -> Self {
        let mut path = self.clone();
        path.0.extend(other.0.iter().cloned());
        path
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Deep merge `overlay` into `base`
///
/// Objects merge recursively; arrays and scalars in the overlay replace the
/// base value.
pub fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Step into one segment of a value: object key or array index
pub fn step<'a>(value: &'a JsonValue, segment: &str) -> Option<&'a JsonValue> {
    match value {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Mutable counterpart of [`step`]
pub fn step_mut<'a>(value: &'a mut JsonValue, segment: &str) -> Option<&'a mut JsonValue> {
    match value {
        JsonValue::Object(map) => map.get_mut(segment),
        JsonValue::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Get a nested value by path, stepping through objects and arrays
pub fn get_path<'a>(value: &'a JsonValue, path: &FieldPath) -> Option<&'a JsonValue> {
    path.segments()
        .iter()
        .try_fold(value, |current, segment| step(current, segment))
}

/// Mutable counterpart of [`get_path`]
pub fn get_path_mut<'a>(value: &'a mut JsonValue, path: &FieldPath) -> Option<&'a mut JsonValue> {
    path.segments()
        .iter()
        .try_fold(value, |current, segment| step_mut(current, segment))
}

/// Walk `path`, creating objects for missing or non-container segments.
/// Existing array elements are stepped into by index.
pub fn ensure_path<'a>(value: &'a mut JsonValue, path: &FieldPath) -> &'a mut JsonValue {
    let mut current = value;
    for segment in path.segments() {
        let index = match &*current {
            JsonValue::Array(items) => segment.parse::<usize>().ok().filter(|i| *i < items.len()),
            _ => None,
        };
        if index.is_none() && !current.is_object() {
            *current = JsonValue::Object(serde_json::Map::new());
        }
        current = match (current, index) {
            (JsonValue::Array(items), Some(i)) => &mut items[i],
            (JsonValue::Object(map), _) => map
                .entry(segment.clone())
                .or_insert_with(|| JsonValue::Object(serde_json::Map::new())),
            // Scalars were replaced by an object above
            (other, _) => other,
        };
    }
    current
}

/// Find the path of the first placeholder pointing at `node_id`
///
/// Depth-first, objects in key order, arrays in index order.
pub fn find_placeholder(value: &JsonValue, node_id: &str) -> Option<FieldPath> {
    fn walk(value: &JsonValue, node_id: &str, path: &mut FieldPath) -> bool {
        match value {
            JsonValue::String(_) => {
                Placeholder::from_value(value).is_some_and(|p| p.node_id() == node_id)
            }
            JsonValue::Object(map) => {
                for (key, child) in map {
                    path.push(key.clone());
                    if walk(child, node_id, path) {
                        return true;
                    }
                    path.0.pop();
                }
                false
            }
            JsonValue::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push_index(i);
                    if walk(child, node_id, path) {
                        return true;
                    }
                    path.0.pop();
                }
                false
            }
            _ => false,
        }
    }

    let mut path = FieldPath::root();
    walk(value, node_id, &mut path).then_some(path)
}

/// Every placeholder in a value tree with its path, depth-first
pub fn placeholders(value: &JsonValue) -> Vec<(FieldPath, String)> {
    fn walk(value: &JsonValue, path: &mut FieldPath, found: &mut Vec<(FieldPath, String)>) {
        match value {
            JsonValue::String(_) => {
                if let Some(placeholder) = Placeholder::from_value(value) {
                    found.push((path.clone(), placeholder.node_id().to_string()));
                }
            }
            JsonValue::Object(map) => {
                for (key, child) in map {
                    path.push(key.clone());
                    walk(child, path, found);
                    path.0.pop();
                }
            }
            JsonValue::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push_index(i);
                    walk(child, path, found);
                    path.0.pop();
                }
            }
            _ => {}
        }
    }

    let mut found = Vec::new();
    walk(value, &mut FieldPath::root(), &mut found);
    found
}
