//! Reference placeholders
//!
//! A field whose value lives in another node is stored as the string
//! `#ref-<nodeId>`. This module is the only place that knows that shape:
//! everything else asks [`Placeholder::from_value`] and works with the typed
//! result.

use serde_json::Value as JsonValue;
use std::fmt;

/// Prefix marking a value as an indirect reference to another node
pub const PLACEHOLDER_PREFIX: &str = "#ref-";

/// A parsed `#ref-<id>` placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placeholder<'a> {
    node_id: &'a str,
}

impl<'a> Placeholder<'a> {
    /// Parse a placeholder string. Returns `None` for anything that is not
    /// `#ref-` followed by at least one character.
    pub fn parse(s: &'a str) -> Option<Self> {
        s.strip_prefix(PLACEHOLDER_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|node_id| Self { node_id })
    }

    /// Parse a placeholder out of a JSON value (only strings qualify)
    pub fn from_value(value: &'a JsonValue) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }

    /// Id of the referenced node
    pub fn node_id(&self) -> &'a str {
        self.node_id
    }

    /// Build the placeholder string for a node id
    pub fn format(node_id: &str) -> String {
        format!("{}{}", PLACEHOLDER_PREFIX, node_id)
    }

    /// Build the placeholder as a JSON string value
    pub fn to_value(node_id: &str) -> JsonValue {
        JsonValue::String(Self::format(node_id))
    }
}

impl fmt::Display for Placeholder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PLACEHOLDER_PREFIX, self.node_id)
    }
}
