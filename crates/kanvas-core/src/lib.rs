//! Kanvas Core - graph model and shared types for the manifest canvas
//!
//! This crate provides the foundational types used throughout Kanvas:
//! - `Graph`: the editor snapshot of typed nodes and edges
//! - `Placeholder`: the `#ref-<id>` indirection boundary
//! - `FieldPath`: value-tree addressing, plus deep merge helpers
//! - `ValidationContext`: target version, schema catalog, silenced rules
//! - `ProjectConfig`: `kanvas.yaml` project settings
//! - `Bundle`: multi-file archive packaging with a checksum manifest

pub mod bundle;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod placeholder;
pub mod values;

pub use bundle::{Bundle, BundleFile};
pub use config::{CONFIG_FILE_NAME, ProjectConfig};
pub use context::{
    Deprecation, DeprecationStatus, GroupVersionKind, KubeVersion, SchemaCatalog,
    ValidationContext,
};
pub use error::{CoreError, Result};
pub use graph::{
    Attachment, Edge, Graph, Node, NodeData, PluginNode, PluginSlot, ReferenceNode, ResourceNode,
};
pub use manifest::{Manifest, VerificationResult};
pub use placeholder::Placeholder;
pub use values::FieldPath;
