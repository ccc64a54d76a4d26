//! Kanvas Engine - resolution, injection and validation of canvas graphs
//!
//! This crate turns a graph snapshot into Kubernetes documents and warnings:
//! - `resolver`: expands `#ref-<id>` placeholders into complete documents
//! - `inject`: merges attached plugin fragments into those documents
//! - `rules`: runs the built-in rule set and produces banded warnings
//! - `owner`: maps a document path back to the node that holds it
//! - `pipeline`: one pass of all three, from the raw graph every time

pub mod error;
pub mod inject;
pub mod owner;
pub mod pipeline;
pub mod quantity;
pub mod resolver;
pub mod rules;
pub mod suggestions;
pub mod workload;

pub use error::{RuleError, RuleResult};
pub use inject::{AttachmentHandler, AttachmentRegistry, InjectionSite, Injector, Scope};
pub use owner::{FieldOwner, owner_of};
pub use pipeline::{Pipeline, PipelineOutput};
pub use resolver::{Document, Origin, resolve, resolve_document, resolve_node};
pub use rules::{Finding, Level, Rule, RuleEngine, RuleInput, Warning};
pub use suggestions::{SuggestionCategory, did_you_mean};
