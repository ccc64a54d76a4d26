//! Validation rule engine
//!
//! An ordered list of independent rules, each run once per `(rule, node)`
//! pair. A rule looks at one node (usually its resolved document) and
//! returns at most one [`Finding`]; the engine turns findings into
//! [`Warning`]s, resolving the owning node of the cited field and assigning
//! ids from a fresh [`WarningSequence`].
//!
//! A rule that errors or panics is logged and contributes nothing, so one
//! broken rule never hides the others.

mod container;
mod hygiene;
mod reference;
mod version;
mod warning;

pub use warning::{Level, Warning, WarningSequence};

use kanvas_core::{FieldPath, Graph, Node, ValidationContext};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{RuleError, RuleResult};
use crate::owner::{owner_of, FieldOwner};
use crate::resolver::{self, Document, Origin};
use crate::workload;

/// A rule's check function
pub type RuleCheck = fn(&RuleInput<'_>) -> RuleResult<Option<Finding>>;

/// One validation rule
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Stable short id, used to silence the rule
    pub id: &'static str,
    /// Default level of its warnings
    pub level: Level,
    pub title: &'static str,
    pub check: RuleCheck,
}

/// What a rule sees for one node
pub struct RuleInput<'a> {
    pub node: &'a Node,
    /// Position of the node in the snapshot
    pub index: usize,
    pub graph: &'a Graph,
    /// The node's resolved (and injected) document, for Resource nodes
    pub document: Option<&'a JsonValue>,
    /// Every document of the pass
    pub documents: &'a [Document],
    pub context: &'a ValidationContext,
}

impl<'a> RuleInput<'a> {
    /// Kind and document of a Resource node
    pub fn resource(&self) -> Option<(&'a str, &'a JsonValue)> {
        let kind = self.node.as_resource()?.kind.as_str();
        Some((kind, self.document?))
    }

    /// Pod-template view of a workload Resource node
    pub fn workload(&self) -> Option<Workload<'a>> {
        let (kind, document) = self.resource()?;
        let pod_spec_path = workload::pod_spec_path(kind)?;
        Some(Workload {
            kind,
            document,
            pod_spec: kanvas_core::values::get_path(document, &pod_spec_path),
            pod_spec_path,
        })
    }
}

/// A workload document and its pod spec
pub struct Workload<'a> {
    pub kind: &'a str,
    pub document: &'a JsonValue,
    pub pod_spec_path: FieldPath,
    pub pod_spec: Option<&'a JsonValue>,
}

impl<'a> Workload<'a> {
    /// Containers of the pod spec with their document paths
    pub fn containers(&self) -> RuleResult<Vec<(FieldPath, &'a JsonValue)>> {
        let path = self.pod_spec_path.child("containers");
        let Some(containers) = self.pod_spec.and_then(|spec| spec.get("containers")) else {
            return Ok(Vec::new());
        };
        let items = containers
            .as_array()
            .ok_or_else(|| RuleError::unexpected_shape(path.to_string(), "an array"))?;

        items
            .iter()
            .enumerate()
            .map(|(i, container)| {
                let container_path = path.child(i.to_string());
                if container.is_object() {
                    Ok((container_path, container))
                } else {
                    Err(RuleError::unexpected_shape(container_path.to_string(), "an object"))
                }
            })
            .collect()
    }

    /// Field of the pod spec
    pub fn pod_field(&self, field: &str) -> Option<&'a JsonValue> {
        self.pod_spec.and_then(|spec| spec.get(field))
    }
}

/// What a rule reports before it becomes a [`Warning`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Path inside the node's document, or inside `owner` when set
    pub path: FieldPath,
    pub message: String,
    /// Overrides the rule's default level
    pub level: Option<Level>,
    /// Node the path is relative to, when the rule already knows it
    pub owner: Option<String>,
    pub hint: Option<String>,
}

impl Finding {
    pub fn new(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            level: None,
            owner: None,
            hint: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn owned_by(mut self, node_id: impl Into<String>) -> Self {
        self.owner = Some(node_id.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Ordered rule list
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Engine with every built-in rule
    pub fn with_defaults() -> Self {
        let mut rules = container::rules();
        rules.extend(hygiene::rules());
        rules.extend(version::rules());
        rules.extend(reference::rules());
        Self::new(rules)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.id)
    }

    /// Run every rule against every node.
    ///
    /// `documents` are the resolved and injected documents of this pass.
    /// A Resource node without one is resolved on the spot.
    pub fn evaluate(
        &self,
        graph: &Graph,
        documents: &[Document],
        context: &ValidationContext,
    ) -> Vec<Warning> {
        let mut sequence = WarningSequence::new();
        let mut warnings = Vec::new();

        for (index, node) in graph.nodes.iter().enumerate() {
            let existing = documents
                .iter()
                .find(|d| d.origin == Origin::Resource && d.node_id == node.id)
                .map(|d| &d.value);
            let fallback = match existing {
                None if node.is_resource() => resolver::resolve_document(graph, node),
                _ => None,
            };
            let input = RuleInput {
                node,
                index,
                graph,
                document: existing.or(fallback.as_ref()),
                documents,
                context,
            };

            for rule in &self.rules {
                if context.is_ignored(rule.id) {
                    continue;
                }
                let Some(finding) = run_rule(rule, &input) else {
                    continue;
                };
                warnings.push(into_warning(rule, finding, &input, &mut sequence));
            }
        }

        warnings
    }
}

thread_local! {
    static IN_RULE_CHECK: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside a rule check
///
/// Panics raised there are caught and logged by the engine. A host panic
/// hook can consult this to stay quiet for them.
pub fn in_rule_check() -> bool {
    IN_RULE_CHECK.with(Cell::get)
}

fn run_rule(rule: &Rule, input: &RuleInput<'_>) -> Option<Finding> {
    let was_checking = IN_RULE_CHECK.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (rule.check)(input)));
    IN_RULE_CHECK.with(|flag| flag.set(was_checking));

    let outcome = outcome.unwrap_or_else(|payload| {
        Err(RuleError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    });

    match outcome {
        Ok(finding) => finding,
        Err(error) => {
            tracing::warn!(rule = rule.id, node = %input.node.id, %error, "rule failed");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn into_warning(
    rule: &Rule,
    finding: Finding,
    input: &RuleInput<'_>,
    sequence: &mut WarningSequence,
) -> Warning {
    let owner = match finding.owner {
        Some(node_id) => FieldOwner {
            node_id,
            local_path: finding.path,
        },
        None => owner_of(input.graph, input.node, &finding.path),
    };

    let mut nodes = vec![owner.node_id.clone()];
    if owner.node_id != input.node.id {
        nodes.push(input.node.id.clone());
    }

    let level = finding.level.unwrap_or(rule.level);
    Warning {
        id: sequence.next(level),
        rule_id: rule.id.to_string(),
        level,
        title: rule.title.to_string(),
        message: finding.message,
        nodes,
        field_path: owner.local_path,
        hint: finding.hint,
    }
}
