//! Wiring between Reference nodes and the nodes that embed them

use kanvas_core::values::{find_placeholder, placeholders};
use kanvas_core::FieldPath;

use super::{Finding, Level, Rule, RuleInput};
use crate::error::RuleResult;

pub(super) fn rules() -> Vec<Rule> {
    vec![Rule {
        id: "disconnected-reference",
        level: Level::Info,
        title: "Disconnected reference",
        check: disconnected_reference,
    }]
}

fn disconnected_reference(input: &RuleInput<'_>) -> RuleResult<Option<Finding>> {
    let node = input.node;
    let Some(values) = node.values() else {
        return Ok(None);
    };

    for (path, target) in placeholders(values) {
        let problem = match input.graph.node(&target) {
            None => format!("points at '{}', which does not exist", target),
            Some(other) if !other.is_reference() => {
                format!("points at '{}', which is not a reference node", target)
            }
            Some(_) if !input.graph.is_linked(&target, &node.id) => {
                format!("points at '{}', but no edge connects it here", target)
            }
            Some(_) => continue,
        };
        return Ok(Some(
            Finding::new(path.clone(), format!("Placeholder at '{}' {}", path, problem))
                .owned_by(node.id.clone())
                .with_hint(format!("Connect '{}' to '{}' or remove the placeholder", target, node.id)),
        ));
    }

    if !node.is_reference() {
        return Ok(None);
    }
    let embedded = input.graph.reference_targets(&node.id).any(|holder| {
        input
            .graph
            .node(holder)
            .and_then(|holder| holder.values())
            .is_some_and(|values| find_placeholder(values, &node.id).is_some())
    });
    if embedded {
        return Ok(None);
    }
    Ok(Some(
        Finding::new(
            FieldPath::root(),
            format!("Reference '{}' is not used by any connected node", node.id),
        )
        .owned_by(node.id.clone()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanvas_core::{Edge, Graph, Node, ValidationContext};
    use serde_json::json;

    fn check(graph: &Graph, id: &str) -> Option<Finding> {
        let context = ValidationContext::default();
        let index = graph.nodes.iter().position(|n| n.id == id).unwrap();
        let input = RuleInput {
            node: &graph.nodes[index],
            index,
            graph,
            document: None,
            documents: &[],
            context: &context,
        };
        disconnected_reference(&input).unwrap()
    }

    fn holder() -> Node {
        Node::resource(
            "d",
            "Deployment",
            json!({"spec": {"template": {"spec": {"containers": ["#ref-c"]}}}}),
        )
    }

    fn container() -> Node {
        Node::reference("c", "Deployment", "containers", json!({"name": "web"}))
    }

    #[test]
    fn test_connected_reference_is_quiet() {
        let graph = Graph::new(vec![holder(), container()], vec![Edge::new("c", "d")]);
        assert!(check(&graph, "d").is_none());
        assert!(check(&graph, "c").is_none());
    }

    #[test]
    fn test_placeholder_without_edge() {
        let graph = Graph::new(vec![holder(), container()], vec![]);
        let finding = check(&graph, "d").unwrap();
        assert_eq!(finding.owner.as_deref(), Some("d"));
        assert_eq!(finding.path.to_string(), "spec.template.spec.containers.0");
        assert!(finding.message.contains("no edge"));
    }

    #[test]
    fn test_placeholder_to_missing_node() {
        let graph = Graph::new(vec![holder()], vec![]);
        let finding = check(&graph, "d").unwrap();
        assert!(finding.message.contains("does not exist"));
    }

    #[test]
    fn test_placeholder_to_resource_node() {
        let graph = Graph::new(
            vec![holder(), Node::resource("c", "Service", json!({}))],
            vec![Edge::new("c", "d")],
        );
        let finding = check(&graph, "d").unwrap();
        assert!(finding.message.contains("not a reference node"));
    }

    #[test]
    fn test_unused_reference() {
        let graph = Graph::new(
            vec![Node::resource("d", "Deployment", json!({})), container()],
            vec![Edge::new("c", "d")],
        );
        let finding = check(&graph, "c").unwrap();
        assert_eq!(finding.owner.as_deref(), Some("c"));
        assert!(finding.path.is_empty());

        let orphan = Graph::new(vec![container()], vec![]);
        assert!(check(&orphan, "c").is_some());
    }

    #[test]
    fn test_nested_reference_chain() {
        let graph = Graph::new(
            vec![
                holder(),
                Node::reference("c", "Deployment", "containers", json!({"env": ["#ref-e"]})),
                Node::reference("e", "Deployment", "env", json!({"name": "A", "value": "1"})),
            ],
            vec![Edge::new("c", "d"), Edge::new("e", "c")],
        );
        assert!(check(&graph, "c").is_none());
        assert!(check(&graph, "e").is_none());
    }
}
