//! Elimination passes for transparent operator kinds.
//!
//! Each pass recognizes one kind, hands the node to the shared
//! isolate-and-delete primitive, and reports anything else as a no-op.

use crate::graph::{ops, Graph, NodeId};

use super::{isolate_and_delete, NodePass, PassContext, PassError, PassOutcome, PassStatus};

fn eliminate_kind(graph: &mut Graph, node: NodeId, kind: &str) -> PassStatus {
    let target = graph
        .get_node(node)
        .ok_or_else(|| PassError::InvalidParam(format!("node {node} does not exist")))?;
    if !target.kind().is(kind) {
        return Ok(PassOutcome::Unchanged);
    }
    isolate_and_delete(graph, node, None)?;
    Ok(PassOutcome::Changed)
}

/// Removes pass-through markers, rewiring consumers to the marker's producer.
#[derive(Default)]
pub struct IdentityElimination;

impl NodePass for IdentityElimination {
    fn name(&self) -> &'static str {
        "identity-elimination"
    }

    fn run(&self, graph: &mut Graph, node: NodeId, _cx: &mut PassContext<'_>) -> PassStatus {
        eliminate_kind(graph, node, ops::IDENTITY)
    }
}

/// Removes gradient-stop markers; they only matter while training.
#[derive(Default)]
pub struct StopGradientElimination;

impl NodePass for StopGradientElimination {
    fn name(&self) -> &'static str {
        "stop-gradient-elimination"
    }

    fn run(&self, graph: &mut Graph, node: NodeId, _cx: &mut PassContext<'_>) -> PassStatus {
        eliminate_kind(graph, node, ops::STOP_GRADIENT)
    }
}

/// Collapses default-value placeholders onto their wired default producer.
#[derive(Default)]
pub struct PlaceholderWithDefaultElimination;

impl NodePass for PlaceholderWithDefaultElimination {
    fn name(&self) -> &'static str {
        "placeholder-with-default-elimination"
    }

    fn run(&self, graph: &mut Graph, node: NodeId, _cx: &mut PassContext<'_>) -> PassStatus {
        eliminate_kind(graph, node, ops::PLACEHOLDER_WITH_DEFAULT)
    }
}
