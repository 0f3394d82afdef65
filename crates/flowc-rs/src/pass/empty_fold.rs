//! Constant folding for statically determinable nodes.
//!
//! Two shapes of opportunity: every output is provably empty (zero-element
//! shape), or every wired input is a materialized `Const` and a fold kernel
//! is registered for the kind. In both cases the node is replaced by spliced
//! `Const` nodes and all consumers are rewired.

use crate::fold::FoldRequest;
use crate::graph::{keys, ops, AttrValue, Graph, NodeId, OutputRef, Use};
use crate::tensor::TensorValue;

use super::{NodePass, PassContext, PassError, PassOutcome, PassStatus, StructuralError};

/// Kinds the folder never touches: constants are already folded, loop
/// plumbing and transparent markers belong to other passes.
const SKIPPED_KINDS: &[&str] = &[
    ops::CONST,
    ops::ENTER,
    ops::NEXT_ITERATION,
    ops::EXIT,
    ops::IDENTITY,
    ops::STOP_GRADIENT,
    ops::PLACEHOLDER_WITH_DEFAULT,
];

#[derive(Default)]
pub struct EmptyTensorFolding;

impl NodePass for EmptyTensorFolding {
    fn name(&self) -> &'static str {
        "empty-tensor-folding"
    }

    fn run(&self, graph: &mut Graph, node: NodeId, cx: &mut PassContext<'_>) -> PassStatus {
        let target = graph
            .get_node(node)
            .ok_or_else(|| PassError::InvalidParam(format!("node {node} does not exist")))?;

        if SKIPPED_KINDS.contains(&target.kind().as_str()) || target.output_arity() == 0 {
            return Ok(PassOutcome::Unchanged);
        }

        let all_empty = target
            .output_specs()
            .iter()
            .all(|spec| spec.element_count() == Some(0));

        let values = if all_empty {
            let mut values = Vec::with_capacity(target.output_arity());
            for spec in target.output_specs() {
                let value = TensorValue::zeroed(spec.clone())
                    .map_err(|e| PassError::Failed(e.to_string()))?;
                values.push(value);
            }
            values
        } else {
            let Some(values) = try_fold_const_inputs(graph, node, cx)? else {
                return Ok(PassOutcome::Unchanged);
            };
            values
        };

        if graph.in_loop(node) && !graph.node(node)?.has_attr(keys::LOOP_CHECKED) {
            return Err(StructuralError::UnguardedLoop { node }.into());
        }

        splice_constants(graph, node, values)?;
        Ok(PassOutcome::Changed)
    }
}

/// Evaluates the node through the kernel registry when every wired input is
/// a `Const`. Returns `Ok(None)` when folding does not apply or the kernel
/// reports a shape/type mismatch.
fn try_fold_const_inputs(
    graph: &Graph,
    node: NodeId,
    cx: &PassContext<'_>,
) -> Result<Option<Vec<TensorValue>>, PassError> {
    let target = graph.node(node).map_err(PassError::from)?;
    if !cx.kernels.has(target.kind().as_str()) {
        return Ok(None);
    }
    if target.wired_inputs().count() != target.input_arity() {
        return Ok(None);
    }

    let mut inputs = Vec::with_capacity(target.input_arity());
    for (slot, producer) in target.wired_inputs() {
        let source = graph.node(producer.node).map_err(PassError::from)?;
        if !source.kind().is(ops::CONST) {
            return Ok(None);
        }
        let value = source
            .attr(keys::VALUE)
            .and_then(AttrValue::as_tensor)
            .ok_or_else(|| {
                PassError::Failed(format!(
                    "const node {} feeding slot {slot} of {node} carries no value",
                    producer.node
                ))
            })?;
        inputs.push(value.clone());
    }
    let request = FoldRequest {
        kind: target.kind(),
        attrs: target.attrs(),
        inputs: &inputs,
        outputs: target.output_specs(),
    };
    match cx.kernels.compute(&request) {
        Ok(values) if values.len() == target.output_arity() => Ok(Some(values)),
        Ok(values) => Err(PassError::Failed(format!(
            "kernel for '{}' returned {} outputs, node declares {}",
            target.kind(),
            values.len(),
            target.output_arity()
        ))),
        Err(err) if err.is_type_mismatch() => Ok(None),
        Err(err) => Err(PassError::Failed(err.to_string())),
    }
}

/// Splices one `Const` node per output value, rewires every consumer, and
/// deletes the folded node. The folded node's inputs are unwired; producers
/// left without consumers stay in the graph for a later cleanup.
fn splice_constants(
    graph: &mut Graph,
    node: NodeId,
    values: Vec<TensorValue>,
) -> Result<(), PassError> {
    let uses: Vec<Use> = graph.consumers(node).to_vec();

    let mut replacements = Vec::with_capacity(values.len());
    for value in values {
        let spec = value.spec().clone();
        let id = graph
            .add_node(crate::graph::OpKind::new(ops::CONST), 0, vec![spec])
            .map_err(PassError::from)?;
        graph
            .node_mut(id)
            .map_err(PassError::from)?
            .set_attr(keys::VALUE, AttrValue::Tensor(value));
        replacements.push(id);
    }

    for u in uses {
        let replacement = replacements
            .get(u.output_index)
            .copied()
            .ok_or_else(|| {
                PassError::Failed(format!(
                    "no folded value for output {} of node {node}",
                    u.output_index
                ))
            })?;
        graph
            .rewire_input(
                u.consumer,
                u.input_index,
                OutputRef {
                    node: replacement,
                    index: 0,
                },
            )
            .map_err(PassError::from)?;
    }

    graph.remove_node(node).map_err(PassError::from)?;
    Ok(())
}
