//! The isolate-and-delete primitive shared by elimination and folding
//! passes: remove a transparent node while rewiring each of its consumers to
//! the node's own producer at the corresponding tensor index.

use crate::graph::{keys, Graph, NodeId, OutputRef, Use};

use super::{PassError, StructuralError};

/// Edge accounting for one successful invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IsolateReport {
    /// Consumer edges repointed at the node's producer.
    pub rewired_edges: usize,
    /// Input edges of the deleted node that were unwired.
    pub removed_edges: usize,
}

/// Removes `node`, redirecting every consumer edge `(node, out)` to the
/// producer wired into the input slot `out` maps to.
///
/// `io_map` lists explicit `(output index, input index)` correspondences.
/// Without it the node must have exactly one wired data input, which then
/// backs every consumed output.
///
/// Every precondition (resolvable node, unambiguous mapping, resolvable
/// producers, vetted loop membership) is validated before the first edge is
/// touched; once mutation starts there is no rollback.
pub fn isolate_and_delete(
    graph: &mut Graph,
    node: NodeId,
    io_map: Option<&[(usize, usize)]>,
) -> Result<IsolateReport, PassError> {
    let target = graph
        .get_node(node)
        .ok_or_else(|| PassError::InvalidParam(format!("node {node} does not exist")))?;

    if graph.in_loop(node) && !target.has_attr(keys::LOOP_CHECKED) {
        return Err(StructuralError::UnguardedLoop { node }.into());
    }

    let wired: Vec<(usize, OutputRef)> = target.wired_inputs().collect();
    let uses: Vec<Use> = graph.consumers(node).to_vec();

    // Plan every redirect up front so a failing precondition leaves the
    // graph untouched.
    let mut plan: Vec<(Use, OutputRef)> = Vec::with_capacity(uses.len());
    for u in &uses {
        let input_slot = match io_map {
            Some(map) => map
                .iter()
                .find(|(output, _)| *output == u.output_index)
                .map(|(_, input)| *input)
                .ok_or(StructuralError::UnmappedOutput {
                    node,
                    output: u.output_index,
                })?,
            None => match wired.as_slice() {
                [(slot, _)] => *slot,
                _ => {
                    return Err(StructuralError::AmbiguousRewire {
                        node,
                        inputs: wired.len(),
                    }
                    .into())
                }
            },
        };
        let producer = target.input(input_slot).ok_or(StructuralError::MissingProducer {
            node,
            slot: input_slot,
        })?;
        plan.push((*u, producer));
    }

    let removed_edges = wired.len();
    let rewired_edges = plan.len();
    for (u, producer) in plan {
        graph.rewire_input(u.consumer, u.input_index, producer)?;
    }
    graph.remove_node(node)?;

    Ok(IsolateReport {
        rewired_edges,
        removed_edges,
    })
}
