//! Structural pass for loop subgraphs.
//!
//! A loop is an `Enter -> body -> NextIteration` chain closed by an edge
//! marked loop-carried at construction time. This pass walks each such loop,
//! stamps every member with the loop-checked marker (clearing them for later
//! elimination), and records on the loop entry which of its input slots hold
//! iteration state that must stay contiguous in memory. It never deletes
//! anything, and it must run before elimination passes reach loop interiors.

use std::collections::BTreeSet;

use crate::graph::{keys, AttrValue, BackEdge, Graph};

use super::{GraphPass, PassContext, PassError, PassOutcome, PassStatus};

#[derive(Default)]
pub struct LoopContiguityMarking;

impl GraphPass for LoopContiguityMarking {
    fn name(&self) -> &'static str {
        "loop-contiguity-marking"
    }

    fn run(&self, graph: &mut Graph, _cx: &mut PassContext<'_>) -> PassStatus {
        let edges: Vec<BackEdge> = graph.back_edges().collect();
        if edges.is_empty() {
            return Ok(PassOutcome::Unchanged);
        }

        let mut changed = false;
        for edge in edges {
            let members = graph.loop_members_of(edge).map_err(PassError::from)?;

            for member in &members {
                let node = graph.node_mut(*member).map_err(PassError::from)?;
                if !node.has_attr(keys::LOOP_CHECKED) {
                    node.set_attr(keys::LOOP_CHECKED, AttrValue::Bool(true));
                    changed = true;
                }
            }

            // Iteration state of the loop entry: the back-edge slot plus
            // every initial-value slot wired from outside the loop body.
            let entry = graph.node(edge.to).map_err(PassError::from)?;
            let mut carried: BTreeSet<usize> = BTreeSet::new();
            carried.insert(edge.slot);
            for (slot, producer) in entry.wired_inputs() {
                if !members.contains(&producer.node) {
                    carried.insert(slot);
                }
            }
            let indices: Vec<i64> = carried.into_iter().map(|slot| slot as i64).collect();
            let already = entry
                .attr(keys::CONTIGUOUS_INPUTS)
                .and_then(AttrValue::as_i64_array)
                .map(|existing| existing == indices.as_slice())
                .unwrap_or(false);
            if !already {
                graph
                    .node_mut(edge.to)
                    .map_err(PassError::from)?
                    .set_attr(keys::CONTIGUOUS_INPUTS, AttrValue::I64Array(indices));
                changed = true;
            }
        }

        Ok(if changed {
            PassOutcome::Changed
        } else {
            PassOutcome::Unchanged
        })
    }
}
