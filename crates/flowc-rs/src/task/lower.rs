//! Lowering: one walk over the frozen graph producing task descriptors.

use thiserror::Error;

use crate::graph::{keys, ops, AttrValue, Graph, GraphError, NodeId};
use crate::scope::scope_attr;

use super::{
    CopyDirection, EventRecordDescriptor, KernelLaunchDescriptor, MemcpyDescriptor, TaskDescriptor,
};

/// Block dimension used when a node does not request one.
pub const DEFAULT_BLOCK_DIM: u32 = 256;

#[derive(Debug, Error)]
pub enum LowerError {
    #[error("graph must be frozen before lowering")]
    NotFrozen,
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("const node {0} is missing its value attribute")]
    MissingConstValue(NodeId),
    #[error("failed to encode launch arguments for node {node}: {source}")]
    ArgEncoding {
        node: NodeId,
        source: bincode::Error,
    },
}

/// Walks the finalized graph once in topological order and produces one
/// descriptor per node: constants become host-to-device copies, loop
/// plumbing becomes queue markers, everything else becomes a kernel launch
/// carrying its serialized attribute map.
pub fn lower_graph(graph: &Graph) -> Result<Vec<TaskDescriptor>, LowerError> {
    if !graph.is_frozen() {
        return Err(LowerError::NotFrozen);
    }

    let order = graph.topo_order()?;
    let mut descriptors = Vec::with_capacity(order.len());
    for id in order {
        let node = graph.node(id)?;
        let kind = node.kind();
        let descriptor = if kind.is(ops::CONST) {
            let value = node
                .attr(keys::VALUE)
                .and_then(AttrValue::as_tensor)
                .ok_or(LowerError::MissingConstValue(id))?;
            TaskDescriptor::Memcpy(MemcpyDescriptor {
                label: format!("const.{id}"),
                byte_len: value.byte_len() as u64,
                direction: CopyDirection::HostToDevice,
            })
        } else if kind.is(ops::ENTER) || kind.is(ops::NEXT_ITERATION) || kind.is(ops::EXIT) {
            TaskDescriptor::EventRecord(EventRecordDescriptor {
                label: format!("{kind}.{id}"),
            })
        } else {
            let block_dim = node
                .attr(keys::BLOCK_DIM)
                .and_then(AttrValue::as_i64)
                .map(|dim| dim as u32)
                .unwrap_or(DEFAULT_BLOCK_DIM);
            let args = bincode::serialize(node.attrs())
                .map_err(|source| LowerError::ArgEncoding { node: id, source })?;
            TaskDescriptor::KernelLaunch(KernelLaunchDescriptor {
                kernel: kind.as_str().to_string(),
                scope_id: scope_attr(graph, id),
                block_dim,
                args,
            })
        };
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}
