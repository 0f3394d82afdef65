//! Fusion scope ids.
//!
//! Later fusion/codegen stages group nodes that share a scope id into one
//! executable unit. Ids are monotonically increasing and unique for the
//! lifetime of one allocator instance; the allocator is not synchronized and
//! must be exclusively owned by a single compilation.

use crate::graph::{keys, AttrValue, Graph, GraphError, NodeId};

#[derive(Debug, Default)]
pub struct ScopeAllocator {
    current: u64,
}

impl ScopeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the counter to zero. The only reset operation; previously
    /// allocated ids stay retired forever.
    pub fn init(&mut self) {
        self.current = 0;
    }

    /// Increments and returns the counter: a fresh allocator yields the
    /// strictly increasing sequence 1..N.
    pub fn allocate_scope_id(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    /// Last allocated id; reads without advancing the counter.
    pub fn current_scope_id(&self) -> u64 {
        self.current
    }

    /// Accepted for interface compatibility and intentionally a no-op:
    /// ids are never reused, so there is nothing to return to the pool.
    pub fn release_scope_id(&mut self, _id: u64) {}
}

/// Stamps `id` onto the node under the reserved scope attribute.
pub fn set_scope_attr(graph: &mut Graph, node: NodeId, id: u64) -> Result<(), GraphError> {
    graph
        .node_mut(node)?
        .set_attr(keys::SCOPE_ID, AttrValue::I64(id as i64));
    Ok(())
}

/// Reads the scope attribute; `None` means the node was never stamped.
pub fn scope_attr(graph: &Graph, node: NodeId) -> Option<u64> {
    graph
        .get_node(node)?
        .attr(keys::SCOPE_ID)
        .and_then(AttrValue::as_i64)
        .map(|id| id as u64)
}

pub fn has_scope_attr(graph: &Graph, node: NodeId) -> bool {
    graph
        .get_node(node)
        .is_some_and(|node| node.has_attr(keys::SCOPE_ID))
}

/// Lowering prepass: stamps every unstamped node in topological order.
/// Returns the number of nodes stamped.
pub fn assign_scopes(graph: &mut Graph, scopes: &mut ScopeAllocator) -> Result<usize, GraphError> {
    let order = graph.topo_order()?;
    let mut stamped = 0;
    for id in order {
        if !has_scope_attr(graph, id) {
            let scope = scopes.allocate_scope_id();
            set_scope_attr(graph, id, scope)?;
            stamped += 1;
        }
    }
    Ok(stamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing_from_one() {
        let mut scopes = ScopeAllocator::new();
        scopes.init();
        for expected in 1..=5u64 {
            assert_eq!(scopes.allocate_scope_id(), expected);
            assert_eq!(scopes.current_scope_id(), expected);
        }
    }

    #[test]
    fn release_does_not_recycle() {
        let mut scopes = ScopeAllocator::new();
        let first = scopes.allocate_scope_id();
        scopes.release_scope_id(first);
        assert_eq!(scopes.allocate_scope_id(), first + 1);
    }
}
