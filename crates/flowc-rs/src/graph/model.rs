use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use thiserror::Error;

use super::attrs::{AttrMap, AttrValue};
use crate::tensor::TensorSpec;

/// Stable identifier for a node in the arena. Never reused within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Operator kind tag; cheap to clone, compared against string constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpKind(Arc<str>);

impl OpKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::<str>::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, name: &str) -> bool {
        self.as_str() == name
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer-side edge endpoint: one output slot of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub node: NodeId,
    pub index: usize,
}

/// Consumer-side record kept in the use-index of a producer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub consumer: NodeId,
    pub input_index: usize,
    pub output_index: usize,
}

/// Fully qualified loop-carried edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackEdge {
    pub from: OutputRef,
    pub to: NodeId,
    pub slot: usize,
}

/// Errors raised by graph construction and mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
    #[error("output slot {slot} out of range for node {node} with {arity} outputs")]
    OutputOutOfRange {
        node: NodeId,
        slot: usize,
        arity: usize,
    },
    #[error("input slot {slot} out of range for node {node} with {arity} inputs")]
    InputOutOfRange {
        node: NodeId,
        slot: usize,
        arity: usize,
    },
    #[error("input slot {slot} of node {node} already has a producer")]
    SlotOccupied { node: NodeId, slot: usize },
    #[error("input slot {slot} of node {node} has no producer")]
    SlotEmpty { node: NodeId, slot: usize },
    #[error("node {node} still has {consumers} consumer edges")]
    HasConsumers { node: NodeId, consumers: usize },
    #[error("graph is frozen; no further mutation is allowed")]
    Frozen,
    #[error("graph contains a cycle not closed by a marked back-edge")]
    CycleDetected,
    #[error("back-edge {from} -> {to} does not close a cycle")]
    BackEdgeNotClosed { from: NodeId, to: NodeId },
}

/// A single operator node: kind tag, attribute map, ordered input slots
/// (one producer each once wired) and ordered, typed output slots.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: OpKind,
    attrs: AttrMap,
    inputs: Vec<Option<OutputRef>>,
    outputs: Vec<TensorSpec>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn attrs(&self) -> &AttrMap {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: AttrValue) {
        self.attrs.insert(key.into(), value);
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<AttrValue> {
        self.attrs.remove(key)
    }

    pub fn input_arity(&self) -> usize {
        self.inputs.len()
    }

    pub fn inputs(&self) -> &[Option<OutputRef>] {
        &self.inputs
    }

    pub fn input(&self, slot: usize) -> Option<OutputRef> {
        self.inputs.get(slot).copied().flatten()
    }

    /// Wired input slots as `(slot, producer)` pairs.
    pub fn wired_inputs(&self) -> impl Iterator<Item = (usize, OutputRef)> + '_ {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(slot, input)| input.map(|producer| (slot, producer)))
    }

    pub fn output_arity(&self) -> usize {
        self.outputs.len()
    }

    pub fn output_specs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    pub fn output_spec(&self, index: usize) -> Option<&TensorSpec> {
        self.outputs.get(index)
    }
}

/// Arena of nodes plus edge and use indices.
///
/// Exclusively owned by the compiling thread while passes mutate it; after
/// [`Graph::freeze`] every mutator fails with [`GraphError::Frozen`] and the
/// graph may be shared read-only with lowering consumers.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    users: HashMap<NodeId, SmallVec<[Use; 4]>>,
    back_edges: HashSet<BackEdge>,
    next_id: u32,
    frozen: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_mutable(&self) -> Result<(), GraphError> {
        if self.frozen {
            return Err(GraphError::Frozen);
        }
        Ok(())
    }

    /// Adds a node with `input_arity` unwired input slots.
    pub fn add_node(
        &mut self,
        kind: OpKind,
        input_arity: usize,
        outputs: Vec<TensorSpec>,
    ) -> Result<NodeId, GraphError> {
        self.ensure_mutable()?;
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                kind,
                attrs: AttrMap::new(),
                inputs: vec![None; input_arity],
                outputs,
            },
        );
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.ensure_mutable()?;
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of wired edges (one per wired input slot).
    pub fn edge_count(&self) -> usize {
        self.nodes
            .values()
            .map(|node| node.wired_inputs().count())
            .sum()
    }

    /// Live node ids in ascending order; passes snapshot this so each live
    /// node is visited at most once per sweep.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn check_endpoints(
        &self,
        from: OutputRef,
        to: NodeId,
        slot: usize,
    ) -> Result<(), GraphError> {
        let producer = self.node(from.node)?;
        if from.index >= producer.output_arity() {
            return Err(GraphError::OutputOutOfRange {
                node: from.node,
                slot: from.index,
                arity: producer.output_arity(),
            });
        }
        let consumer = self.node(to)?;
        if slot >= consumer.input_arity() {
            return Err(GraphError::InputOutOfRange {
                node: to,
                slot,
                arity: consumer.input_arity(),
            });
        }
        Ok(())
    }

    /// Wires `from` into input `slot` of `to`. Each input slot takes exactly
    /// one producer; fan-out on the producer side is unrestricted.
    pub fn connect(&mut self, from: OutputRef, to: NodeId, slot: usize) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.check_endpoints(from, to, slot)?;
        let consumer = self.nodes.get_mut(&to).ok_or(GraphError::NodeNotFound(to))?;
        if consumer.inputs[slot].is_some() {
            return Err(GraphError::SlotOccupied { node: to, slot });
        }
        consumer.inputs[slot] = Some(from);
        self.users.entry(from.node).or_default().push(Use {
            consumer: to,
            input_index: slot,
            output_index: from.index,
        });
        Ok(())
    }

    /// Like [`Graph::connect`] but marks the edge as loop-carried, exempting
    /// it from the acyclicity check and protecting the loop interior from
    /// unvetted elimination.
    pub fn connect_back_edge(
        &mut self,
        from: OutputRef,
        to: NodeId,
        slot: usize,
    ) -> Result<(), GraphError> {
        self.connect(from, to, slot)?;
        self.back_edges.insert(BackEdge { from, to, slot });
        Ok(())
    }

    /// Unwires input `slot` of `node`, returning the previous producer.
    pub fn disconnect(&mut self, node: NodeId, slot: usize) -> Result<Option<OutputRef>, GraphError> {
        self.ensure_mutable()?;
        let consumer = self
            .nodes
            .get_mut(&node)
            .ok_or(GraphError::NodeNotFound(node))?;
        if slot >= consumer.inputs.len() {
            return Err(GraphError::InputOutOfRange {
                node,
                slot,
                arity: consumer.inputs.len(),
            });
        }
        let Some(from) = consumer.inputs[slot].take() else {
            return Ok(None);
        };
        self.remove_use(from.node, node, slot);
        self.back_edges.remove(&BackEdge { from, to: node, slot });
        Ok(Some(from))
    }

    /// Repoints an already-wired input slot at a new producer, preserving
    /// loop-carried marking when the old edge had it.
    pub fn rewire_input(
        &mut self,
        consumer: NodeId,
        slot: usize,
        new_from: OutputRef,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.check_endpoints(new_from, consumer, slot)?;
        let node = self
            .nodes
            .get_mut(&consumer)
            .ok_or(GraphError::NodeNotFound(consumer))?;
        let Some(old_from) = node.inputs[slot] else {
            return Err(GraphError::SlotEmpty {
                node: consumer,
                slot,
            });
        };
        node.inputs[slot] = Some(new_from);
        self.remove_use(old_from.node, consumer, slot);
        self.users.entry(new_from.node).or_default().push(Use {
            consumer,
            input_index: slot,
            output_index: new_from.index,
        });
        let old_edge = BackEdge {
            from: old_from,
            to: consumer,
            slot,
        };
        if self.back_edges.remove(&old_edge) {
            self.back_edges.insert(BackEdge {
                from: new_from,
                to: consumer,
                slot,
            });
        }
        Ok(())
    }

    fn remove_use(&mut self, producer: NodeId, consumer: NodeId, slot: usize) {
        if let Some(list) = self.users.get_mut(&producer) {
            list.retain(|u| !(u.consumer == consumer && u.input_index == slot));
            if list.is_empty() {
                self.users.remove(&producer);
            }
        }
    }

    /// Consumer edges of all output slots of `node`.
    pub fn consumers(&self, node: NodeId) -> &[Use] {
        self.users
            .get(&node)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// Producer wired into input `slot` of `node`.
    pub fn producer(&self, node: NodeId, slot: usize) -> Result<Option<OutputRef>, GraphError> {
        let n = self.node(node)?;
        if slot >= n.input_arity() {
            return Err(GraphError::InputOutOfRange {
                node,
                slot,
                arity: n.input_arity(),
            });
        }
        Ok(n.input(slot))
    }

    pub fn is_back_edge(&self, from: OutputRef, to: NodeId, slot: usize) -> bool {
        self.back_edges.contains(&BackEdge { from, to, slot })
    }

    pub fn back_edges(&self) -> impl Iterator<Item = BackEdge> + '_ {
        self.back_edges.iter().copied()
    }

    /// Removes a node that no longer has consumers, unwiring its inputs.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        self.ensure_mutable()?;
        let consumers = self.consumers(id).len();
        if consumers > 0 {
            return Err(GraphError::HasConsumers {
                node: id,
                consumers,
            });
        }
        let arity = self.node(id)?.input_arity();
        for slot in 0..arity {
            self.disconnect(id, slot)?;
        }
        self.users.remove(&id);
        self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Validates acyclicity (ignoring marked back-edges) and freezes the
    /// graph; all later mutation fails with [`GraphError::Frozen`].
    pub fn freeze(&mut self) -> Result<(), GraphError> {
        self.topo_order()?;
        self.frozen = true;
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Topological order over forward edges; marked back-edges are skipped.
    pub fn topo_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        for node in self.nodes.values() {
            let degree = node
                .wired_inputs()
                .filter(|(slot, from)| !self.is_back_edge(*from, node.id, *slot))
                .count();
            in_degree.insert(node.id, degree);
        }

        let mut ready: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        ready.sort_unstable();
        let mut queue: VecDeque<NodeId> = ready.into_iter().collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let mut unblocked = Vec::new();
            for u in self.consumers(id) {
                let from = OutputRef {
                    node: id,
                    index: u.output_index,
                };
                if self.is_back_edge(from, u.consumer, u.input_index) {
                    continue;
                }
                let degree = in_degree
                    .get_mut(&u.consumer)
                    .ok_or(GraphError::NodeNotFound(u.consumer))?;
                *degree -= 1;
                if *degree == 0 {
                    unblocked.push(u.consumer);
                }
            }
            unblocked.sort_unstable();
            queue.extend(unblocked);
        }

        if order.len() != self.nodes.len() {
            return Err(GraphError::CycleDetected);
        }
        Ok(order)
    }

    /// Nodes reachable from `start` over forward edges (back-edges excluded),
    /// including `start` itself.
    fn reachable_from(&self, start: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for u in self.consumers(id) {
                let from = OutputRef {
                    node: id,
                    index: u.output_index,
                };
                if !self.is_back_edge(from, u.consumer, u.input_index) {
                    stack.push(u.consumer);
                }
            }
        }
        seen
    }

    /// Nodes from which `target` is reachable over forward edges, including
    /// `target` itself.
    fn reaching(&self, target: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![target];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for (slot, from) in node.wired_inputs() {
                if !self.is_back_edge(from, id, slot) {
                    stack.push(from.node);
                }
            }
        }
        seen
    }

    /// Members of the loop closed by `edge`: every node on a forward path
    /// from the loop entry back to the edge's producer.
    pub fn loop_members_of(&self, edge: BackEdge) -> Result<HashSet<NodeId>, GraphError> {
        let forward = self.reachable_from(edge.to);
        if !forward.contains(&edge.from.node) {
            return Err(GraphError::BackEdgeNotClosed {
                from: edge.from.node,
                to: edge.to,
            });
        }
        let backward = self.reaching(edge.from.node);
        Ok(forward.intersection(&backward).copied().collect())
    }

    /// Whether `id` participates in any loop structure. Endpoints of a
    /// back-edge count even when the loop body is malformed.
    pub fn in_loop(&self, id: NodeId) -> bool {
        for edge in &self.back_edges {
            if edge.from.node == id || edge.to == id {
                return true;
            }
            if let Ok(members) = self.loop_members_of(*edge) {
                if members.contains(&id) {
                    return true;
                }
            }
        }
        false
    }
}
