use flowc_rs::graph::{Graph, GraphError, OpKind, OutputRef};
use flowc_rs::tensor::{DType, Shape, TensorSpec};

fn f32_spec(dims: &[usize]) -> TensorSpec {
    TensorSpec::new(DType::F32, Shape::new(dims))
}

fn out(node: flowc_rs::NodeId, index: usize) -> OutputRef {
    OutputRef { node, index }
}

#[test]
fn connect_builds_edges_and_use_index() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[4])])
        .unwrap();
    let b = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[4])])
        .unwrap();
    graph.connect(out(a, 0), b, 0).unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.producer(b, 0).unwrap(), Some(out(a, 0)));
    let uses = graph.consumers(a);
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].consumer, b);
    assert_eq!(uses[0].input_index, 0);
    assert_eq!(uses[0].output_index, 0);
}

#[test]
fn producer_slot_fans_out_but_input_slot_is_exclusive() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[4])])
        .unwrap();
    let b = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[4])])
        .unwrap();
    let c = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[4])])
        .unwrap();

    graph.connect(out(a, 0), b, 0).unwrap();
    graph.connect(out(a, 0), c, 0).unwrap();
    assert_eq!(graph.consumers(a).len(), 2);

    let err = graph.connect(out(a, 0), b, 0).unwrap_err();
    assert_eq!(err, GraphError::SlotOccupied { node: b, slot: 0 });
}

#[test]
fn remove_node_requires_no_consumers() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[4])])
        .unwrap();
    let b = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[4])])
        .unwrap();
    graph.connect(out(a, 0), b, 0).unwrap();

    let err = graph.remove_node(a).unwrap_err();
    assert_eq!(
        err,
        GraphError::HasConsumers {
            node: a,
            consumers: 1
        }
    );

    // Removing the consumer unwires its inputs and releases the producer.
    graph.remove_node(b).unwrap();
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.consumers(a).is_empty());
    graph.remove_node(a).unwrap();
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn unmarked_cycle_is_rejected_at_freeze() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Op"), 1, vec![f32_spec(&[1])])
        .unwrap();
    let b = graph
        .add_node(OpKind::new("Op"), 1, vec![f32_spec(&[1])])
        .unwrap();
    graph.connect(out(a, 0), b, 0).unwrap();
    graph.connect(out(b, 0), a, 0).unwrap();

    assert_eq!(graph.topo_order().unwrap_err(), GraphError::CycleDetected);
    assert_eq!(graph.freeze().unwrap_err(), GraphError::CycleDetected);
}

#[test]
fn marked_back_edge_is_exempt_from_acyclicity() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Op"), 1, vec![f32_spec(&[1])])
        .unwrap();
    let b = graph
        .add_node(OpKind::new("Op"), 1, vec![f32_spec(&[1])])
        .unwrap();
    graph.connect(out(a, 0), b, 0).unwrap();
    graph.connect_back_edge(out(b, 0), a, 0).unwrap();

    let order = graph.topo_order().unwrap();
    assert_eq!(order, vec![a, b]);
    assert!(graph.is_back_edge(out(b, 0), a, 0));
    assert!(graph.in_loop(a));
    assert!(graph.in_loop(b));
}

#[test]
fn frozen_graph_rejects_mutation() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[4])])
        .unwrap();
    graph.freeze().unwrap();

    assert!(graph.is_frozen());
    let err = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[4])])
        .unwrap_err();
    assert_eq!(err, GraphError::Frozen);
    assert_eq!(graph.node_mut(a).unwrap_err(), GraphError::Frozen);
    assert_eq!(graph.remove_node(a).unwrap_err(), GraphError::Frozen);
}

#[test]
fn topo_order_visits_producers_first() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[2])])
        .unwrap();
    let b = graph
        .add_node(OpKind::new("Op"), 1, vec![f32_spec(&[2])])
        .unwrap();
    let c = graph
        .add_node(OpKind::new("Op"), 2, vec![f32_spec(&[2])])
        .unwrap();
    graph.connect(out(a, 0), b, 0).unwrap();
    graph.connect(out(a, 0), c, 0).unwrap();
    graph.connect(out(b, 0), c, 1).unwrap();

    let order = graph.topo_order().unwrap();
    let pos = |id| order.iter().position(|x| *x == id).unwrap();
    assert!(pos(a) < pos(b));
    assert!(pos(b) < pos(c));
}
