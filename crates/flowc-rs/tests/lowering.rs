use flowc_rs::compile::{compile, CompileOptions};
use flowc_rs::graph::{ops, Graph, NodeId, OpKind, OutputRef};
use flowc_rs::scope::scope_attr;
use flowc_rs::task::{lower_graph, LowerError, TaskDescriptor};
use flowc_rs::tensor::{DType, Shape, TensorSpec};

fn f32_spec(dims: &[usize]) -> TensorSpec {
    TensorSpec::new(DType::F32, Shape::new(dims))
}

fn out(node: NodeId, index: usize) -> OutputRef {
    OutputRef { node, index }
}

#[test]
fn lowering_requires_a_frozen_graph() {
    let graph = Graph::new();
    let err = lower_graph(&graph).unwrap_err();
    assert!(matches!(err, LowerError::NotFrozen));
}

#[test]
fn loop_plumbing_lowers_to_queue_markers() {
    let mut graph = Graph::new();
    let init = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[4])])
        .unwrap();
    let enter = graph
        .add_node(OpKind::new(ops::ENTER), 2, vec![f32_spec(&[4])])
        .unwrap();
    let step = graph
        .add_node(OpKind::new("Increment"), 1, vec![f32_spec(&[4])])
        .unwrap();
    let next = graph
        .add_node(OpKind::new(ops::NEXT_ITERATION), 1, vec![f32_spec(&[4])])
        .unwrap();
    let exit = graph
        .add_node(OpKind::new(ops::EXIT), 1, vec![f32_spec(&[4])])
        .unwrap();
    graph.connect(out(init, 0), enter, 0).unwrap();
    graph.connect(out(enter, 0), step, 0).unwrap();
    graph.connect(out(step, 0), next, 0).unwrap();
    graph.connect_back_edge(out(next, 0), enter, 1).unwrap();
    graph.connect(out(step, 0), exit, 0).unwrap();

    let descriptors = compile(&mut graph, &CompileOptions::default()).unwrap();
    assert!(graph.is_frozen());
    assert!(graph.is_back_edge(out(next, 0), enter, 1));

    let events: Vec<&str> = descriptors
        .iter()
        .filter_map(|descriptor| match descriptor {
            TaskDescriptor::EventRecord(event) => Some(event.label.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(events.len(), 3, "enter, next-iteration and exit markers");
    assert!(events.iter().any(|label| label.starts_with("Enter.")));
    assert!(events.iter().any(|label| label.starts_with("NextIteration.")));
    assert!(events.iter().any(|label| label.starts_with("Exit.")));

    // The compute step lowers to a launch stamped with its fusion scope.
    let launches: Vec<_> = descriptors
        .iter()
        .filter_map(|descriptor| match descriptor {
            TaskDescriptor::KernelLaunch(launch) => Some(launch),
            _ => None,
        })
        .collect();
    assert!(launches.iter().any(|launch| launch.kernel == "Increment"));
    for launch in &launches {
        assert!(launch.scope_id.is_some());
    }
}

#[test]
fn every_lowered_node_carries_its_scope() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[2])])
        .unwrap();
    let b = graph
        .add_node(OpKind::new("Mul"), 1, vec![f32_spec(&[2])])
        .unwrap();
    graph.connect(out(a, 0), b, 0).unwrap();

    let descriptors = compile(&mut graph, &CompileOptions::default()).unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(scope_attr(&graph, a), Some(1));
    assert_eq!(scope_attr(&graph, b), Some(2));
}
