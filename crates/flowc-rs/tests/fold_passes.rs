use flowc_rs::fold::{FoldRequest, KernelRegistry};
use flowc_rs::graph::{keys, ops, AttrValue, Graph, NodeId, OpKind, OutputRef};
use flowc_rs::pass::{EmptyTensorFolding, NodePass, PassContext, PassOutcome};
use flowc_rs::scope::ScopeAllocator;
use flowc_rs::tensor::{DType, Shape, TensorSpec, TensorValue};

fn f32_spec(dims: &[usize]) -> TensorSpec {
    TensorSpec::new(DType::F32, Shape::new(dims))
}

fn out(node: NodeId, index: usize) -> OutputRef {
    OutputRef { node, index }
}

fn const_node(graph: &mut Graph, values: &[f32]) -> NodeId {
    let value = TensorValue::from_f32s(Shape::new([values.len()]), values).unwrap();
    let id = graph
        .add_node(OpKind::new(ops::CONST), 0, vec![value.spec().clone()])
        .unwrap();
    graph
        .node_mut(id)
        .unwrap()
        .set_attr(keys::VALUE, AttrValue::Tensor(value));
    id
}

#[test]
fn mismatched_kernel_inputs_fail_without_producing_outputs() {
    let registry = KernelRegistry::with_builtin_kernels();
    let kind = OpKind::new(ops::ADD);
    let attrs = flowc_rs::graph::AttrMap::new();
    let lhs = TensorValue::from_f32s(Shape::new([2]), &[1.0, 2.0]).unwrap();
    let rhs = TensorValue::from_f32s(Shape::new([3]), &[1.0, 2.0, 3.0]).unwrap();
    let outputs = [f32_spec(&[2])];
    let request = FoldRequest {
        kind: &kind,
        attrs: &attrs,
        inputs: &[lhs, rhs],
        outputs: &outputs,
    };

    let err = registry.compute(&request).unwrap_err();
    assert!(err.is_type_mismatch(), "unexpected error: {err}");
}

#[test]
fn const_inputs_fold_through_the_kernel_registry() {
    let mut graph = Graph::new();
    let lhs = const_node(&mut graph, &[1.0, 2.0]);
    let rhs = const_node(&mut graph, &[10.0, 20.0]);
    let add = graph
        .add_node(OpKind::new(ops::ADD), 2, vec![f32_spec(&[2])])
        .unwrap();
    let sink = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[2])])
        .unwrap();
    graph.connect(out(lhs, 0), add, 0).unwrap();
    graph.connect(out(rhs, 0), add, 1).unwrap();
    graph.connect(out(add, 0), sink, 0).unwrap();

    let kernels = KernelRegistry::with_builtin_kernels();
    let mut scopes = ScopeAllocator::new();
    let mut cx = PassContext {
        kernels: &kernels,
        scopes: &mut scopes,
    };
    let outcome = EmptyTensorFolding.run(&mut graph, add, &mut cx).unwrap();
    assert_eq!(outcome, PassOutcome::Changed);
    assert!(!graph.contains(add));

    let folded = graph.producer(sink, 0).unwrap().unwrap();
    let node = graph.node(folded.node).unwrap();
    assert!(node.kind().is(ops::CONST));
    let value = node
        .attr(keys::VALUE)
        .and_then(AttrValue::as_tensor)
        .unwrap();
    assert_eq!(value.f32_values().unwrap(), vec![11.0, 22.0]);
}

#[test]
fn provably_empty_outputs_fold_to_empty_constants() {
    let mut graph = Graph::new();
    let src = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[0, 4])])
        .unwrap();
    let matmul = graph
        .add_node(OpKind::new("MatMul"), 1, vec![f32_spec(&[0, 8])])
        .unwrap();
    let sink = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[0, 8])])
        .unwrap();
    graph.connect(out(src, 0), matmul, 0).unwrap();
    graph.connect(out(matmul, 0), sink, 0).unwrap();

    let kernels = KernelRegistry::with_builtin_kernels();
    let mut scopes = ScopeAllocator::new();
    let mut cx = PassContext {
        kernels: &kernels,
        scopes: &mut scopes,
    };
    let outcome = EmptyTensorFolding.run(&mut graph, matmul, &mut cx).unwrap();
    assert_eq!(outcome, PassOutcome::Changed);

    let folded = graph.producer(sink, 0).unwrap().unwrap();
    let node = graph.node(folded.node).unwrap();
    assert!(node.kind().is(ops::CONST));
    let value = node
        .attr(keys::VALUE)
        .and_then(AttrValue::as_tensor)
        .unwrap();
    assert_eq!(value.byte_len(), 0);
    assert_eq!(value.spec(), &f32_spec(&[0, 8]));
}

#[test]
fn non_static_node_is_left_alone() {
    let mut graph = Graph::new();
    let src = graph
        .add_node(OpKind::new("Producer"), 0, vec![f32_spec(&[2])])
        .unwrap();
    let add = graph
        .add_node(OpKind::new(ops::ADD), 2, vec![f32_spec(&[2])])
        .unwrap();
    let lhs = const_node(&mut graph, &[1.0, 2.0]);
    graph.connect(out(lhs, 0), add, 0).unwrap();
    graph.connect(out(src, 0), add, 1).unwrap();

    let kernels = KernelRegistry::with_builtin_kernels();
    let mut scopes = ScopeAllocator::new();
    let mut cx = PassContext {
        kernels: &kernels,
        scopes: &mut scopes,
    };
    let outcome = EmptyTensorFolding.run(&mut graph, add, &mut cx).unwrap();
    assert_eq!(outcome, PassOutcome::Unchanged);
    assert!(graph.contains(add));
}

#[test]
fn kernel_type_mismatch_downgrades_to_no_op() {
    let mut graph = Graph::new();
    // A Fill node missing its scalar attribute: the kernel reports a
    // recognizable mismatch and the pass leaves the node as-is.
    let fill = graph
        .add_node(OpKind::new(ops::FILL), 0, vec![f32_spec(&[4])])
        .unwrap();
    let sink = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[4])])
        .unwrap();
    graph.connect(out(fill, 0), sink, 0).unwrap();

    let kernels = KernelRegistry::with_builtin_kernels();
    let mut scopes = ScopeAllocator::new();
    let mut cx = PassContext {
        kernels: &kernels,
        scopes: &mut scopes,
    };
    let outcome = EmptyTensorFolding.run(&mut graph, fill, &mut cx).unwrap();
    assert_eq!(outcome, PassOutcome::Unchanged);
    assert!(graph.contains(fill));
}

#[test]
fn fill_with_attribute_folds_to_constant() {
    let mut graph = Graph::new();
    let fill = graph
        .add_node(OpKind::new(ops::FILL), 0, vec![f32_spec(&[3])])
        .unwrap();
    graph
        .node_mut(fill)
        .unwrap()
        .set_attr(keys::FILL_VALUE, AttrValue::F64(2.5));
    let sink = graph
        .add_node(OpKind::new("Consumer"), 1, vec![f32_spec(&[3])])
        .unwrap();
    graph.connect(out(fill, 0), sink, 0).unwrap();

    let kernels = KernelRegistry::with_builtin_kernels();
    let mut scopes = ScopeAllocator::new();
    let mut cx = PassContext {
        kernels: &kernels,
        scopes: &mut scopes,
    };
    let outcome = EmptyTensorFolding.run(&mut graph, fill, &mut cx).unwrap();
    assert_eq!(outcome, PassOutcome::Changed);

    let folded = graph.producer(sink, 0).unwrap().unwrap();
    let value = graph
        .node(folded.node)
        .unwrap()
        .attr(keys::VALUE)
        .and_then(AttrValue::as_tensor)
        .unwrap()
        .f32_values()
        .unwrap();
    assert_eq!(value, vec![2.5, 2.5, 2.5]);
}
