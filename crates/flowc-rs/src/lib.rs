//! Dataflow graph compiler core.
//!
//! The crate takes a mutable operator graph, rewrites it through an ordered
//! pipeline of passes (transparent-node elimination, constant folding,
//! loop-structure marking), stamps fusion scopes, and lowers the surviving
//! nodes into typed task descriptors that a [`task::DeviceBackend`] turns
//! into device queue work at model-load time.

pub mod compile;
mod env;
pub mod fold;
pub mod graph;
pub mod pass;
pub mod scope;
pub mod task;
pub mod tensor;
pub mod trace;

pub use graph::{Graph, Node, NodeId, OpKind};
pub use task::{DeviceBackend, ExecutionContext, TaskDescriptor};
pub use tensor::{DType, Shape, TensorSpec, TensorValue};
