//! Graph-rewrite pass protocol.
//!
//! A pass visits one node (or the whole graph), decides an action, and may
//! invoke the shared isolate-and-delete primitive. Passes must treat any
//! node they do not recognize as a no-op and must not assume iteration order
//! beyond "each live node visited at most once per sweep".

mod elimination;
mod empty_fold;
mod isolate;
mod loop_marking;
pub mod pipeline;

use thiserror::Error;

pub use elimination::{
    IdentityElimination, PlaceholderWithDefaultElimination, StopGradientElimination,
};
pub use empty_fold::EmptyTensorFolding;
pub use isolate::{isolate_and_delete, IsolateReport};
pub use loop_marking::LoopContiguityMarking;
pub use pipeline::{default_pipeline, PassPipeline, PipelineBuilder, PipelineStats, Step};

use crate::fold::KernelRegistry;
use crate::graph::{Graph, GraphError, NodeId};
use crate::scope::ScopeAllocator;

/// Successful pass results: did the pass mutate the graph?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Changed,
    Unchanged,
}

/// Graph topology precondition violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuralError {
    #[error("node {node} has {inputs} wired data inputs; rewiring its consumers requires an explicit output-to-input map")]
    AmbiguousRewire { node: NodeId, inputs: usize },
    #[error("node {node} sits inside a loop structure that no marking pass has vetted")]
    UnguardedLoop { node: NodeId },
    #[error("input slot {slot} of node {node} has no resolvable producer")]
    MissingProducer { node: NodeId, slot: usize },
    #[error("output {output} of node {node} has consumers but no mapping to an input")]
    UnmappedOutput { node: NodeId, output: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Failure side of the pass status lattice. Success cases are
/// [`PassOutcome::Changed`] / [`PassOutcome::Unchanged`].
#[derive(Debug, Error)]
pub enum PassError {
    /// Null/malformed argument (missing node, bad reference).
    #[error("invalid pass argument: {0}")]
    InvalidParam(String),
    /// Graph topology precondition violated.
    #[error(transparent)]
    Structural(#[from] StructuralError),
    /// Unrecoverable pass failure.
    #[error("pass failed: {0}")]
    Failed(String),
}

impl From<GraphError> for PassError {
    fn from(err: GraphError) -> Self {
        PassError::Structural(StructuralError::Graph(err))
    }
}

/// Status returned by every pass invocation.
pub type PassStatus = Result<PassOutcome, PassError>;

/// Shared compilation state handed to every pass.
pub struct PassContext<'a> {
    pub kernels: &'a KernelRegistry,
    pub scopes: &'a mut ScopeAllocator,
}

/// A rewrite rule applied once per live node.
pub trait NodePass: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, graph: &mut Graph, node: NodeId, cx: &mut PassContext<'_>) -> PassStatus;
}

/// A rewrite or analysis rule applied to the whole graph at once.
pub trait GraphPass: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, graph: &mut Graph, cx: &mut PassContext<'_>) -> PassStatus;
}
