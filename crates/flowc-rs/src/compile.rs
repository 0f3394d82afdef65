//! End-to-end compile driver: pipeline, scope assignment, freeze, lowering.

use anyhow::{Context, Result};

use crate::fold::KernelRegistry;
use crate::graph::Graph;
use crate::pass::{default_pipeline, PassContext, PassPipeline};
use crate::scope::{assign_scopes, ScopeAllocator};
use crate::task::{lower_graph, TaskDescriptor};

/// One compilation's configuration: the pass pipeline to run and the fold
/// kernels available to it. Each compilation owns a private scope allocator.
pub struct CompileOptions {
    pub pipeline: PassPipeline,
    pub kernels: KernelRegistry,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            pipeline: default_pipeline(),
            kernels: KernelRegistry::with_builtin_kernels(),
        }
    }
}

/// Rewrites `graph` to a fixed point, stamps fusion scopes, freezes it, and
/// lowers every surviving node into a task descriptor.
pub fn compile(graph: &mut Graph, options: &CompileOptions) -> Result<Vec<TaskDescriptor>> {
    let mut scopes = ScopeAllocator::new();

    let mut cx = PassContext {
        kernels: &options.kernels,
        scopes: &mut scopes,
    };
    options
        .pipeline
        .run(graph, &mut cx)
        .context("pass pipeline failed")?;

    assign_scopes(graph, &mut scopes).context("scope assignment failed")?;
    graph.freeze().context("graph finalization failed")?;
    let descriptors = lower_graph(graph).context("lowering failed")?;
    Ok(descriptors)
}
