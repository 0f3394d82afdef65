//! Ordered pass pipeline.
//!
//! Runs its step list in repeated sweeps until a full sweep reports no
//! change, a step fails, or the sweep bound is hit. Ordering is significant:
//! structural passes that vet loop interiors must precede the elimination
//! passes in the same sweep, which [`default_pipeline`] encodes.

use std::sync::Arc;
use std::time::SystemTime;

use crate::graph::Graph;
use crate::trace::{emit_pass_event, PassEvent, PassEventKind};

use super::{
    EmptyTensorFolding, GraphPass, IdentityElimination, LoopContiguityMarking, NodePass,
    PassContext, PassError, PassOutcome, PlaceholderWithDefaultElimination,
    StopGradientElimination,
};

pub enum Step {
    Node(Arc<dyn NodePass>),
    Graph(Arc<dyn GraphPass>),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Node(pass) => pass.name(),
            Step::Graph(pass) => pass.name(),
        }
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<Step>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_pass(&mut self, pass: Arc<dyn NodePass>) {
        self.steps.push(Step::Node(pass));
    }

    pub fn graph_pass(&mut self, pass: Arc<dyn GraphPass>) {
        self.steps.push(Step::Graph(pass));
    }

    pub fn finish(self) -> Vec<Step> {
        self.steps
    }
}

/// Accumulated pipeline statistics, merged across sweeps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub sweeps: usize,
    pub passes_run: usize,
    pub nodes_visited: usize,
    pub changes: usize,
}

impl PipelineStats {
    pub fn merge(self, other: PipelineStats) -> PipelineStats {
        PipelineStats {
            sweeps: self.sweeps + other.sweeps,
            passes_run: self.passes_run + other.passes_run,
            nodes_visited: self.nodes_visited + other.nodes_visited,
            changes: self.changes + other.changes,
        }
    }
}

pub struct PassPipeline {
    steps: Vec<Step>,
    max_sweeps: usize,
    log_stats: bool,
}

impl PassPipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            max_sweeps: crate::env::max_sweeps(),
            log_stats: crate::env::pass_stats_enabled(),
        }
    }

    /// Overrides the sweep bound; the bound is never lower than one.
    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps.max(1);
        self
    }

    /// Sweeps the graph to a fixed point. The first error aborts the whole
    /// run immediately; no partial recovery is attempted.
    pub fn run(&self, graph: &mut Graph, cx: &mut PassContext<'_>) -> Result<PipelineStats, PassError> {
        let mut stats = PipelineStats::default();
        for sweep in 0..self.max_sweeps {
            let mut sweep_changed = false;
            for step in &self.steps {
                let mut pass_changed = false;
                match step {
                    Step::Graph(pass) => {
                        if pass.run(graph, cx)? == PassOutcome::Changed {
                            pass_changed = true;
                        }
                    }
                    Step::Node(pass) => {
                        // Snapshot so each live node is visited at most once
                        // even while passes add and remove nodes.
                        for id in graph.node_ids() {
                            if !graph.contains(id) {
                                continue;
                            }
                            stats.nodes_visited += 1;
                            if pass.run(graph, id, cx)? == PassOutcome::Changed {
                                pass_changed = true;
                            }
                        }
                    }
                }
                stats.passes_run += 1;
                if pass_changed {
                    stats.changes += 1;
                    sweep_changed = true;
                }
                self.emit_stats(sweep, step.name(), pass_changed);
            }
            stats.sweeps += 1;
            if !sweep_changed {
                break;
            }
        }
        Ok(stats)
    }

    fn emit_stats(&self, sweep: usize, pass: &'static str, changed: bool) {
        if !self.log_stats && crate::trace::current_sink().is_none() {
            return;
        }
        emit_pass_event(PassEvent {
            timestamp: SystemTime::now(),
            kind: PassEventKind::PipelinePassStats {
                sweep,
                pass,
                changed,
            },
        });
    }
}

/// The stock pipeline: loop vetting first, then transparent-node
/// elimination, then constant folding.
pub fn default_pipeline() -> PassPipeline {
    let mut builder = PipelineBuilder::new();
    builder.graph_pass(Arc::new(LoopContiguityMarking));
    builder.node_pass(Arc::new(IdentityElimination));
    builder.node_pass(Arc::new(StopGradientElimination));
    builder.node_pass(Arc::new(PlaceholderWithDefaultElimination));
    builder.node_pass(Arc::new(EmptyTensorFolding));
    PassPipeline::new(builder.finish())
}
