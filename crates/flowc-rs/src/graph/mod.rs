//! Mutable operator-graph arena.
//!
//! Nodes live in an arena keyed by stable integer ids; edges are stored as
//! `(producer, output slot) -> (consumer, input slot)` references plus a
//! reverse use-index, so loop-carried back-edges are ordinary data rather
//! than reference cycles.

mod attrs;
mod model;

pub use attrs::{keys, AttrMap, AttrValue};
pub use model::{BackEdge, Graph, GraphError, Node, NodeId, OpKind, OutputRef, Use};

/// Operator kind tags the compiler core recognizes.
///
/// The operator set itself is owned by an external registry; these are the
/// kinds the built-in passes and the lowering walk special-case.
pub mod ops {
    /// Materialized constant; holds its payload under [`super::keys::VALUE`].
    pub const CONST: &str = "Const";
    /// Pass-through marker with one data input.
    pub const IDENTITY: &str = "Identity";
    /// Training-only no-op; transparent at inference time.
    pub const STOP_GRADIENT: &str = "StopGradient";
    /// Placeholder that falls back to its wired default value.
    pub const PLACEHOLDER_WITH_DEFAULT: &str = "PlaceholderWithDefault";
    /// Scalar fill of a statically known output spec.
    pub const FILL: &str = "Fill";
    /// Elementwise addition.
    pub const ADD: &str = "Add";
    /// Loop entry; receives the initial value and the loop-carried back-edge.
    pub const ENTER: &str = "Enter";
    /// Loop tail; its output closes the cycle back to the entry.
    pub const NEXT_ITERATION: &str = "NextIteration";
    /// Loop exit; forwards the final value out of the loop body.
    pub const EXIT: &str = "Exit";
}
