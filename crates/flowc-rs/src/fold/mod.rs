//! Fold kernel interface.
//!
//! Constant-folding passes evaluate statically known subgraphs through pure
//! kernels registered here. A kernel validates argument count, shape and
//! element-type compatibility before computing anything, so a failed
//! invocation never leaves partially populated outputs behind.

mod kernels;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

pub use kernels::{AddKernel, FillKernel};

use crate::graph::{AttrMap, OpKind};
use crate::tensor::{DType, TensorSpec, TensorValue};

/// One fold invocation: the node's kind, attributes, materialized inputs and
/// declared output specs.
pub struct FoldRequest<'a> {
    pub kind: &'a OpKind,
    pub attrs: &'a AttrMap,
    pub inputs: &'a [TensorValue],
    pub outputs: &'a [TensorSpec],
}

/// Typed failures surfaced by fold kernels.
#[derive(Debug, Error)]
pub enum FoldError {
    #[error("kernel '{kind}' expected {expected} inputs, got {got}")]
    Arity {
        kind: String,
        expected: usize,
        got: usize,
    },
    #[error("kernel '{kind}' input {index} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        kind: String,
        index: usize,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("kernel '{kind}' input {index} has dtype {got:?}, expected {expected:?}")]
    DTypeMismatch {
        kind: String,
        index: usize,
        expected: DType,
        got: DType,
    },
    #[error("kernel '{kind}' requires attribute '{attr}'")]
    MissingAttr { kind: String, attr: &'static str },
    #[error("kernel '{kind}' expects exactly {expected} outputs, node declares {got}")]
    OutputArity {
        kind: String,
        expected: usize,
        got: usize,
    },
    #[error("no fold kernel registered for op kind '{0}'")]
    UnknownKind(String),
    #[error("kernel '{kind}' failed: {message}")]
    Compute { kind: String, message: String },
}

impl FoldError {
    /// True when the failure is a shape/type disagreement the invoking pass
    /// should downgrade to "cannot fold"; arity disagreements against the
    /// node's own declared slots are graph-validity problems instead.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            FoldError::ShapeMismatch { .. }
                | FoldError::DTypeMismatch { .. }
                | FoldError::MissingAttr { .. }
        )
    }
}

/// Pure compute contract invoked by folding passes. No graph access.
pub trait FoldKernel: Send + Sync {
    /// Op kind tag this kernel evaluates.
    fn op_kind(&self) -> &'static str;

    /// Validates the request and returns one value per declared output.
    fn compute(&self, request: &FoldRequest<'_>) -> Result<Vec<TensorValue>, FoldError>;
}

/// Explicit kernel registry keyed by op kind tag; constructed per
/// compilation and passed by reference, never process-global. New kinds
/// register without touching the dispatch core.
#[derive(Default)]
pub struct KernelRegistry {
    kernels: HashMap<&'static str, Arc<dyn FoldKernel>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in kernels.
    pub fn with_builtin_kernels() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FillKernel));
        registry.register(Arc::new(AddKernel));
        registry
    }

    pub fn register(&mut self, kernel: Arc<dyn FoldKernel>) {
        self.kernels.insert(kernel.op_kind(), kernel);
    }

    pub fn has(&self, kind: &str) -> bool {
        self.kernels.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.kernels.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Looks up the kernel for the request's kind and computes.
    pub fn compute(&self, request: &FoldRequest<'_>) -> Result<Vec<TensorValue>, FoldError> {
        let kernel = self
            .kernels
            .get(request.kind.as_str())
            .ok_or_else(|| FoldError::UnknownKind(request.kind.as_str().to_string()))?;
        kernel.compute(request)
    }
}

/// Shared validation: input count must match `expected`.
pub(crate) fn check_arity(
    kind: &OpKind,
    inputs: &[TensorValue],
    expected: usize,
) -> Result<(), FoldError> {
    if inputs.len() != expected {
        return Err(FoldError::Arity {
            kind: kind.as_str().to_string(),
            expected,
            got: inputs.len(),
        });
    }
    Ok(())
}

/// Shared validation: every input must match the reference spec exactly.
pub(crate) fn check_specs_match(
    kind: &OpKind,
    inputs: &[TensorValue],
    reference: &TensorSpec,
) -> Result<(), FoldError> {
    for (index, input) in inputs.iter().enumerate() {
        let spec = input.spec();
        if spec.dtype != reference.dtype {
            return Err(FoldError::DTypeMismatch {
                kind: kind.as_str().to_string(),
                index,
                expected: reference.dtype,
                got: spec.dtype,
            });
        }
        if spec.shape != reference.shape {
            return Err(FoldError::ShapeMismatch {
                kind: kind.as_str().to_string(),
                index,
                expected: reference.shape.dims().to_vec(),
                got: spec.shape.dims().to_vec(),
            });
        }
    }
    Ok(())
}
