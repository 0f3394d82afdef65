use crate::graph::{keys, ops, AttrValue};
use crate::tensor::{DType, Shape, TensorValue, ValueError};

use super::{check_arity, check_specs_match, FoldError, FoldKernel, FoldRequest};

fn value_error(kind: &str, err: ValueError) -> FoldError {
    FoldError::Compute {
        kind: kind.to_string(),
        message: err.to_string(),
    }
}

/// Fills the declared output spec with the scalar carried by the node's
/// fill attribute. Takes no data inputs, so it also covers zero-element
/// output shapes.
pub struct FillKernel;

impl FoldKernel for FillKernel {
    fn op_kind(&self) -> &'static str {
        ops::FILL
    }

    fn compute(&self, request: &FoldRequest<'_>) -> Result<Vec<TensorValue>, FoldError> {
        check_arity(request.kind, request.inputs, 0)?;
        if request.outputs.len() != 1 {
            return Err(FoldError::OutputArity {
                kind: request.kind.as_str().to_string(),
                expected: 1,
                got: request.outputs.len(),
            });
        }
        let attr = request
            .attrs
            .get(keys::FILL_VALUE)
            .ok_or(FoldError::MissingAttr {
                kind: request.kind.as_str().to_string(),
                attr: keys::FILL_VALUE,
            })?;
        let spec = &request.outputs[0];
        let count = spec.element_count().ok_or_else(|| FoldError::Compute {
            kind: request.kind.as_str().to_string(),
            message: "output element count overflows".to_string(),
        })?;
        let value = match (spec.dtype, attr) {
            (DType::F32, AttrValue::F64(scalar)) => TensorValue::from_f32s(
                spec.shape.clone(),
                &vec![*scalar as f32; count],
            ),
            (DType::Si32, AttrValue::I64(scalar)) => TensorValue::from_i32s(
                spec.shape.clone(),
                &vec![*scalar as i32; count],
            ),
            _ => {
                return Err(FoldError::MissingAttr {
                    kind: request.kind.as_str().to_string(),
                    attr: keys::FILL_VALUE,
                })
            }
        };
        Ok(vec![value.map_err(|e| value_error(request.kind.as_str(), e))?])
    }
}

/// Elementwise addition over two inputs of identical spec.
pub struct AddKernel;

impl FoldKernel for AddKernel {
    fn op_kind(&self) -> &'static str {
        ops::ADD
    }

    fn compute(&self, request: &FoldRequest<'_>) -> Result<Vec<TensorValue>, FoldError> {
        check_arity(request.kind, request.inputs, 2)?;
        if request.outputs.len() != 1 {
            return Err(FoldError::OutputArity {
                kind: request.kind.as_str().to_string(),
                expected: 1,
                got: request.outputs.len(),
            });
        }
        let out = &request.outputs[0];
        check_specs_match(request.kind, request.inputs, out)?;

        let shape: Shape = out.shape.clone();
        let lhs = &request.inputs[0];
        let rhs = &request.inputs[1];
        let value = match out.dtype {
            DType::F32 => {
                let a = lhs.f32_values().ok_or_else(|| bad_payload(request))?;
                let b = rhs.f32_values().ok_or_else(|| bad_payload(request))?;
                let sum: Vec<f32> = a.iter().zip(b.iter()).map(|(x, y)| x + y).collect();
                TensorValue::from_f32s(shape, &sum)
            }
            DType::Si32 => {
                let a = lhs.i32_values().ok_or_else(|| bad_payload(request))?;
                let b = rhs.i32_values().ok_or_else(|| bad_payload(request))?;
                let sum: Vec<i32> = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| x.wrapping_add(*y))
                    .collect();
                TensorValue::from_i32s(shape, &sum)
            }
            DType::I1 => {
                return Err(FoldError::DTypeMismatch {
                    kind: request.kind.as_str().to_string(),
                    index: 0,
                    expected: DType::F32,
                    got: DType::I1,
                })
            }
        };
        Ok(vec![value.map_err(|e| value_error(request.kind.as_str(), e))?])
    }
}

fn bad_payload(request: &FoldRequest<'_>) -> FoldError {
    FoldError::Compute {
        kind: request.kind.as_str().to_string(),
        message: "input payload does not decode as its declared dtype".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttrMap, OpKind};
    use crate::tensor::TensorSpec;

    fn f32_spec(dims: &[usize]) -> TensorSpec {
        TensorSpec::new(DType::F32, Shape::new(dims))
    }

    #[test]
    fn add_folds_matching_inputs() {
        let kind = OpKind::new(ops::ADD);
        let attrs = AttrMap::new();
        let lhs = TensorValue::from_f32s(Shape::new([2]), &[1.0, 2.0]).unwrap();
        let rhs = TensorValue::from_f32s(Shape::new([2]), &[10.0, 20.0]).unwrap();
        let outputs = [f32_spec(&[2])];
        let request = FoldRequest {
            kind: &kind,
            attrs: &attrs,
            inputs: &[lhs, rhs],
            outputs: &outputs,
        };
        let result = AddKernel.compute(&request).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].f32_values().unwrap(), vec![11.0, 22.0]);
    }

    #[test]
    fn add_rejects_shape_mismatch_without_output() {
        let kind = OpKind::new(ops::ADD);
        let attrs = AttrMap::new();
        let lhs = TensorValue::from_f32s(Shape::new([2]), &[1.0, 2.0]).unwrap();
        let rhs = TensorValue::from_f32s(Shape::new([3]), &[1.0, 2.0, 3.0]).unwrap();
        let outputs = [f32_spec(&[2])];
        let request = FoldRequest {
            kind: &kind,
            attrs: &attrs,
            inputs: &[lhs, rhs],
            outputs: &outputs,
        };
        let err = AddKernel.compute(&request).unwrap_err();
        assert!(err.is_type_mismatch(), "unexpected error: {err}");
    }

    #[test]
    fn fill_produces_empty_value_for_zero_element_shape() {
        let kind = OpKind::new(ops::FILL);
        let mut attrs = AttrMap::new();
        attrs.insert(keys::FILL_VALUE.to_string(), AttrValue::F64(3.0));
        let outputs = [f32_spec(&[0, 4])];
        let request = FoldRequest {
            kind: &kind,
            attrs: &attrs,
            inputs: &[],
            outputs: &outputs,
        };
        let result = FillKernel.compute(&request).unwrap();
        assert_eq!(result[0].byte_len(), 0);
    }
}
