//! Minimal tensor metadata shared between the graph model, the fold kernel
//! interface, and lowering.

use std::sync::Arc;

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use thiserror::Error;

/// Scalar element types the core needs to reason about.
///
/// The full dtype lattice is owned by the operator registry; the compiler
/// core only needs enough to size buffers and validate fold kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    I1,
    Si32,
    F32,
}

impl DType {
    pub fn is_integer(self) -> bool {
        matches!(self, DType::Si32)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32)
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::I1 => 1,
            DType::Si32 => 4,
            DType::F32 => 4,
        }
    }
}

/// Logical tensor shape as an ordered list of static extents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the element count, or `None` on overflow.
    pub fn element_count(&self) -> Option<usize> {
        let mut count = 1usize;
        for dim in &self.dims {
            count = count.checked_mul(*dim)?;
        }
        Some(count)
    }

    /// A shape with any zero extent holds no elements.
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|dim| *dim == 0)
    }
}

/// Tensor metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    pub fn element_count(&self) -> Option<usize> {
        self.shape.element_count()
    }

    pub fn byte_len(&self) -> Option<usize> {
        self.element_count()?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

/// Errors raised when constructing dense tensor values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("payload of {got} bytes does not match spec requiring {expected} bytes")]
    ByteLenMismatch { expected: usize, got: usize },
    #[error("spec byte length overflows")]
    ByteLenOverflow,
}

/// Dense tensor payload used for folded constants and attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorValue {
    spec: TensorSpec,
    bytes: Arc<[u8]>,
}

impl TensorValue {
    pub fn new(spec: TensorSpec, bytes: Arc<[u8]>) -> Result<Self, ValueError> {
        let expected = spec.byte_len().ok_or(ValueError::ByteLenOverflow)?;
        if bytes.len() != expected {
            return Err(ValueError::ByteLenMismatch {
                expected,
                got: bytes.len(),
            });
        }
        Ok(Self { spec, bytes })
    }

    /// An all-zero value of the given spec; the natural payload for
    /// zero-element shapes.
    pub fn zeroed(spec: TensorSpec) -> Result<Self, ValueError> {
        let len = spec.byte_len().ok_or(ValueError::ByteLenOverflow)?;
        Ok(Self {
            spec,
            bytes: vec![0u8; len].into(),
        })
    }

    pub fn from_f32s(shape: Shape, values: &[f32]) -> Result<Self, ValueError> {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Self::new(TensorSpec::new(DType::F32, shape), bytes.into())
    }

    pub fn from_i32s(shape: Shape, values: &[i32]) -> Result<Self, ValueError> {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Self::new(TensorSpec::new(DType::Si32, shape), bytes.into())
    }

    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Decodes the payload as little-endian f32s when the dtype matches.
    pub fn f32_values(&self) -> Option<Vec<f32>> {
        if self.spec.dtype != DType::F32 {
            return None;
        }
        Some(
            self.bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    /// Decodes the payload as little-endian i32s when the dtype matches.
    pub fn i32_values(&self) -> Option<Vec<i32>> {
        if self.spec.dtype != DType::Si32 {
            return None;
        }
        Some(
            self.bytes
                .chunks_exact(4)
                .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }
}

impl Serialize for TensorValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TensorValue", 2)?;
        state.serialize_field("spec", &self.spec)?;
        state.serialize_field("bytes", &self.bytes.as_ref())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TensorValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TensorValueHelper {
            spec: TensorSpec,
            bytes: Vec<u8>,
        }

        let helper = TensorValueHelper::deserialize(deserializer)?;
        TensorValue::new(helper.spec, Arc::<[u8]>::from(helper.bytes))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_count_handles_empty_and_scalar_shapes() {
        assert_eq!(Shape::scalar().element_count(), Some(1));
        assert_eq!(Shape::new([2, 3]).element_count(), Some(6));
        assert_eq!(Shape::new([4, 0, 2]).element_count(), Some(0));
        assert!(Shape::new([4, 0, 2]).is_empty());
    }

    #[test]
    fn value_construction_validates_byte_length() {
        let spec = TensorSpec::new(DType::F32, Shape::new([2]));
        let err = TensorValue::new(spec, vec![0u8; 3].into()).unwrap_err();
        assert_eq!(err, ValueError::ByteLenMismatch { expected: 8, got: 3 });
    }

    #[test]
    fn f32_round_trip() {
        let value = TensorValue::from_f32s(Shape::new([3]), &[1.0, -2.5, 0.0]).unwrap();
        assert_eq!(value.f32_values().unwrap(), vec![1.0, -2.5, 0.0]);
        assert_eq!(value.i32_values(), None);
    }
}
