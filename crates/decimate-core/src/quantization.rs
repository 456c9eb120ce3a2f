//! Dequantization for `WEB3D_quantized_attributes` accessors.

use crate::attribute_data::AttributeData;
use crate::status::{CoreError, CoreResult};

/// Per-component affine decode: `value * scale[k] + offset[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dequantizer {
    scale: Vec<f32>,
    offset: Vec<f32>,
}

impl Dequantizer {
    /// Builds a dequantizer from a flat column-major decode matrix with
    /// side `num_components + 1`. The scale is read from the diagonal and
    /// the offset from the last column.
    pub fn from_decode_matrix(matrix: &[f32], num_components: usize) -> CoreResult<Self> {
        let side = num_components + 1;
        if num_components == 0 || matrix.len() != side * side {
            return Err(CoreError::InvalidDecodeMatrix(format!(
                "expected {} entries for {} components, got {}",
                side * side,
                num_components,
                matrix.len()
            )));
        }
        let scale = (0..num_components).map(|k| matrix[k * side + k]).collect();
        let offset = (0..num_components)
            .map(|k| matrix[num_components * side + k])
            .collect();
        Ok(Self { scale, offset })
    }

    pub fn num_components(&self) -> usize {
        self.scale.len()
    }

    pub fn scale(&self) -> &[f32] {
        &self.scale
    }

    pub fn offset(&self) -> &[f32] {
        &self.offset
    }

    /// Produces a fresh float array from quantized values.
    pub fn dequantize(&self, data: &AttributeData) -> Vec<f32> {
        let size = self.num_components();
        let raw = data.to_f32_vec();
        let mut decoded = vec![0.0f32; raw.len() - raw.len() % size];
        for (out, element) in decoded.chunks_exact_mut(size).zip(raw.chunks_exact(size)) {
            for k in 0..size {
                out[k] = element[k] * self.scale[k] + self.offset[k];
            }
        }
        decoded
    }
}
