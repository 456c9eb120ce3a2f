//! Contract of the external geometry-reduction routine.
//!
//! The pipeline only sees the [`Reducer`] trait. Implementations that
//! cross into a foreign address space live in [`crate::foreign_heap`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReductionError {
    #[error("Target ratio {0} outside (0, 1]")]
    InvalidRatio(f32),
    #[error("Invalid reduction input: {0}")]
    InvalidInput(String),
    #[error("Allocation of {bytes} bytes in the reduction heap failed")]
    AllocationFailed { bytes: usize },
    #[error("Reduction routine returned status {status}")]
    RoutineFailed { status: i32 },
    #[error("Reduction output larger than its input: {0}")]
    OutputOverflow(String),
    #[error("Invalid reduction output: {0}")]
    InvalidOutput(String),
}

/// Flat input arrays for one primitive.
#[derive(Debug, Clone, Copy)]
pub struct ReductionInput<'a> {
    /// Three floats per vertex.
    pub positions: &'a [f32],
    /// Three indices per triangle.
    pub indices: &'a [u32],
    pub ratio: f32,
    /// Two floats per vertex, when the primitive has `TEXCOORD_0`.
    pub texcoords: Option<&'a [f32]>,
}

impl<'a> ReductionInput<'a> {
    pub fn new(positions: &'a [f32], indices: &'a [u32], ratio: f32) -> Self {
        Self {
            positions,
            indices,
            ratio,
            texcoords: None,
        }
    }

    pub fn with_texcoords(mut self, texcoords: &'a [f32]) -> Self {
        self.texcoords = Some(texcoords);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Checks the shape invariants the routine relies on.
    pub fn validate(&self) -> Result<(), ReductionError> {
        validate_ratio(self.ratio)?;
        if self.positions.len() % 3 != 0 {
            return Err(ReductionError::InvalidInput(format!(
                "{} position floats is not a multiple of 3",
                self.positions.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(ReductionError::InvalidInput(format!(
                "{} indices is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertex_count();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(ReductionError::InvalidInput(format!(
                "index {} >= vertex count {}",
                bad, vertex_count
            )));
        }
        if let Some(uvs) = self.texcoords {
            if uvs.len() != vertex_count * 2 {
                return Err(ReductionError::InvalidInput(format!(
                    "{} texcoord floats for {} vertices",
                    uvs.len(),
                    vertex_count
                )));
            }
        }
        Ok(())
    }
}

pub fn validate_ratio(ratio: f32) -> Result<(), ReductionError> {
    if ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(ReductionError::InvalidRatio(ratio))
    }
}

/// Output of one reduction call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReductionResult {
    /// Three floats per retained vertex.
    pub vertices: Vec<f32>,
    /// Three indices per retained triangle, into `vertices`.
    pub indices: Vec<u32>,
    /// Per index slot, the original vertex the slot came from. Same
    /// length as `indices` when present.
    pub correspondence: Option<Vec<u32>>,
}

impl ReductionResult {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Checks that indices address returned vertices and that the
    /// correspondence, when present, covers every index slot.
    pub fn validate(&self) -> Result<(), ReductionError> {
        let vertex_count = self.vertex_count();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(ReductionError::InvalidOutput(format!(
                "index {} >= vertex count {}",
                bad, vertex_count
            )));
        }
        match &self.correspondence {
            Some(c) if c.len() != self.indices.len() => Err(ReductionError::InvalidOutput(format!(
                "{} correspondence entries for {} indices",
                c.len(),
                self.indices.len()
            ))),
            _ => Ok(()),
        }
    }
}

/// A geometry-reduction routine. Called at most once per primitive.
pub trait Reducer {
    fn reduce(&mut self, input: &ReductionInput<'_>) -> Result<ReductionResult, ReductionError>;
}

impl<R: Reducer + ?Sized> Reducer for &mut R {
    fn reduce(&mut self, input: &ReductionInput<'_>) -> Result<ReductionResult, ReductionError> {
        (**self).reduce(input)
    }
}

/// Returns its input unchanged, with `correspondence == indices`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReducer;

impl Reducer for IdentityReducer {
    fn reduce(&mut self, input: &ReductionInput<'_>) -> Result<ReductionResult, ReductionError> {
        input.validate()?;
        Ok(ReductionResult {
            vertices: input.positions.to_vec(),
            indices: input.indices.to_vec(),
            correspondence: Some(input.indices.to_vec()),
        })
    }
}
