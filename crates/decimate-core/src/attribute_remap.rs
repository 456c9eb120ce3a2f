//! Reprojection of vertex attributes onto a reduced vertex numbering.
//!
//! The reducer hands back, for every slot of the reduced index list, the
//! original vertex that slot was derived from. Attribute element
//! `correspondence[i]` of the source is copied to element
//! `reduced_indices[i]` of the destination. A destination vertex shared by
//! several corners is written once per corner; [`ConflictPolicy`] decides
//! which write survives.

use log::warn;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::attribute_data::{map_values, AttributeData};
use crate::status::{invalid_parameter, CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    LastWriteWins,
    FirstWriteWins,
}

/// Remaps `attribute` (elements of `num_components` values) onto
/// `new_vertex_count` vertices. Vertices never referenced stay zero.
pub fn remap(
    attribute: &AttributeData,
    num_components: usize,
    new_vertex_count: usize,
    reduced_indices: &[u32],
    correspondence: &[u32],
    policy: ConflictPolicy,
) -> CoreResult<AttributeData> {
    if num_components == 0 {
        return Err(invalid_parameter("attribute element width must be at least 1"));
    }
    if reduced_indices.len() != correspondence.len() {
        return Err(CoreError::RemapLengthMismatch {
            indices: reduced_indices.len(),
            correspondence: correspondence.len(),
        });
    }

    let remapped = map_values!(attribute, values => remap_slice(
        values,
        num_components,
        new_vertex_count,
        reduced_indices,
        correspondence,
        policy,
    )?);
    Ok(remapped)
}

fn remap_slice<T: Copy + Zero + PartialEq>(
    source: &[T],
    width: usize,
    new_vertex_count: usize,
    reduced_indices: &[u32],
    correspondence: &[u32],
    policy: ConflictPolicy,
) -> CoreResult<Vec<T>> {
    let source_count = source.len() / width;
    let mut destination = vec![T::zero(); new_vertex_count * width];
    let mut written = vec![false; new_vertex_count];
    let mut conflicts = 0usize;

    for (&dst, &src) in reduced_indices.iter().zip(correspondence) {
        let (dst, src) = (dst as usize, src as usize);
        if dst >= new_vertex_count {
            return Err(CoreError::RemapOutOfRange(format!(
                "reduced index {} >= vertex count {}",
                dst, new_vertex_count
            )));
        }
        if src >= source_count {
            return Err(CoreError::RemapOutOfRange(format!(
                "source vertex {} >= source count {}",
                src, source_count
            )));
        }

        let from = &source[src * width..(src + 1) * width];
        let to = &mut destination[dst * width..(dst + 1) * width];
        if written[dst] {
            if to != from {
                conflicts += 1;
            }
            if policy == ConflictPolicy::FirstWriteWins {
                continue;
            }
        }
        to.copy_from_slice(from);
        written[dst] = true;
    }

    if conflicts > 0 {
        warn!(
            "{} corner writes disagreed with an earlier write to the same vertex ({:?})",
            conflicts, policy
        );
    }

    Ok(destination)
}
