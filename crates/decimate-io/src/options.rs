use decimate_core::attribute_remap::ConflictPolicy;
use decimate_core::reduction::validate_ratio;
use serde::{Deserialize, Serialize};

use crate::gltf_reader::Result;

/// Settings for one decimation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyOptions {
    /// Target fraction of triangles to keep, in `(0, 1]`.
    pub ratio: f32,
    /// Base name of the outputs; the buffer is written as `<name>.bin`.
    pub output_name: String,
    pub conflict_policy: ConflictPolicy,
    /// Fail on unknown component codes instead of decoding them as floats.
    pub strict_component_types: bool,
    /// Start every output buffer view on a 4-byte boundary.
    pub align_buffer_views: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            ratio: 0.5,
            output_name: "output".to_string(),
            conflict_policy: ConflictPolicy::default(),
            strict_component_types: false,
            align_buffer_views: false,
        }
    }
}

impl SimplifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_strict_component_types(mut self, strict: bool) -> Self {
        self.strict_component_types = strict;
        self
    }

    pub fn with_aligned_buffer_views(mut self, align: bool) -> Self {
        self.align_buffer_views = align;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_ratio(self.ratio)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf_reader::GltfError;

    #[test]
    fn test_defaults() {
        let options = SimplifyOptions::default();
        assert_eq!(options.ratio, 0.5);
        assert_eq!(options.output_name, "output");
        assert_eq!(options.conflict_policy, ConflictPolicy::LastWriteWins);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let options =
            SimplifyOptions::from_json(r#"{"ratio": 0.25, "conflict_policy": "first_write_wins"}"#)
                .unwrap();
        assert_eq!(options.ratio, 0.25);
        assert_eq!(options.conflict_policy, ConflictPolicy::FirstWriteWins);
        assert_eq!(options.output_name, "output");
    }

    #[test]
    fn test_ratio_out_of_range() {
        for ratio in [0.0, -1.0, 1.01] {
            assert!(matches!(
                SimplifyOptions::new().with_ratio(ratio).validate(),
                Err(GltfError::Reduction(_))
            ));
        }
        assert!(SimplifyOptions::new().with_ratio(1.0).validate().is_ok());
    }
}
