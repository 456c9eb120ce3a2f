//! Decoded meshes and primitives.

use std::collections::BTreeMap;

use crate::attribute_data::{AttributeData, DecodedAttribute};

/// Attribute semantics the pipeline reads and remaps.
pub mod semantic {
    pub const POSITION: &str = "POSITION";
    pub const NORMAL: &str = "NORMAL";
    pub const TEXCOORD_0: &str = "TEXCOORD_0";
    pub const TEXCOORD_1: &str = "TEXCOORD_1";
    pub const WEIGHTS_0: &str = "WEIGHTS_0";
    pub const JOINTS_0: &str = "JOINTS_0";
    pub const COLOR_0: &str = "COLOR_0";

    pub const ALL: [&str; 7] = [
        POSITION, NORMAL, TEXCOORD_0, TEXCOORD_1, WEIGHTS_0, JOINTS_0, COLOR_0,
    ];

    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// glTF primitive mode for triangle lists.
pub const MODE_TRIANGLES: u32 = 4;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Primitive {
    /// Keyed by semantic name. Ordered so re-encoding is deterministic.
    pub attributes: BTreeMap<String, DecodedAttribute>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
    pub mode: Option<u32>,
}

impl Primitive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_triangles(&self) -> bool {
        self.mode.map_or(true, |mode| mode == MODE_TRIANGLES)
    }

    pub fn attribute(&self, semantic: &str) -> Option<&DecodedAttribute> {
        self.attributes.get(semantic)
    }

    pub fn position(&self) -> Option<&DecodedAttribute> {
        self.attribute(semantic::POSITION)
    }

    /// Vertex count implied by `POSITION`, or 0 without positions.
    pub fn num_vertices(&self) -> usize {
        self.position().map_or(0, DecodedAttribute::count)
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Positions as three floats per vertex.
    pub fn positions_f32(&self) -> Option<Vec<f32>> {
        self.position().map(|p| match &p.data {
            AttributeData::F32(values) => values.clone(),
            other => other.to_f32_vec(),
        })
    }

    /// `TEXCOORD_0` as two floats per vertex, when present as `VEC2`.
    pub fn texcoords_f32(&self) -> Option<Vec<f32>> {
        self.attribute(semantic::TEXCOORD_0)
            .filter(|uv| uv.num_components() == 2)
            .map(|uv| uv.data.to_f32_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn num_vertices(&self) -> usize {
        self.primitives.iter().map(Primitive::num_vertices).sum()
    }

    pub fn num_triangles(&self) -> usize {
        self.primitives.iter().map(Primitive::num_triangles).sum()
    }
}
