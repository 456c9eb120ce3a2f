//! Parsed glTF JSON.
//!
//! A [`Document`] keeps the raw JSON object alongside a typed view of the
//! four collections the decimator rewrites (`accessors`, `bufferViews`,
//! `buffers`, `meshes`). Everything else stays in the raw object and is
//! moved, not copied, into the output.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::gltf_reader::{GltfError, Result};

/// Top-level keys replaced on re-encode.
pub const REPLACED_KEYS: [&str; 4] = ["accessors", "bufferViews", "buffers", "meshes"];

pub const QUANTIZED_ATTRIBUTES_EXTENSION: &str = "WEB3D_quantized_attributes";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GltfRoot {
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub meshes: Vec<GltfMesh>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: Option<usize>,
    pub component_type: u32,
    #[serde(default)]
    pub normalized: bool,
    pub count: usize,
    /// Absent on some index accessors in the wild; treated as `SCALAR`
    /// for indices.
    #[serde(rename = "type")]
    pub accessor_type: Option<String>,
    pub extensions: Option<AccessorExtensions>,
}

impl Accessor {
    pub fn decode_matrix(&self) -> Option<&[f32]> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.quantized_attributes.as_ref())
            .map(|q| q.decode_matrix.as_slice())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessorExtensions {
    #[serde(rename = "WEB3D_quantized_attributes")]
    pub quantized_attributes: Option<QuantizedAttributes>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizedAttributes {
    pub decode_matrix: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: Option<usize>,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: usize,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GltfMesh {
    pub name: Option<String>,
    #[serde(default)]
    pub primitives: Vec<GltfPrimitive>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GltfPrimitive {
    #[serde(default)]
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: Option<u32>,
}

/// A glTF document: raw JSON plus the typed collections.
#[derive(Debug)]
pub struct Document {
    json: Map<String, Value>,
    root: GltfRoot,
}

impl Document {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let root = GltfRoot::deserialize(&value)?;
        match value {
            Value::Object(json) => Ok(Self { json, root }),
            _ => Err(GltfError::InvalidGltf(
                "document root is not a JSON object".into(),
            )),
        }
    }

    pub fn root(&self) -> &GltfRoot {
        &self.root
    }

    pub fn json(&self) -> &Map<String, Value> {
        &self.json
    }

    pub fn uses_extension(&self, name: &str) -> bool {
        self.json
            .get("extensionsUsed")
            .and_then(Value::as_array)
            .map_or(false, |used| used.iter().any(|e| e.as_str() == Some(name)))
    }

    /// Consumes the document, returning every top-level field except the
    /// replaced collections. `extensions` names are removed from
    /// `extensionsUsed`/`extensionsRequired`; emptied lists are dropped.
    pub fn into_passthrough(mut self, stripped_extensions: &[&str]) -> Map<String, Value> {
        for key in REPLACED_KEYS {
            self.json.remove(key);
        }
        for list in ["extensionsUsed", "extensionsRequired"] {
            let now_empty = match self.json.get_mut(list) {
                Some(Value::Array(names)) => {
                    names.retain(|n| !n.as_str().map_or(false, |n| stripped_extensions.contains(&n)));
                    names.is_empty()
                }
                _ => false,
            };
            if now_empty {
                self.json.remove(list);
            }
        }
        self.json
    }
}
