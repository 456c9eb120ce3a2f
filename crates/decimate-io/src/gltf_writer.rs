// glTF writer for decimated meshes.
//
// Arrays are packed into one buffer view per (component type, target)
// pair, in order of first use. All views are then concatenated into a
// single binary buffer. Three output forms are supported:
//
// - **glTF + .bin** - `BuildResult::write_to(dir)`
// - **glTF (embedded)** - `BuildResult::to_embedded_json()`, base64 data URI
// - **GLB** - `BuildResult::to_glb()`
//
// # Example
//
// ```ignore
// let mut writer = GltfWriter::new();
// for mesh in &meshes {
//     writer.add_mesh(mesh)?;
// }
// let result = writer.finish(document.into_passthrough(&[]), "model")?;
// result.write_to("out/")?;
// ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use decimate_core::attribute_data::{AttributeData, DecodedAttribute};
use decimate_core::base64;
use decimate_core::data_types::{AccessorType, BufferTarget, ComponentType};
use decimate_core::mesh::{Mesh, Primitive};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::glb;

/// Errors that can occur when writing glTF files.
#[derive(Error, Debug)]
pub enum GltfWriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("Invalid GLB: {0}")]
    InvalidGlb(String),
}

pub type Result<T> = std::result::Result<T, GltfWriteError>;

// ============================================================================
// glTF JSON Schema for Writing
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessorOut {
    buffer_view: usize,
    #[serde(skip_serializing_if = "is_zero")]
    byte_offset: usize,
    component_type: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    normalized: bool,
    count: usize,
    #[serde(rename = "type")]
    accessor_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferViewOut {
    buffer: usize,
    #[serde(skip_serializing_if = "is_zero")]
    byte_offset: usize,
    byte_length: usize,
    target: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferOut {
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct MeshOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    primitives: Vec<PrimitiveOut>,
}

#[derive(Debug, Clone, Serialize)]
struct PrimitiveOut {
    attributes: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    material: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<u32>,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

// ============================================================================
// GltfWriter
// ============================================================================

struct ViewBuilder {
    component_type: ComponentType,
    target: BufferTarget,
    data: Vec<u8>,
}

/// Packs decoded meshes into accessors, buffer views and one buffer.
pub struct GltfWriter {
    align_buffer_views: bool,
    accessors: Vec<AccessorOut>,
    views: Vec<ViewBuilder>,
    view_by_key: HashMap<(ComponentType, BufferTarget), usize>,
    meshes: Vec<MeshOut>,
}

impl Default for GltfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl GltfWriter {
    pub fn new() -> Self {
        Self {
            align_buffer_views: false,
            accessors: Vec::new(),
            views: Vec::new(),
            view_by_key: HashMap::new(),
            meshes: Vec::new(),
        }
    }

    /// Pad each buffer view to a 4-byte boundary in the output buffer.
    pub fn with_aligned_buffer_views(mut self, align: bool) -> Self {
        self.align_buffer_views = align;
        self
    }

    pub fn num_accessors(&self) -> usize {
        self.accessors.len()
    }

    pub fn num_buffer_views(&self) -> usize {
        self.views.len()
    }

    /// Appends `attribute` to the view for its group and records an
    /// accessor with componentwise bounds. Returns the accessor index.
    pub fn add_accessor(&mut self, attribute: &DecodedAttribute, target: BufferTarget) -> Result<usize> {
        let width = attribute.num_components();
        if attribute.data.len() % width != 0 {
            return Err(GltfWriteError::InvalidAttribute(format!(
                "{} values do not form whole {} elements",
                attribute.data.len(),
                attribute.accessor_type.name()
            )));
        }

        let component_type = attribute.component_type();
        let view_index = self.view_for(component_type, target);
        let view = &mut self.views[view_index];
        let byte_offset = view.data.len();
        attribute.data.write_le_bytes(&mut view.data);

        let (min, max) = if attribute.data.is_empty() {
            (None, None)
        } else {
            let (min, max) = attribute.data.component_bounds(width);
            (
                Some(bound_values(component_type, &min)),
                Some(bound_values(component_type, &max)),
            )
        };

        self.accessors.push(AccessorOut {
            buffer_view: view_index,
            byte_offset,
            component_type: component_type.gl_enum(),
            normalized: attribute.normalized,
            count: attribute.count(),
            accessor_type: attribute.accessor_type.name(),
            min,
            max,
        });
        Ok(self.accessors.len() - 1)
    }

    /// Adds an index list as `UNSIGNED_INT` scalars.
    pub fn add_indices(&mut self, indices: &[u32]) -> Result<usize> {
        let attribute = DecodedAttribute::new(AttributeData::U32(indices.to_vec()), AccessorType::Scalar);
        self.add_accessor(&attribute, BufferTarget::ElementArrayBuffer)
    }

    fn view_for(&mut self, component_type: ComponentType, target: BufferTarget) -> usize {
        let views = &mut self.views;
        *self
            .view_by_key
            .entry((component_type, target))
            .or_insert_with(|| {
                views.push(ViewBuilder {
                    component_type,
                    target,
                    data: Vec::new(),
                });
                views.len() - 1
            })
    }

    pub fn add_primitive(&mut self, primitive: &Primitive) -> Result<PrimitiveIndices> {
        let mut attributes = BTreeMap::new();
        for (name, attribute) in &primitive.attributes {
            let accessor = self.add_accessor(attribute, BufferTarget::ArrayBuffer)?;
            attributes.insert(name.clone(), accessor);
        }
        let indices = if primitive.indices.is_empty() {
            None
        } else {
            Some(self.add_indices(&primitive.indices)?)
        };
        Ok(PrimitiveIndices { attributes, indices })
    }

    /// Adds every primitive of `mesh`. Returns the mesh index.
    pub fn add_mesh(&mut self, mesh: &Mesh) -> Result<usize> {
        let mut primitives = Vec::with_capacity(mesh.primitives.len());
        for primitive in &mesh.primitives {
            let PrimitiveIndices { attributes, indices } = self.add_primitive(primitive)?;
            primitives.push(PrimitiveOut {
                attributes,
                indices,
                material: primitive.material,
                mode: primitive.mode,
            });
        }
        self.meshes.push(MeshOut {
            name: mesh.name.clone(),
            primitives,
        });
        Ok(self.meshes.len() - 1)
    }

    /// Concatenates all views into one buffer and builds the output
    /// document from `passthrough` plus the new collections.
    pub fn finish(self, mut passthrough: Map<String, Value>, output_name: &str) -> Result<BuildResult> {
        let total: usize = self.views.iter().map(|v| v.data.len() + 3).sum();
        let mut buffer = Vec::with_capacity(total);
        let mut views_out = Vec::with_capacity(self.views.len());

        for view in &self.views {
            if self.align_buffer_views {
                buffer.resize(buffer.len() + (4 - buffer.len() % 4) % 4, 0);
            }
            debug!(
                "Buffer view {}: {:?}/{:?}, {} bytes at {}",
                views_out.len(),
                view.component_type,
                view.target,
                view.data.len(),
                buffer.len()
            );
            views_out.push(BufferViewOut {
                buffer: 0,
                byte_offset: buffer.len(),
                byte_length: view.data.len(),
                target: view.target.gl_enum(),
            });
            buffer.extend_from_slice(&view.data);
        }

        let buffer_uri = format!("{}.bin", output_name);
        let buffers = if buffer.is_empty() {
            Vec::new()
        } else {
            vec![BufferOut {
                byte_length: buffer.len(),
                uri: Some(buffer_uri.clone()),
            }]
        };

        passthrough.insert("accessors".into(), serde_json::to_value(&self.accessors)?);
        passthrough.insert("bufferViews".into(), serde_json::to_value(&views_out)?);
        passthrough.insert("buffers".into(), serde_json::to_value(&buffers)?);
        passthrough.insert("meshes".into(), serde_json::to_value(&self.meshes)?);

        Ok(BuildResult {
            document: Value::Object(passthrough),
            buffer,
            name: output_name.to_string(),
            buffer_uri,
        })
    }
}

/// Accessor indices assigned to one primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveIndices {
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
}

/// JSON bounds: integers for integral components, floats otherwise.
fn bound_values(component_type: ComponentType, values: &[f64]) -> Vec<Value> {
    values
        .iter()
        .map(|&v| {
            if component_type.is_integral() {
                Value::from(v as i64)
            } else {
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
            }
        })
        .collect()
}

// ============================================================================
// BuildResult
// ============================================================================

/// A rebuilt document plus its single binary buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResult {
    pub document: Value,
    pub buffer: Vec<u8>,
    /// Base name the outputs are written under.
    pub name: String,
    /// `uri` of the buffer inside `document`.
    pub buffer_uri: String,
}

impl BuildResult {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    /// Single JSON file with the buffer inlined as a base64 data URI.
    pub fn to_embedded_json(&self) -> Result<String> {
        let uri = format!("data:application/octet-stream;base64,{}", base64::encode(&self.buffer));
        let document = self.with_buffer_uri(Some(uri));
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// GLB with the buffer as its binary chunk.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let document = self.with_buffer_uri(None);
        let json = serde_json::to_vec(&document)?;
        let binary = (!self.buffer.is_empty()).then_some(self.buffer.as_slice());
        glb::write(&json, binary)
    }

    /// Writes `<name>.gltf` and the buffer file into `dir`. Returns the
    /// path of the `.gltf` file.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let json_path = dir.join(format!("{}.gltf", self.name));
        if !self.buffer.is_empty() {
            fs::write(dir.join(&self.buffer_uri), &self.buffer)?;
        }
        fs::write(&json_path, self.to_json_string()?)?;
        Ok(json_path)
    }

    fn with_buffer_uri(&self, uri: Option<String>) -> Value {
        let mut document = self.document.clone();
        if let Some(buffer) = document
            .get_mut("buffers")
            .and_then(Value::as_array_mut)
            .and_then(|buffers| buffers.first_mut())
            .and_then(Value::as_object_mut)
        {
            match uri {
                Some(uri) => {
                    buffer.insert("uri".into(), Value::String(uri));
                }
                None => {
                    buffer.remove("uri");
                }
            }
        }
        document
    }
}
