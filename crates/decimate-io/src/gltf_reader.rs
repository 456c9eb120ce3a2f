//! glTF/GLB reader producing decoded meshes.
//!
//! Reading happens in three steps, each usable on its own:
//! - [`parse_asset`] detects the container by its magic bytes and yields
//!   the [`Document`] plus any GLB binary chunks (borrowed, not copied);
//! - [`assemble_buffers`] binds every declared buffer to its bytes,
//!   fetching external and inline buffers in parallel;
//! - [`GltfReader`] validates buffer views once and decodes accessors.
//!
//! # Example
//!
//! ```ignore
//! use decimate_io::gltf_reader::GltfReader;
//!
//! let reader = GltfReader::open("models/scene.gltf")?;
//! for mesh in reader.decode_meshes()? {
//!     println!("{:?}: {} triangles", mesh.name, mesh.num_triangles());
//! }
//! ```

use std::borrow::Cow;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;

use decimate_core::attribute_data::{AttributeData, DecodedAttribute};
use decimate_core::data_types::{AccessorType, ComponentType};
use decimate_core::mesh::{semantic, Mesh, Primitive};
use decimate_core::quantization::Dequantizer;
use decimate_core::{base64, path_resolver, CoreError, ReductionError};
use log::{debug, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::buffer_loader::{BufferLoader, FileSystemLoader};
use crate::document::{Accessor, Document, GltfPrimitive};
use crate::glb;
use crate::gltf_writer::GltfWriteError;

/// Errors that can occur while reading or decimating glTF assets.
#[derive(Error, Debug)]
pub enum GltfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid GLB: {0}")]
    InvalidGlb(String),

    #[error("Unsupported GLB version {0}, need at least {min}", min = glb::GLB_VERSION)]
    UnsupportedVersion(u32),

    #[error("GLB has no JSON chunk")]
    MissingJsonChunk,

    #[error("Document declares {expected} buffers but {actual} could be assembled")]
    BufferCountMismatch { expected: usize, actual: usize },

    #[error("Failed to load buffer '{path}': {source}")]
    BufferLoad {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid glTF: {0}")]
    InvalidGltf(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Reduction(#[from] ReductionError),

    #[error(transparent)]
    Write(#[from] GltfWriteError),

    #[error("Pipeline already ran; create a new one per asset")]
    PipelineReused,
}

pub type Result<T> = std::result::Result<T, GltfError>;

/// Largest zero-filled array an accessor without a bufferView may claim.
pub const MAX_ZERO_FILL_BYTES: usize = 1 << 28;

// ============================================================================
// Parsing and buffer assembly
// ============================================================================

/// A parsed document plus the binary chunks of its container.
#[derive(Debug)]
pub struct ParsedAsset<'a> {
    pub document: Document,
    /// Empty for text assets.
    pub binary_chunks: Vec<&'a [u8]>,
}

/// Parses a text glTF or a GLB container, chosen by magic bytes.
pub fn parse_asset(data: &[u8]) -> Result<ParsedAsset<'_>> {
    if glb::is_glb(data) {
        let container = glb::parse(data)?;
        debug!(
            "GLB container: {} byte JSON chunk, {} binary chunks",
            container.json.len(),
            container.binary.len()
        );
        Ok(ParsedAsset {
            document: Document::from_slice(container.json)?,
            binary_chunks: container.binary,
        })
    } else {
        Ok(ParsedAsset {
            document: Document::from_slice(data)?,
            binary_chunks: Vec::new(),
        })
    }
}

enum BufferSource<'a, 'd> {
    Chunk(&'a [u8]),
    Inline(&'d str),
    External(String),
}

/// Produces one byte array per declared buffer, in declaration order.
///
/// Buffers without a `uri` take the next unused binary chunk. Inline
/// buffers are decoded and external ones are resolved against `root`
/// (the referencing document's path) and fetched through `loader`.
pub fn assemble_buffers<'a, L: BufferLoader>(
    document: &Document,
    binary_chunks: &[&'a [u8]],
    root: &str,
    loader: &L,
) -> Result<Vec<Cow<'a, [u8]>>> {
    let declared = &document.root().buffers;
    let mut chunks = binary_chunks.iter().copied();

    let mut sources = Vec::with_capacity(declared.len());
    for (index, buffer) in declared.iter().enumerate() {
        match buffer.uri.as_deref() {
            Some(uri) if path_resolver::is_data_uri(uri) => sources.push(BufferSource::Inline(uri)),
            Some(uri) => sources.push(BufferSource::External(path_resolver::resolve(uri, root)?)),
            None => match chunks.next() {
                Some(chunk) => sources.push(BufferSource::Chunk(chunk)),
                None => warn!("Buffer {} has no uri and no binary chunk is left for it", index),
            },
        }
    }

    // Every source yields exactly one buffer or an error, so the count is
    // final before any fetching starts.
    if sources.len() != declared.len() {
        return Err(GltfError::BufferCountMismatch {
            expected: declared.len(),
            actual: sources.len(),
        });
    }

    let buffers: Result<Vec<_>> = sources
        .into_par_iter()
        .map(|source| load_source(source, loader))
        .collect();
    let buffers = buffers?;

    for (index, (bytes, buffer)) in buffers.iter().zip(declared).enumerate() {
        if bytes.len() < buffer.byte_length {
            return Err(GltfError::InvalidGltf(format!(
                "Buffer {} declares {} bytes but only {} were loaded",
                index,
                buffer.byte_length,
                bytes.len()
            )));
        }
    }

    Ok(buffers)
}

fn load_source<'a, L: BufferLoader>(source: BufferSource<'a, '_>, loader: &L) -> Result<Cow<'a, [u8]>> {
    match source {
        BufferSource::Chunk(chunk) => Ok(Cow::Borrowed(chunk)),
        BufferSource::Inline(uri) => decode_data_uri(uri).map(Cow::Owned),
        BufferSource::External(path) => {
            debug!("Loading external buffer {}", path);
            loader
                .load(&path)
                .map(Cow::Owned)
                .map_err(|source| GltfError::BufferLoad { path, source })
        }
    }
}

/// Decodes a `data:<mime>;base64,<payload>` reference.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let offset = path_resolver::data_uri_payload_offset(uri).ok_or_else(|| {
        let head: String = uri.chars().take(48).collect();
        GltfError::InvalidGltf(format!("Data URI is not base64: {}", head))
    })?;
    Ok(base64::decode(uri, offset)?)
}

// ============================================================================
// GltfReader
// ============================================================================

#[derive(Debug, Clone)]
struct ViewRange {
    buffer: usize,
    range: Range<usize>,
    stride: Option<usize>,
}

/// Decodes accessors and meshes from an assembled asset.
#[derive(Debug)]
pub struct GltfReader<'a> {
    document: Document,
    buffers: Vec<Cow<'a, [u8]>>,
    views: Vec<ViewRange>,
    strict_component_types: bool,
}

impl GltfReader<'static> {
    /// Open a `.gltf` or `.glb` file. External buffers are read relative
    /// to the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let root = path.to_string_lossy();
        let reader = GltfReader::from_slice(&data, &root, &FileSystemLoader::new())?;
        Ok(reader.into_owned())
    }
}

impl<'a> GltfReader<'a> {
    /// Validates every buffer view against its buffer.
    pub fn new(document: Document, buffers: Vec<Cow<'a, [u8]>>) -> Result<Self> {
        let views = document
            .root()
            .buffer_views
            .iter()
            .enumerate()
            .map(|(index, view)| {
                let buffer = buffers.get(view.buffer).ok_or_else(|| {
                    GltfError::InvalidGltf(format!(
                        "Buffer view {} references missing buffer {}",
                        index, view.buffer
                    ))
                })?;
                let start = view.byte_offset.unwrap_or(0);
                let end = start
                    .checked_add(view.byte_length)
                    .filter(|&end| end <= buffer.len())
                    .ok_or_else(|| {
                        GltfError::InvalidGltf(format!(
                            "Buffer view {} ({} + {}) extends past buffer {} ({} bytes)",
                            index,
                            start,
                            view.byte_length,
                            view.buffer,
                            buffer.len()
                        ))
                    })?;
                Ok(ViewRange {
                    buffer: view.buffer,
                    range: start..end,
                    stride: view.byte_stride,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            document,
            buffers,
            views,
            strict_component_types: false,
        })
    }

    /// Parses, assembles and validates in one call.
    pub fn from_slice<L: BufferLoader>(data: &'a [u8], root: &str, loader: &L) -> Result<Self> {
        let parsed = parse_asset(data)?;
        let buffers = assemble_buffers(&parsed.document, &parsed.binary_chunks, root, loader)?;
        Self::new(parsed.document, buffers)
    }

    /// Unknown component codes become errors instead of `FLOAT`.
    pub fn with_strict_component_types(mut self, strict: bool) -> Self {
        self.strict_component_types = strict;
        self
    }

    pub fn into_owned(self) -> GltfReader<'static> {
        GltfReader {
            document: self.document,
            buffers: self
                .buffers
                .into_iter()
                .map(|b| Cow::Owned(b.into_owned()))
                .collect(),
            views: self.views,
            strict_component_types: self.strict_component_types,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Releases the buffers, keeping only the document.
    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn num_meshes(&self) -> usize {
        self.document.root().meshes.len()
    }

    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Bytes of one buffer view.
    pub fn view_bytes(&self, index: usize) -> Result<&[u8]> {
        let view = self.views.get(index).ok_or_else(|| {
            GltfError::InvalidGltf(format!("Invalid bufferView index: {}", index))
        })?;
        Ok(&self.buffers[view.buffer][view.range.clone()])
    }

    fn accessor(&self, index: usize) -> Result<&Accessor> {
        self.document
            .root()
            .accessors
            .get(index)
            .ok_or_else(|| GltfError::InvalidGltf(format!("Invalid accessor index: {}", index)))
    }

    /// Decodes one accessor into a fresh typed array.
    ///
    /// Quantized accessors come back as `Float32`; all other values are
    /// returned as stored.
    pub fn decode_accessor(&self, index: usize) -> Result<DecodedAttribute> {
        let accessor = self.accessor(index)?;
        let name = accessor
            .accessor_type
            .as_deref()
            .ok_or_else(|| GltfError::InvalidGltf(format!("Accessor {} has no type", index)))?;
        let shape = AccessorType::from_name(name)
            .ok_or_else(|| CoreError::UnsupportedAccessorType(name.to_string()))?;
        self.decode_with_shape(index, accessor, shape)
    }

    /// Decodes an index accessor, widened to `u32`. A missing `type` is
    /// read as `SCALAR`.
    pub fn decode_indices(&self, index: usize) -> Result<Vec<u32>> {
        let accessor = self.accessor(index)?;
        match accessor.accessor_type.as_deref() {
            None | Some("SCALAR") => {}
            Some(other) => {
                return Err(GltfError::InvalidGltf(format!(
                    "Index accessor {} has type {}, expected SCALAR",
                    index, other
                )))
            }
        }
        match self.decode_with_shape(index, accessor, AccessorType::Scalar)?.data {
            AttributeData::U8(values) => Ok(values.into_iter().map(u32::from).collect()),
            AttributeData::U16(values) => Ok(values.into_iter().map(u32::from).collect()),
            AttributeData::U32(values) => Ok(values),
            other => Err(GltfError::InvalidGltf(format!(
                "Index accessor {} has {:?} components",
                index,
                other.component_type()
            ))),
        }
    }

    fn decode_with_shape(
        &self,
        index: usize,
        accessor: &Accessor,
        shape: AccessorType,
    ) -> Result<DecodedAttribute> {
        let component_type =
            ComponentType::resolve(accessor.component_type, self.strict_component_types)?;
        let width = shape.num_components();
        let element_size = width * component_type.byte_length();

        let data = match accessor.buffer_view {
            None => {
                let len = accessor
                    .count
                    .checked_mul(width)
                    .filter(|&len| len.saturating_mul(component_type.byte_length()) <= MAX_ZERO_FILL_BYTES)
                    .ok_or_else(|| {
                        GltfError::InvalidGltf(format!(
                            "Accessor {}: {} elements without a bufferView exceed the {} byte zero-fill limit",
                            index, accessor.count, MAX_ZERO_FILL_BYTES
                        ))
                    })?;
                AttributeData::zeroed(component_type, len)
            }
            Some(view_index) => {
                let bytes = self.view_bytes(view_index)?;
                let stride = self.views[view_index].stride.unwrap_or(element_size);
                if stride < element_size {
                    return Err(GltfError::InvalidGltf(format!(
                        "Accessor {}: byteStride {} is smaller than its {} byte elements",
                        index, stride, element_size
                    )));
                }

                let offset = accessor.byte_offset.unwrap_or(0);
                let needed = match accessor.count {
                    0 => Some(0),
                    count => (count - 1)
                        .checked_mul(stride)
                        .and_then(|n| n.checked_add(element_size)),
                };
                let bytes = needed
                    .and_then(|needed| offset.checked_add(needed))
                    .and_then(|end| bytes.get(offset..end))
                    .ok_or_else(|| {
                        GltfError::InvalidGltf(format!(
                            "Accessor {}: {} elements of stride {} at offset {} do not fit bufferView {} ({} bytes)",
                            index,
                            accessor.count,
                            stride,
                            offset,
                            view_index,
                            bytes.len()
                        ))
                    })?;

                if stride == element_size {
                    AttributeData::from_le_bytes(component_type, bytes)?
                } else {
                    let packed: Vec<u8> = bytes
                        .chunks(stride)
                        .flat_map(|element| &element[..element_size])
                        .copied()
                        .collect();
                    AttributeData::from_le_bytes(component_type, &packed)?
                }
            }
        };

        let decoded = match accessor.decode_matrix() {
            Some(matrix) => {
                let dequantizer = Dequantizer::from_decode_matrix(matrix, width)?;
                DecodedAttribute::new(AttributeData::F32(dequantizer.dequantize(&data)), shape)
            }
            None => DecodedAttribute::new(data, shape).with_normalized(accessor.normalized),
        };
        Ok(decoded)
    }

    /// Decodes every mesh in declaration order.
    pub fn decode_meshes(&self) -> Result<Vec<Mesh>> {
        self.document
            .root()
            .meshes
            .iter()
            .enumerate()
            .map(|(mesh_index, mesh)| {
                let primitives = mesh
                    .primitives
                    .iter()
                    .enumerate()
                    .map(|(i, primitive)| self.decode_primitive(mesh_index, i, primitive))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Mesh {
                    name: mesh.name.clone(),
                    primitives,
                })
            })
            .collect()
    }

    fn decode_primitive(
        &self,
        mesh_index: usize,
        primitive_index: usize,
        primitive: &GltfPrimitive,
    ) -> Result<Primitive> {
        let mut decoded = Primitive {
            material: primitive.material,
            mode: primitive.mode,
            ..Primitive::default()
        };

        for (name, &accessor) in &primitive.attributes {
            if !semantic::is_known(name) {
                debug!(
                    "Mesh {} primitive {}: carrying custom attribute {}",
                    mesh_index, primitive_index, name
                );
            }
            decoded
                .attributes
                .insert(name.clone(), self.decode_accessor(accessor)?);
        }

        decoded.indices = match primitive.indices {
            Some(accessor) => self.decode_indices(accessor)?,
            None if decoded.is_triangles() => {
                let count = decoded.num_vertices();
                if count % 3 != 0 {
                    return Err(GltfError::InvalidGltf(format!(
                        "Non-indexed primitive {}:{} has {} vertices, not a multiple of 3",
                        mesh_index, primitive_index, count
                    )));
                }
                (0..count as u32).collect()
            }
            None => Vec::new(),
        };

        Ok(decoded)
    }
}
