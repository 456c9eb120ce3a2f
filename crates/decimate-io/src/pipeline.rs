//! End-to-end decimation of one asset.
//!
//! `Idle -> Parsing -> AssemblingBuffers -> Decoding -> (Reducing ->
//! Remapping per primitive) -> Encoding -> Done`, or `Failed` from any
//! step. A pipeline runs once; create a new one per asset.

use std::collections::BTreeMap;
use std::fs;
use std::mem;
use std::path::Path;

use decimate_core::attribute_data::{AttributeData, DecodedAttribute};
use decimate_core::attribute_remap::remap;
use decimate_core::data_types::AccessorType;
use decimate_core::mesh::{semantic, Primitive};
use decimate_core::reduction::{Reducer, ReductionInput};
use log::{debug, info, warn};

use crate::buffer_loader::{BufferLoader, FileSystemLoader};
use crate::document::QUANTIZED_ATTRIBUTES_EXTENSION;
use crate::gltf_reader::{assemble_buffers, parse_asset, GltfError, GltfReader, Result};
use crate::gltf_writer::{BuildResult, GltfWriter};
use crate::options::SimplifyOptions;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Parsing,
    AssemblingBuffers,
    Decoding,
    Reducing { mesh: usize, primitive: usize },
    Remapping { mesh: usize, primitive: usize },
    Encoding,
    Done,
    Failed(String),
}

/// Totals over the primitives of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub primitives_reduced: usize,
    pub primitives_skipped: usize,
    pub vertices_before: usize,
    pub vertices_after: usize,
    pub triangles_before: usize,
    pub triangles_after: usize,
}

pub struct Pipeline<R: Reducer, L: BufferLoader = FileSystemLoader> {
    reducer: R,
    loader: L,
    options: SimplifyOptions,
    state: PipelineState,
    stats: RunStats,
}

impl<R: Reducer> Pipeline<R, FileSystemLoader> {
    pub fn new(reducer: R) -> Self {
        Self {
            reducer,
            loader: FileSystemLoader::new(),
            options: SimplifyOptions::default(),
            state: PipelineState::Idle,
            stats: RunStats::default(),
        }
    }
}

impl<R: Reducer, L: BufferLoader> Pipeline<R, L> {
    pub fn with_loader<M: BufferLoader>(self, loader: M) -> Pipeline<R, M> {
        Pipeline {
            reducer: self.reducer,
            loader,
            options: self.options,
            state: self.state,
            stats: self.stats,
        }
    }

    pub fn with_options(mut self, options: SimplifyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SimplifyOptions {
        &self.options
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_reducer(self) -> R {
        self.reducer
    }

    /// Reads `path` and runs on it, resolving external buffers relative
    /// to the file.
    pub fn run_file<P: AsRef<Path>>(&mut self, path: P) -> Result<BuildResult> {
        if self.state != PipelineState::Idle {
            return Err(GltfError::PipelineReused);
        }
        let path = path.as_ref();
        match fs::read(path) {
            Ok(data) => self.run(&data, &path.to_string_lossy()),
            Err(err) => {
                let err = GltfError::from(err);
                self.transition(PipelineState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Decimates the asset in `data`. `root` is the location of the asset
    /// itself and anchors relative buffer references.
    pub fn run(&mut self, data: &[u8], root: &str) -> Result<BuildResult> {
        if self.state != PipelineState::Idle {
            return Err(GltfError::PipelineReused);
        }
        match self.execute(data, root) {
            Ok(result) => {
                self.transition(PipelineState::Done);
                Ok(result)
            }
            Err(err) => {
                self.transition(PipelineState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn execute(&mut self, data: &[u8], root: &str) -> Result<BuildResult> {
        self.options.validate()?;

        self.transition(PipelineState::Parsing);
        let parsed = parse_asset(data)?;

        self.transition(PipelineState::AssemblingBuffers);
        let buffers = assemble_buffers(&parsed.document, &parsed.binary_chunks, root, &self.loader)?;
        let reader = GltfReader::new(parsed.document, buffers)?
            .with_strict_component_types(self.options.strict_component_types);

        self.transition(PipelineState::Decoding);
        let mut meshes = reader.decode_meshes()?;
        let quantized = reader
            .document()
            .root()
            .accessors
            .iter()
            .any(|accessor| accessor.decode_matrix().is_some());
        // Source buffers are released here; only decoded arrays remain.
        let document = reader.into_document();

        for (mesh_index, mesh) in meshes.iter_mut().enumerate() {
            for (primitive_index, primitive) in mesh.primitives.iter_mut().enumerate() {
                self.reduce_primitive(mesh_index, primitive_index, primitive)?;
            }
        }

        self.transition(PipelineState::Encoding);
        let mut writer = GltfWriter::new().with_aligned_buffer_views(self.options.align_buffer_views);
        for mesh in &meshes {
            writer.add_mesh(mesh)?;
        }
        // Dequantized accessors no longer carry the extension.
        let stripped: &[&str] = if quantized {
            &[QUANTIZED_ATTRIBUTES_EXTENSION]
        } else {
            &[]
        };
        let result = writer.finish(document.into_passthrough(stripped), &self.options.output_name)?;

        let stats = &self.stats;
        info!(
            "Decimated {} primitives ({} skipped): {} -> {} vertices, {} -> {} triangles, {} byte buffer",
            stats.primitives_reduced,
            stats.primitives_skipped,
            stats.vertices_before,
            stats.vertices_after,
            stats.triangles_before,
            stats.triangles_after,
            result.buffer.len()
        );
        Ok(result)
    }

    fn reduce_primitive(&mut self, mesh: usize, primitive: usize, target: &mut Primitive) -> Result<()> {
        if !target.is_triangles() {
            warn!(
                "Mesh {} primitive {}: mode {:?} is not triangles, passing through unreduced",
                mesh, primitive, target.mode
            );
            self.stats.primitives_skipped += 1;
            return Ok(());
        }
        let positions = match target.positions_f32() {
            Some(p) if target.position().map(DecodedAttribute::num_components) == Some(3) => p,
            _ => {
                warn!(
                    "Mesh {} primitive {}: no VEC3 POSITION, passing through unreduced",
                    mesh, primitive
                );
                self.stats.primitives_skipped += 1;
                return Ok(());
            }
        };
        if target.indices.is_empty() {
            self.stats.primitives_skipped += 1;
            return Ok(());
        }

        self.transition(PipelineState::Reducing { mesh, primitive });
        let texcoords = target.texcoords_f32();
        let mut input = ReductionInput::new(&positions, &target.indices, self.options.ratio);
        if let Some(uvs) = texcoords.as_deref() {
            input = input.with_texcoords(uvs);
        }
        let result = self.reducer.reduce(&input)?;
        result.validate()?;
        debug!(
            "Mesh {} primitive {}: {} -> {} vertices, {} -> {} triangles",
            mesh,
            primitive,
            input.vertex_count(),
            result.vertex_count(),
            input.triangle_count(),
            result.triangle_count()
        );

        self.transition(PipelineState::Remapping { mesh, primitive });
        let vertex_count = result.vertex_count();
        let mut attributes = BTreeMap::new();
        let mut dropped = Vec::new();
        for (name, attribute) in mem::take(&mut target.attributes) {
            if name == semantic::POSITION {
                continue;
            }
            match result.correspondence.as_deref() {
                Some(correspondence) => {
                    let data = remap(
                        &attribute.data,
                        attribute.num_components(),
                        vertex_count,
                        &result.indices,
                        correspondence,
                        self.options.conflict_policy,
                    )?;
                    attributes.insert(name, DecodedAttribute { data, ..attribute });
                }
                None => dropped.push(name),
            }
        }
        if !dropped.is_empty() {
            warn!(
                "Mesh {} primitive {}: reducer returned no correspondence, dropping {:?}",
                mesh, primitive, dropped
            );
        }

        self.stats.primitives_reduced += 1;
        self.stats.vertices_before += input.vertex_count();
        self.stats.vertices_after += vertex_count;
        self.stats.triangles_before += input.triangle_count();
        self.stats.triangles_after += result.triangle_count();

        attributes.insert(
            semantic::POSITION.to_string(),
            DecodedAttribute::new(AttributeData::F32(result.vertices), AccessorType::Vec3),
        );
        target.attributes = attributes;
        target.indices = result.indices;
        Ok(())
    }
}
