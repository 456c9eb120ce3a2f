//! End-to-end decimation runs over synthetic assets.

use std::fs;

use decimate_core::attribute_data::AttributeData;
use decimate_core::base64;
use decimate_core::foreign_heap::{ForeignReducer, HeapPtr, SimplifyModule};
use decimate_core::reduction::{IdentityReducer, Reducer, ReductionError, ReductionInput, ReductionResult};
use decimate_io::buffer_loader::MemoryLoader;
use decimate_io::gltf_reader::{GltfError, GltfReader};
use decimate_io::{glb, Pipeline, PipelineState, SimplifyOptions};
use serde_json::{json, Value};

const QUAD_POSITIONS: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];
const QUAD_COLORS: [u8; 16] = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 9, 9, 9, 9];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn quad_bytes() -> Vec<u8> {
    let mut bytes: Vec<u8> = QUAD_POSITIONS.iter().flat_map(|v| v.to_le_bytes()).collect();
    bytes.extend(QUAD_INDICES.iter().flat_map(|v| v.to_le_bytes()));
    bytes.extend(QUAD_COLORS);
    bytes
}

/// A quad with positions, u32 indices and normalized u8 colors. `uri` of
/// `None` leaves the buffer for a GLB chunk.
fn quad_document(uri: Option<String>) -> Value {
    let mut buffer = json!({"byteLength": 88});
    if let Some(uri) = uri {
        buffer["uri"] = Value::String(uri);
    }
    json!({
        "asset": {"version": "2.0", "generator": "synthetic"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0, "name": "quad"}],
        "materials": [{"name": "paint"}],
        "buffers": [buffer],
        "bufferViews": [
            {"buffer": 0, "byteLength": 48, "target": 34962},
            {"buffer": 0, "byteOffset": 48, "byteLength": 24, "target": 34963},
            {"buffer": 0, "byteOffset": 72, "byteLength": 16, "target": 34962}
        ],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3"},
            {"bufferView": 1, "componentType": 5125, "count": 6, "type": "SCALAR"},
            {"bufferView": 2, "componentType": 5121, "normalized": true, "count": 4, "type": "VEC4"}
        ],
        "meshes": [{"name": "quad", "primitives": [{
            "attributes": {"POSITION": 0, "COLOR_0": 2},
            "indices": 1,
            "material": 0
        }]}]
    })
}

fn embedded_quad() -> Vec<u8> {
    let uri = format!("data:application/gltf-buffer;base64,{}", base64::encode(&quad_bytes()));
    serde_json::to_vec(&quad_document(Some(uri))).unwrap()
}

#[test]
fn test_identity_run_packs_one_buffer() {
    init_logger();
    // Two views: positions and indices.
    let mut bytes: Vec<u8> = QUAD_POSITIONS.iter().flat_map(|v| v.to_le_bytes()).collect();
    bytes.extend(QUAD_INDICES.iter().flat_map(|v| v.to_le_bytes()));
    let asset = json!({
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 72, "uri": format!("data:application/octet-stream;base64,{}", base64::encode(&bytes))}],
        "bufferViews": [
            {"buffer": 0, "byteLength": 48},
            {"buffer": 0, "byteOffset": 48, "byteLength": 24}
        ],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3"},
            {"bufferView": 1, "componentType": 5125, "count": 6, "type": "SCALAR"}
        ],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}]
    });

    let mut pipeline = Pipeline::new(IdentityReducer).with_loader(MemoryLoader::new());
    let result = pipeline
        .run(&serde_json::to_vec(&asset).unwrap(), "scene.gltf")
        .unwrap();

    let doc = &result.document;
    assert_eq!(doc["buffers"].as_array().unwrap().len(), 1);
    assert_eq!(doc["bufferViews"].as_array().unwrap().len(), 2);
    assert_eq!(result.buffer.len(), QUAD_POSITIONS.len() * 4 + QUAD_INDICES.len() * 4);
    assert_eq!(doc["buffers"][0]["byteLength"], result.buffer.len());
    assert_eq!(doc["buffers"][0]["uri"], "output.bin");
    assert_eq!(doc["accessors"][0]["min"], json!([0.0, 0.0, 0.0]));
    assert_eq!(doc["accessors"][0]["max"], json!([1.0, 1.0, 0.0]));
    assert_eq!(pipeline.state(), &PipelineState::Done);
}

#[test]
fn test_passthrough_fields_survive() {
    let mut pipeline = Pipeline::new(IdentityReducer).with_loader(MemoryLoader::new());
    let result = pipeline.run(&embedded_quad(), "scene.gltf").unwrap();
    let input = quad_document(None);
    for key in ["asset", "scene", "scenes", "nodes", "materials"] {
        assert_eq!(result.document[key], input[key], "{}", key);
    }
    assert_eq!(result.document["meshes"][0]["name"], "quad");
    assert_eq!(result.document["meshes"][0]["primitives"][0]["material"], 0);
}

#[test]
fn test_written_output_decodes_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::new(IdentityReducer)
        .with_loader(MemoryLoader::new())
        .with_options(SimplifyOptions::new().with_output_name("quad_lod"));
    let result = pipeline.run(&embedded_quad(), "scene.gltf").unwrap();
    let path = result.write_to(dir.path()).unwrap();

    let original = GltfReader::from_slice(&embedded_quad(), "scene.gltf", &MemoryLoader::new())
        .unwrap()
        .decode_meshes()
        .unwrap();
    let rebuilt = GltfReader::open(&path).unwrap().decode_meshes().unwrap();
    assert_eq!(rebuilt, original);
    assert!(dir.path().join("quad_lod.bin").exists());
}

#[test]
fn test_external_buffer_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    fs::create_dir(&models).unwrap();
    fs::write(models.join("quad.bin"), quad_bytes()).unwrap();
    let scene = models.join("scene.gltf");
    fs::write(&scene, serde_json::to_vec(&quad_document(Some("quad.bin".into()))).unwrap()).unwrap();

    let mut pipeline = Pipeline::new(IdentityReducer);
    let result = pipeline.run_file(&scene).unwrap();
    assert_eq!(result.document["accessors"][2]["count"], 4);
}

#[test]
fn test_glb_in_glb_out() {
    let json = serde_json::to_vec(&quad_document(None)).unwrap();
    let input = glb::write(&json, Some(quad_bytes().as_slice())).unwrap();

    let mut pipeline = Pipeline::new(IdentityReducer).with_loader(MemoryLoader::new());
    let result = pipeline.run(&input, "scene.glb").unwrap();
    let output = result.to_glb().unwrap();

    let reader = GltfReader::from_slice(&output, "out.glb", &MemoryLoader::new()).unwrap();
    let meshes = reader.decode_meshes().unwrap();
    assert_eq!(meshes[0].primitives[0].indices, QUAD_INDICES.to_vec());
    assert_eq!(
        meshes[0].primitives[0].attribute("COLOR_0").unwrap().data,
        AttributeData::U8(QUAD_COLORS.to_vec())
    );
    assert!(meshes[0].primitives[0].attribute("COLOR_0").unwrap().normalized);
}

/// Drops vertex 2 of the quad, keeping the triangle (0, 1, 3).
struct DropVertexTwo;

impl Reducer for DropVertexTwo {
    fn reduce(&mut self, input: &ReductionInput<'_>) -> Result<ReductionResult, ReductionError> {
        let p = input.positions;
        let mut vertices = p[0..6].to_vec();
        vertices.extend_from_slice(&p[9..12]);
        Ok(ReductionResult {
            vertices,
            indices: vec![0, 1, 2],
            correspondence: Some(vec![0, 1, 3]),
        })
    }
}

#[test]
fn test_attributes_follow_correspondence() {
    let mut pipeline = Pipeline::new(DropVertexTwo).with_loader(MemoryLoader::new());
    let result = pipeline.run(&embedded_quad(), "scene.gltf").unwrap();
    let uri = format!("data:application/octet-stream;base64,{}", base64::encode(&result.buffer));
    let mut document = result.document.clone();
    document["buffers"][0]["uri"] = Value::String(uri);

    let data = serde_json::to_vec(&document).unwrap();
    let reader = GltfReader::from_slice(&data, "", &MemoryLoader::new()).unwrap();
    let primitive = &reader.decode_meshes().unwrap()[0].primitives[0];
    assert_eq!(
        primitive.attribute("COLOR_0").unwrap().data,
        AttributeData::U8(vec![255, 0, 0, 255, 0, 255, 0, 255, 9, 9, 9, 9])
    );
    assert_eq!(primitive.indices, vec![0, 1, 2]);
    assert_eq!(pipeline.stats().vertices_before, 4);
    assert_eq!(pipeline.stats().vertices_after, 3);
}

/// Heap module whose routine always fails; tracks live allocations.
#[derive(Default)]
struct FailingModule {
    next: u32,
    live: Vec<HeapPtr>,
}

impl SimplifyModule for FailingModule {
    fn malloc(&mut self, bytes: usize) -> Option<HeapPtr> {
        let ptr = HeapPtr(self.next);
        self.next += bytes as u32 + 4;
        self.live.push(ptr);
        Some(ptr)
    }
    fn free(&mut self, ptr: HeapPtr) {
        self.live.retain(|&p| p != ptr);
    }
    fn write_f32(&mut self, _ptr: HeapPtr, _values: &[f32]) {}
    fn write_u32(&mut self, _ptr: HeapPtr, _values: &[u32]) {}
    fn read_f32(&self, _ptr: HeapPtr, len: usize) -> Vec<f32> {
        vec![0.0; len]
    }
    fn read_u32(&self, _ptr: HeapPtr, len: usize) -> Vec<u32> {
        vec![0; len]
    }
    fn simplify(
        &mut self,
        _vertices: HeapPtr,
        _vertex_count: usize,
        _triangles: HeapPtr,
        _triangle_count: usize,
        _ratio: f32,
        _texcoords: Option<HeapPtr>,
    ) -> i32 {
        1
    }
    fn vertex_count(&self) -> usize {
        0
    }
    fn triangle_count(&self) -> usize {
        0
    }
    fn copy_vertices(&mut self, _out: HeapPtr) {}
    fn copy_triangles(&mut self, _out: HeapPtr) {}
    fn copy_correspondence(&mut self, _out: HeapPtr) -> bool {
        false
    }
}

#[test]
fn test_foreign_failure_fails_run_without_leaks() {
    let mut pipeline = Pipeline::new(ForeignReducer::new(FailingModule::default()))
        .with_loader(MemoryLoader::new());
    let err = pipeline.run(&embedded_quad(), "scene.gltf").unwrap_err();
    assert!(matches!(
        err,
        GltfError::Reduction(ReductionError::RoutineFailed { status: 1 })
    ));
    assert!(matches!(pipeline.state(), PipelineState::Failed(_)));
    assert!(pipeline.into_reducer().into_inner().live.is_empty());
}
