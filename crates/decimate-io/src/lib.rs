//! Decimate I/O library: glTF/GLB in, decimated glTF out.
//!
//! # Supported Forms
//!
//! | Form                  | Read | Write |
//! |-----------------------|------|-------|
//! | glTF + external .bin  | ✓    | ✓     |
//! | glTF, data URIs       | ✓    | ✓     |
//! | GLB                   | ✓    | ✓     |
//!
//! # Pipeline
//!
//! ```ignore
//! use decimate_core::IdentityReducer;
//! use decimate_io::{Pipeline, SimplifyOptions};
//!
//! let mut pipeline = Pipeline::new(IdentityReducer)
//!     .with_options(SimplifyOptions::new().with_ratio(0.25).with_output_name("lod1"));
//! let result = pipeline.run_file("models/scene.gltf")?;
//! result.write_to("out/")?;
//! ```
//!
//! Any routine implementing [`decimate_core::Reducer`] can be plugged in;
//! routines living in a separate heap go through
//! [`decimate_core::foreign_heap::ForeignReducer`].

pub mod buffer_loader;
pub mod document;
pub mod glb;
pub mod gltf_reader;
pub mod gltf_writer;
pub mod options;
pub mod pipeline;

pub use buffer_loader::{BufferLoader, FileSystemLoader, MemoryLoader};
pub use document::Document;
pub use gltf_reader::{GltfError, GltfReader};
pub use gltf_writer::{BuildResult, GltfWriteError, GltfWriter};
pub use options::SimplifyOptions;
pub use pipeline::{Pipeline, PipelineState, RunStats};
