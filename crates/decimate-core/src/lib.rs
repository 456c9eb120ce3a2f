//! Decimate Core Library
//!
//! Data model and numeric kernels for glTF mesh decimation: typed
//! attribute arrays, component/shape tables, dequantization, inline
//! buffer decoding, reference resolution, and the remapping that keeps
//! vertex attributes aligned with a reduced vertex set.
//!
//! The reduction routine itself is external. It is reached through the
//! [`Reducer`] trait; routines compiled into a separate heap are adapted
//! by [`foreign_heap::ForeignReducer`].

pub mod attribute_data;
pub mod attribute_remap;
pub mod base64;
pub mod data_types;
pub mod foreign_heap;
pub mod mesh;
pub mod path_resolver;
pub mod quantization;
pub mod reduction;
pub mod status;

pub use attribute_data::{AttributeData, DecodedAttribute};
pub use attribute_remap::{remap, ConflictPolicy};
pub use data_types::{AccessorType, BufferTarget, ComponentType};
pub use mesh::{Mesh, Primitive};
pub use quantization::Dequantizer;
pub use reduction::{IdentityReducer, Reducer, ReductionError, ReductionInput, ReductionResult};
pub use status::{CoreError, CoreResult};
