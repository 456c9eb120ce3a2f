//! Component and shape tables for glTF accessors.
//!
//! Both tables are bidirectional. The forward direction is an exhaustive
//! `match`, so adding a variant without a code fails to compile; the
//! reverse direction is checked against the forward one by a `const`
//! assertion below.

use log::warn;

use crate::status::{CoreError, CoreResult};

/// Numeric kind of a single accessor component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Uint32,
    Float32,
}

impl ComponentType {
    pub const ALL: [ComponentType; 6] = [
        ComponentType::Int8,
        ComponentType::Uint8,
        ComponentType::Int16,
        ComponentType::Uint16,
        ComponentType::Uint32,
        ComponentType::Float32,
    ];

    /// The glTF `componentType` code.
    pub const fn gl_enum(self) -> u32 {
        match self {
            ComponentType::Int8 => 5120,
            ComponentType::Uint8 => 5121,
            ComponentType::Int16 => 5122,
            ComponentType::Uint16 => 5123,
            ComponentType::Uint32 => 5125,
            ComponentType::Float32 => 5126,
        }
    }

    pub const fn from_gl_enum(code: u32) -> Option<Self> {
        match code {
            5120 => Some(ComponentType::Int8),
            5121 => Some(ComponentType::Uint8),
            5122 => Some(ComponentType::Int16),
            5123 => Some(ComponentType::Uint16),
            5125 => Some(ComponentType::Uint32),
            5126 => Some(ComponentType::Float32),
            _ => None,
        }
    }

    pub const fn byte_length(self) -> usize {
        match self {
            ComponentType::Int8 | ComponentType::Uint8 => 1,
            ComponentType::Int16 | ComponentType::Uint16 => 2,
            ComponentType::Uint32 | ComponentType::Float32 => 4,
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(self, ComponentType::Float32)
    }

    /// Resolves a component code, falling back to `Float32` for unknown
    /// codes unless `strict` is set.
    pub fn resolve(code: u32, strict: bool) -> CoreResult<Self> {
        match Self::from_gl_enum(code) {
            Some(component_type) => Ok(component_type),
            None if strict => Err(CoreError::UnsupportedComponentType(code)),
            None => {
                warn!(
                    "Unknown component type {}, decoding as FLOAT; values are likely wrong",
                    code
                );
                Ok(ComponentType::Float32)
            }
        }
    }
}

const _: () = {
    let mut i = 0;
    while i < ComponentType::ALL.len() {
        let component_type = ComponentType::ALL[i];
        assert!(match ComponentType::from_gl_enum(component_type.gl_enum()) {
            Some(back) => back as u8 == component_type as u8,
            None => false,
        });
        i += 1;
    }
};

/// Usage target of a buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferTarget {
    ArrayBuffer,
    ElementArrayBuffer,
}

impl BufferTarget {
    pub const fn gl_enum(self) -> u32 {
        match self {
            BufferTarget::ArrayBuffer => 34962,
            BufferTarget::ElementArrayBuffer => 34963,
        }
    }

    pub const fn from_gl_enum(code: u32) -> Option<Self> {
        match code {
            34962 => Some(BufferTarget::ArrayBuffer),
            34963 => Some(BufferTarget::ElementArrayBuffer),
            _ => None,
        }
    }
}

/// Shape of one accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub const fn num_components(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 => 4,
            AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AccessorType::Scalar => "SCALAR",
            AccessorType::Vec2 => "VEC2",
            AccessorType::Vec3 => "VEC3",
            AccessorType::Vec4 => "VEC4",
            AccessorType::Mat2 => "MAT2",
            AccessorType::Mat3 => "MAT3",
            AccessorType::Mat4 => "MAT4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SCALAR" => Some(AccessorType::Scalar),
            "VEC2" => Some(AccessorType::Vec2),
            "VEC3" => Some(AccessorType::Vec3),
            "VEC4" => Some(AccessorType::Vec4),
            "MAT2" => Some(AccessorType::Mat2),
            "MAT3" => Some(AccessorType::Mat3),
            "MAT4" => Some(AccessorType::Mat4),
            _ => None,
        }
    }

    /// Picks the shape for a bare element width. Width 4 is read as
    /// `VEC4`; callers that know they hold a `MAT2` must say so.
    pub const fn from_num_components(width: usize) -> Option<Self> {
        match width {
            1 => Some(AccessorType::Scalar),
            2 => Some(AccessorType::Vec2),
            3 => Some(AccessorType::Vec3),
            4 => Some(AccessorType::Vec4),
            9 => Some(AccessorType::Mat3),
            16 => Some(AccessorType::Mat4),
            _ => None,
        }
    }
}
