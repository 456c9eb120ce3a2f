//! Typed attribute arrays.
//!
//! An [`AttributeData`] owns a flat array of one numeric kind. Elements are
//! `num_components` consecutive values; the shape lives on
//! [`DecodedAttribute`].

use byteorder::{ByteOrder, LittleEndian};

use crate::data_types::{AccessorType, ComponentType};
use crate::status::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

/// Runs `$body` with `$values` bound to the inner vector of any variant.
macro_rules! with_values {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            AttributeData::I8($values) => $body,
            AttributeData::U8($values) => $body,
            AttributeData::I16($values) => $body,
            AttributeData::U16($values) => $body,
            AttributeData::U32($values) => $body,
            AttributeData::F32($values) => $body,
        }
    };
}

/// Like [`with_values!`], but rebuilds the same variant from `$body`.
macro_rules! map_values {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            AttributeData::I8($values) => AttributeData::I8($body),
            AttributeData::U8($values) => AttributeData::U8($body),
            AttributeData::I16($values) => AttributeData::I16($body),
            AttributeData::U16($values) => AttributeData::U16($body),
            AttributeData::U32($values) => AttributeData::U32($body),
            AttributeData::F32($values) => AttributeData::F32($body),
        }
    };
}

pub(crate) use map_values;

impl AttributeData {
    /// A zero-filled array of `len` values.
    pub fn zeroed(component_type: ComponentType, len: usize) -> Self {
        match component_type {
            ComponentType::Int8 => AttributeData::I8(vec![0; len]),
            ComponentType::Uint8 => AttributeData::U8(vec![0; len]),
            ComponentType::Int16 => AttributeData::I16(vec![0; len]),
            ComponentType::Uint16 => AttributeData::U16(vec![0; len]),
            ComponentType::Uint32 => AttributeData::U32(vec![0; len]),
            ComponentType::Float32 => AttributeData::F32(vec![0.0; len]),
        }
    }

    /// Decodes `bytes` as tightly packed little-endian values.
    ///
    /// `bytes.len()` must be a multiple of the component size.
    pub fn from_le_bytes(component_type: ComponentType, bytes: &[u8]) -> CoreResult<Self> {
        let size = component_type.byte_length();
        if bytes.len() % size != 0 {
            return Err(CoreError::InvalidParameter(format!(
                "{} bytes is not a whole number of {:?} values",
                bytes.len(),
                component_type
            )));
        }
        let len = bytes.len() / size;
        let data = match component_type {
            ComponentType::Int8 => AttributeData::I8(bytes.iter().map(|&b| b as i8).collect()),
            ComponentType::Uint8 => AttributeData::U8(bytes.to_vec()),
            ComponentType::Int16 => {
                let mut out = vec![0i16; len];
                LittleEndian::read_i16_into(bytes, &mut out);
                AttributeData::I16(out)
            }
            ComponentType::Uint16 => {
                let mut out = vec![0u16; len];
                LittleEndian::read_u16_into(bytes, &mut out);
                AttributeData::U16(out)
            }
            ComponentType::Uint32 => {
                let mut out = vec![0u32; len];
                LittleEndian::read_u32_into(bytes, &mut out);
                AttributeData::U32(out)
            }
            ComponentType::Float32 => {
                let mut out = vec![0f32; len];
                LittleEndian::read_f32_into(bytes, &mut out);
                AttributeData::F32(out)
            }
        };
        Ok(data)
    }

    /// Appends the little-endian encoding of every value to `out`.
    pub fn write_le_bytes(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + self.byte_length(), 0);
        let dst = &mut out[start..];
        match self {
            AttributeData::I8(values) => {
                for (d, &v) in dst.iter_mut().zip(values) {
                    *d = v as u8;
                }
            }
            AttributeData::U8(values) => dst.copy_from_slice(values),
            AttributeData::I16(values) => LittleEndian::write_i16_into(values, dst),
            AttributeData::U16(values) => LittleEndian::write_u16_into(values, dst),
            AttributeData::U32(values) => LittleEndian::write_u32_into(values, dst),
            AttributeData::F32(values) => LittleEndian::write_f32_into(values, dst),
        }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_length());
        self.write_le_bytes(&mut out);
        out
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            AttributeData::I8(_) => ComponentType::Int8,
            AttributeData::U8(_) => ComponentType::Uint8,
            AttributeData::I16(_) => ComponentType::Int16,
            AttributeData::U16(_) => ComponentType::Uint16,
            AttributeData::U32(_) => ComponentType::Uint32,
            AttributeData::F32(_) => ComponentType::Float32,
        }
    }

    /// Number of scalar values (not elements).
    pub fn len(&self) -> usize {
        with_values!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_length(&self) -> usize {
        self.len() * self.component_type().byte_length()
    }

    /// Widens every value to `f32`. Fixed-point values are not normalized.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            AttributeData::F32(values) => values.clone(),
            AttributeData::I8(values) => values.iter().map(|&v| f32::from(v)).collect(),
            AttributeData::U8(values) => values.iter().map(|&v| f32::from(v)).collect(),
            AttributeData::I16(values) => values.iter().map(|&v| f32::from(v)).collect(),
            AttributeData::U16(values) => values.iter().map(|&v| f32::from(v)).collect(),
            AttributeData::U32(values) => values.iter().map(|&v| v as f32).collect(),
        }
    }

    /// Componentwise minimum and maximum over elements of width
    /// `num_components`. Both vectors start at `+inf`/`-inf`, so an
    /// empty array yields infinities.
    pub fn component_bounds(&self, num_components: usize) -> (Vec<f64>, Vec<f64>) {
        with_values!(self, values => bounds(values, num_components))
    }
}

fn bounds<T: Copy + Into<f64>>(values: &[T], num_components: usize) -> (Vec<f64>, Vec<f64>) {
    let mut min = vec![f64::INFINITY; num_components];
    let mut max = vec![f64::NEG_INFINITY; num_components];
    if num_components == 0 {
        return (min, max);
    }
    for element in values.chunks_exact(num_components) {
        for (k, &value) in element.iter().enumerate() {
            let value: f64 = value.into();
            min[k] = min[k].min(value);
            max[k] = max[k].max(value);
        }
    }
    (min, max)
}

/// One decoded accessor: a typed array plus its element shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAttribute {
    pub data: AttributeData,
    pub accessor_type: AccessorType,
    pub normalized: bool,
}

impl DecodedAttribute {
    pub fn new(data: AttributeData, accessor_type: AccessorType) -> Self {
        Self {
            data,
            accessor_type,
            normalized: false,
        }
    }

    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Element width, 1 to 16.
    pub fn num_components(&self) -> usize {
        self.accessor_type.num_components()
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.data.len() / self.num_components()
    }

    pub fn component_type(&self) -> ComponentType {
        self.data.component_type()
    }
}
