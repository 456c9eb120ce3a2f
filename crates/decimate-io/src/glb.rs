//! GLB binary container.
//!
//! Layout: a 12-byte prologue `(magic, version, total length)` followed
//! by chunks `(length, type, payload)`, all little-endian `u32`.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::debug;

use crate::gltf_reader::{GltfError, Result};
use crate::gltf_writer::GltfWriteError;

pub const GLB_MAGIC: u32 = 0x46546C67; // "glTF"
pub const GLB_VERSION: u32 = 2;
pub const GLB_CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
pub const GLB_CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

const HEADER_LENGTH: usize = 12;
const CHUNK_HEADER_LENGTH: usize = 8;

/// Chunks of a parsed container, borrowed from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Container<'a> {
    pub json: &'a [u8],
    /// Binary chunks in file order.
    pub binary: Vec<&'a [u8]>,
}

pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= 4 && LittleEndian::read_u32(&data[0..4]) == GLB_MAGIC
}

pub fn parse(data: &[u8]) -> Result<Container<'_>> {
    if data.len() < HEADER_LENGTH {
        return Err(GltfError::InvalidGlb("File too small for GLB header".into()));
    }

    let magic = LittleEndian::read_u32(&data[0..4]);
    let version = LittleEndian::read_u32(&data[4..8]);
    let length = LittleEndian::read_u32(&data[8..12]) as usize;

    if magic != GLB_MAGIC {
        return Err(GltfError::InvalidGlb(format!("Invalid GLB magic {:#010x}", magic)));
    }
    if version < GLB_VERSION {
        return Err(GltfError::UnsupportedVersion(version));
    }
    if length > data.len() {
        return Err(GltfError::InvalidGlb(format!(
            "File truncated: header declares {} bytes, got {}",
            length,
            data.len()
        )));
    }

    let mut offset = HEADER_LENGTH;
    let mut json = None;
    let mut binary = Vec::new();

    while offset + CHUNK_HEADER_LENGTH <= length {
        let chunk_length = LittleEndian::read_u32(&data[offset..offset + 4]) as usize;
        let chunk_type = LittleEndian::read_u32(&data[offset + 4..offset + 8]);
        offset += CHUNK_HEADER_LENGTH;

        let end = offset
            .checked_add(chunk_length)
            .filter(|&end| end <= length)
            .ok_or_else(|| GltfError::InvalidGlb("Chunk extends past file end".into()))?;
        let payload = &data[offset..end];
        offset = end;

        match chunk_type {
            GLB_CHUNK_JSON if json.is_some() => {
                return Err(GltfError::InvalidGlb("More than one JSON chunk".into()));
            }
            GLB_CHUNK_JSON => json = Some(payload),
            GLB_CHUNK_BIN => binary.push(payload),
            other => debug!("Skipping GLB chunk {:#010x} ({} bytes)", other, chunk_length),
        }
    }

    let json = json.ok_or(GltfError::MissingJsonChunk)?;
    Ok(Container { json, binary })
}

/// Builds a container from a JSON payload and an optional binary chunk.
/// JSON is padded with spaces and binary with zeros to 4 bytes.
pub fn write(json: &[u8], binary: Option<&[u8]>) -> std::result::Result<Vec<u8>, GltfWriteError> {
    let json_padding = padding(json.len());
    let padded_json_len = json.len() + json_padding;
    let padded_bin_len = binary.map(|b| b.len() + padding(b.len()));

    let total_len = HEADER_LENGTH
        + CHUNK_HEADER_LENGTH
        + padded_json_len
        + padded_bin_len.map_or(0, |len| CHUNK_HEADER_LENGTH + len);

    let mut output = Vec::with_capacity(total_len);
    output.write_u32::<LittleEndian>(GLB_MAGIC)?;
    output.write_u32::<LittleEndian>(GLB_VERSION)?;
    output.write_u32::<LittleEndian>(chunk_len(total_len)?)?;

    output.write_u32::<LittleEndian>(chunk_len(padded_json_len)?)?;
    output.write_u32::<LittleEndian>(GLB_CHUNK_JSON)?;
    output.extend_from_slice(json);
    output.resize(output.len() + json_padding, b' ');

    if let (Some(binary), Some(padded)) = (binary, padded_bin_len) {
        output.write_u32::<LittleEndian>(chunk_len(padded)?)?;
        output.write_u32::<LittleEndian>(GLB_CHUNK_BIN)?;
        output.extend_from_slice(binary);
        output.resize(output.len() + padded - binary.len(), 0);
    }

    Ok(output)
}

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn chunk_len(len: usize) -> std::result::Result<u32, GltfWriteError> {
    u32::try_from(len)
        .map_err(|_| GltfWriteError::InvalidGlb(format!("{} bytes exceeds the GLB size limit", len)))
}
