//! Resolution of buffer references relative to the referencing document.
//!
//! `root` names the referencing document itself (for example
//! `models/scene.gltf`), so its final segment is dropped before relative
//! segments are applied. A root ending in `/` names a directory.
//!
//! Leading `..` segments that would climb above the root are rejected
//! with [`CoreError::PathUnderflow`] rather than clamped.

use crate::status::{CoreError, CoreResult};

/// Prefix shared by every inline data reference.
pub const DATA_URI_SCHEME: &str = "data:";

/// Marker that separates the media type from a base64 payload.
pub const BASE64_MARKER: &str = ";base64,";

/// Returns the payload offset if `reference` is a base64 data URI.
pub fn data_uri_payload_offset(reference: &str) -> Option<usize> {
    if !reference.starts_with(DATA_URI_SCHEME) {
        return None;
    }
    reference
        .find(BASE64_MARKER)
        .map(|pos| pos + BASE64_MARKER.len())
}

pub fn is_data_uri(reference: &str) -> bool {
    reference.starts_with(DATA_URI_SCHEME)
}

fn is_absolute(reference: &str) -> bool {
    reference.starts_with('/') || reference.contains("://") || std::path::Path::new(reference).is_absolute()
}

/// Resolves `reference` against `root`.
///
/// Absolute references, data URIs and an empty root leave `reference`
/// unchanged.
pub fn resolve(reference: &str, root: &str) -> CoreResult<String> {
    if root.is_empty() || is_absolute(reference) || is_data_uri(reference) {
        return Ok(reference.to_string());
    }

    let mut base: Vec<&str> = root.split('/').collect();
    base.pop();

    let mut segments = reference.split('/').peekable();
    while let Some(&segment) = segments.peek() {
        match segment {
            "." => {}
            ".." => match base.last() {
                Some(parent) if !parent.is_empty() => {
                    base.pop();
                }
                _ => {
                    return Err(CoreError::PathUnderflow {
                        reference: reference.to_string(),
                        root: root.to_string(),
                    })
                }
            },
            _ => break,
        }
        segments.next();
    }

    Ok(base.into_iter().chain(segments).collect::<Vec<_>>().join("/"))
}
