use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid base64 data: {0}")]
    InvalidBase64(String),
    #[error("Path '{reference}' climbs above root '{root}'")]
    PathUnderflow { reference: String, root: String },
    #[error("Remap length mismatch: {indices} reduced indices vs {correspondence} correspondence entries")]
    RemapLengthMismatch { indices: usize, correspondence: usize },
    #[error("Remap index out of range: {0}")]
    RemapOutOfRange(String),
    #[error("Unsupported component type: {0}")]
    UnsupportedComponentType(u32),
    #[error("Unsupported accessor type: {0}")]
    UnsupportedAccessorType(String),
    #[error("Invalid decode matrix: {0}")]
    InvalidDecodeMatrix(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

pub fn invalid_parameter(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidParameter(msg.into())
}
