use std::fmt;

#[derive(Debug)]
pub enum RouterError {
    Validation(String),
    SliceFailed(String),
    ModelLoadFailed(String),
    Internal(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::Validation(msg) => write!(f, "validation error: {msg}"),
            RouterError::SliceFailed(msg) => write!(f, "slice failed: {msg}"),
            RouterError::ModelLoadFailed(msg) => write!(f, "model load failed: {msg}"),
            RouterError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<slicer::SliceError> for RouterError {
    fn from(err: slicer::SliceError) -> Self {
        RouterError::SliceFailed(err.to_string())
    }
}

impl From<model::ModelError> for RouterError {
    fn from(err: model::ModelError) -> Self {
        RouterError::ModelLoadFailed(err.to_string())
    }
}

/// HTTP status this error should surface as, for request-fatal failures.
impl RouterError {
    pub fn status_code(&self) -> u16 {
        match self {
            RouterError::Validation(_) => 400,
            RouterError::SliceFailed(_) | RouterError::ModelLoadFailed(_) | RouterError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
