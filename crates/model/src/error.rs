use std::fmt;

#[derive(Debug)]
pub enum ModelError {
    ModelLoadFailed(String),
    FetchFailed(String),
    TranscribeFailed(String),
    InvalidComputeType { device: String, compute_type: String },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::ModelLoadFailed(msg) => write!(f, "model load failed: {msg}"),
            ModelError::FetchFailed(msg) => write!(f, "model fetch failed: {msg}"),
            ModelError::TranscribeFailed(msg) => write!(f, "transcription failed: {msg}"),
            ModelError::InvalidComputeType { device, compute_type } => {
                write!(f, "compute type {compute_type} not supported on device {device}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
