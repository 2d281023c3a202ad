use std::fmt;

#[derive(Debug)]
pub enum SliceError {
    InvalidConfig(String),
    Decode(String),
    Io(std::io::Error),
    Encode(String),
    NoChunksProduced,
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceError::InvalidConfig(msg) => write!(f, "invalid slicer config: {msg}"),
            SliceError::Decode(msg) => write!(f, "audio decode error: {msg}"),
            SliceError::Io(err) => write!(f, "io error: {err}"),
            SliceError::Encode(msg) => write!(f, "audio encode error: {msg}"),
            SliceError::NoChunksProduced => write!(f, "slicer produced zero chunks"),
        }
    }
}

impl std::error::Error for SliceError {}

impl From<std::io::Error> for SliceError {
    fn from(err: std::io::Error) -> Self {
        SliceError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, SliceError>;
