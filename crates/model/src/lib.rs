mod adapter;
mod cache;
mod engine;
mod error;
mod fetcher;
mod key;

pub use adapter::TranscribeAdapter;
pub use cache::ModelCache;
pub use engine::{EngineOutput, Segment, TranscriptionEngine, WhisperRsEngine};
pub use error::{ModelError, Result};
pub use fetcher::{HfHubFetcher, ModelFetcher};
pub use key::ModelKey;
