use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Short,
    Long,
}

/// One ingress audio file, alive from upload until its response contribution
/// (and temp file) have both been produced.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub filename: String,
    pub temp_path: PathBuf,
    pub content_type: String,
    pub duration_sec: f64,
    pub kind: FileKind,
    pub requires_slicing: bool,
}

impl FileInfo {
    pub fn new(filename: impl Into<String>, temp_path: PathBuf, content_type: impl Into<String>, duration_sec: f64, auto_slice: bool) -> Self {
        let kind = if duration_sec <= config::SHORT_DURATION_LIMIT_SEC {
            FileKind::Short
        } else {
            FileKind::Long
        };
        let requires_slicing = auto_slice && duration_sec > config::SLICE_TRIGGER_SEC;
        Self {
            filename: filename.into(),
            temp_path,
            content_type: content_type.into(),
            duration_sec,
            kind,
            requires_slicing,
        }
    }
}

/// Parameters for one transcription call, parsed from the HTTP request at
/// the ingress layer.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub model_name: String,
    pub device: String,
    pub compute_type: String,
    pub beam_size: u32,
    pub language: Option<String>,
    pub auto_slice: bool,
    pub max_concurrent: Option<u32>,
    pub consider_system_load: bool,
}

impl TranscribeRequest {
    pub fn model_key(&self) -> model::ModelKey {
        model::ModelKey::new(self.model_name.clone(), self.device.clone(), self.compute_type.clone())
    }
}
