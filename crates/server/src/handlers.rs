use crate::response::{error_response, ApiResponse};
use crate::state::AppState;
use axum::extract::{Multipart, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use router::{FileInfo, TranscribeRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "faster-whisper adaptive transcription service", "status": "running" }))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

pub async fn models() -> impl IntoResponse {
    Json(serde_json::json!({ "available_models": config::supported_models() }))
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let settings = &state.settings;
    Json(serde_json::json!({
        "default_model": settings.default_model,
        "default_device": settings.default_device,
        "default_compute_type": settings.default_compute_type,
        "default_beam_size": settings.default_beam_size,
        "audio_slice": {
            "min_slice_length_ms": settings.audio_slice.min_slice_length_ms,
            "max_slice_length_ms": settings.audio_slice.max_slice_length_ms,
            "min_interval_ms": settings.audio_slice.min_interval_ms,
            "threshold_db": settings.audio_slice.threshold_db,
            "hop_size_ms": settings.audio_slice.hop_size_ms,
            "max_sil_kept_ms": settings.audio_slice.max_sil_kept_ms,
            "max_total_slices": settings.audio_slice.max_total_slices,
        },
        "concurrency": {
            "default_max_concurrent": settings.concurrency.default_max_concurrent,
            "min_concurrent_limit": settings.concurrency.min_concurrent_limit,
            "max_concurrent_limit": settings.concurrency.max_concurrent_limit,
            "slices_per_thread": settings.concurrency.slices_per_thread,
            "consider_system_load": settings.concurrency.consider_system_load,
        },
    }))
}

pub async fn model_cache_status(State(state): State<AppState>) -> impl IntoResponse {
    let cached = state.model.cached_keys().await;
    let names: Vec<String> = cached.iter().map(|k| format!("{}:{}:{}", k.repo_id, k.device, k.compute_type)).collect();
    Json(serde_json::json!({ "cached_models": names, "cache_size": names.len() }))
}

pub async fn model_cache_clear(State(state): State<AppState>) -> impl IntoResponse {
    state.model.clear_cache().await;
    ApiResponse::ok_with_message(serde_json::json!({}), "model cache cleared")
}

#[derive(Debug, Deserialize)]
pub struct TranscribeQuery {
    pub model_name: Option<String>,
    pub beam_size: Option<u32>,
    pub device: Option<String>,
    pub compute_type: Option<String>,
    pub language: Option<String>,
    #[serde(default = "default_true")]
    pub auto_slice: bool,
    pub max_concurrent: Option<u32>,
    #[serde(default)]
    pub consider_system_load: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponseData {
    pub results: Vec<aggregate::FileResult>,
    pub processing_strategy: &'static str,
    pub processed_files: usize,
}

pub async fn transcribe(State(state): State<AppState>, Query(query): Query<TranscribeQuery>, mut multipart: Multipart) -> Response {
    let model_name = query.model_name.unwrap_or_else(|| state.settings.default_model.clone());
    if !config::supported_models().contains(&model_name.as_str()) {
        return error_response(400, format!("unsupported model: {model_name}"));
    }

    let max_concurrent_limit = state.settings.concurrency.max_concurrent_limit;
    let min_concurrent_limit = state.settings.concurrency.min_concurrent_limit;
    if let Some(requested) = query.max_concurrent {
        if requested < min_concurrent_limit || requested > max_concurrent_limit {
            return error_response(400, format!("max_concurrent must be in [{min_concurrent_limit}, {max_concurrent_limit}]"));
        }
    }

    let request = TranscribeRequest {
        model_name,
        device: query.device.unwrap_or_else(|| state.settings.default_device.clone()),
        compute_type: query.compute_type.unwrap_or_else(|| state.settings.default_compute_type.clone()),
        beam_size: query.beam_size.unwrap_or(state.settings.default_beam_size),
        language: query.language,
        auto_slice: query.auto_slice,
        max_concurrent: query.max_concurrent,
        consider_system_load: query.consider_system_load,
    };

    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                cleanup_files(&files);
                return error_response(400, format!("malformed multipart body: {err}"));
            }
        };

        if field.name() != Some("files") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                cleanup_files(&files);
                return error_response(400, format!("failed reading upload '{filename}': {err}"));
            }
        };

        let temp_path = std::env::temp_dir().join(format!("upload-{}-{}", uuid::Uuid::new_v4(), sanitize(&filename)));
        if let Err(err) = tokio::fs::write(&temp_path, &bytes).await {
            cleanup_files(&files);
            return error_response(500, format!("failed writing temp upload: {err}"));
        }

        let duration_sec = match probe_duration(temp_path.clone()).await {
            Ok(duration) => duration,
            Err(err) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                cleanup_files(&files);
                return error_response(400, format!("failed decoding '{filename}': {err}"));
            }
        };

        files.push(FileInfo::new(filename, temp_path, content_type, duration_sec, request.auto_slice));
    }

    if files.is_empty() {
        return error_response(400, "at least one file is required".to_string());
    }

    let outcome = state.router.route(files, &request).await;

    ApiResponse::ok(TranscribeResponseData {
        results: outcome.results,
        processing_strategy: outcome.processing_strategy,
        processed_files: outcome.processed_files,
    })
    .into_response()
}

async fn probe_duration(path: PathBuf) -> std::result::Result<f64, String> {
    tokio::task::spawn_blocking(move || slicer::Waveform::decode_file(&path).map(|w| w.duration_sec()).map_err(|e| e.to_string()))
        .await
        .map_err(|e| e.to_string())?
}

fn cleanup_files(files: &[FileInfo]) {
    for file in files {
        if let Err(err) = std::fs::remove_file(&file.temp_path) {
            log::warn!("failed to remove temp upload {}: {err}", file.temp_path.display());
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' }).collect()
}
