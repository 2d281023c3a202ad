mod error;
mod types;

pub use error::{Result, RouterError};
pub use types::{FileInfo, FileKind, TranscribeRequest};

use aggregate::{FileResult, Segment, SliceResult};
use concurrency::ConcurrencyOptimizer;
use dispatch::Dispatcher;
use model::{EngineOutput, TranscribeAdapter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    BatchOnly,
    SliceOnly,
    Mixed,
}

impl Strategy {
    pub fn as_processing_mode(&self) -> &'static str {
        match self {
            Strategy::BatchOnly => "batch_parallel",
            Strategy::SliceOnly => "sliced_parallel",
            Strategy::Mixed => "mixed",
        }
    }
}

/// Classify a request's inputs into one of `{batch_only, slice_only, mixed}`
/// per the decision table: a lone file that needs slicing goes `slice_only`;
/// any mix of multiple files where at least one needs slicing goes `mixed`;
/// everything else is `batch_only`.
pub fn select_strategy(files: &[FileInfo], auto_slice: bool) -> Strategy {
    if files.len() == 1 && auto_slice && files[0].requires_slicing {
        Strategy::SliceOnly
    } else if files.len() > 1 && auto_slice && files.iter().any(|f| f.requires_slicing) {
        Strategy::Mixed
    } else {
        Strategy::BatchOnly
    }
}

pub struct RouteOutcome {
    pub results: Vec<FileResult>,
    pub processing_strategy: &'static str,
    pub processed_files: usize,
}

pub struct StrategyRouter {
    model: Arc<TranscribeAdapter>,
    dispatcher: Arc<Dispatcher>,
    optimizer: Arc<ConcurrencyOptimizer>,
    audio_slice_cfg: config::AudioSliceConfig,
    default_concurrent: u32,
}

impl StrategyRouter {
    pub fn new(
        model: Arc<TranscribeAdapter>,
        dispatcher: Arc<Dispatcher>,
        optimizer: Arc<ConcurrencyOptimizer>,
        audio_slice_cfg: config::AudioSliceConfig,
        default_concurrent: u32,
    ) -> Self {
        Self {
            model,
            dispatcher,
            optimizer,
            audio_slice_cfg,
            default_concurrent,
        }
    }

    /// Routes and fully processes `files`, cleaning up every temp upload and
    /// slice artifact on every exit path.
    pub async fn route(&self, files: Vec<FileInfo>, request: &TranscribeRequest) -> RouteOutcome {
        let strategy = select_strategy(&files, request.auto_slice);
        let processed_files = files.len();

        let results = match strategy {
            Strategy::BatchOnly => self.process_batch(files, request).await,
            Strategy::SliceOnly => {
                let file = files.into_iter().next().expect("slice_only implies exactly one file");
                vec![self.process_slice_only(file, request).await]
            }
            Strategy::Mixed => self.process_mixed(files, request).await,
        };

        RouteOutcome {
            results,
            processing_strategy: strategy.as_processing_mode(),
            processed_files,
        }
    }

    async fn process_batch(&self, files: Vec<FileInfo>, request: &TranscribeRequest) -> Vec<FileResult> {
        let allowed = config::allowed_audio_types();
        let (valid, invalid): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| allowed.contains(&f.content_type.as_str()));

        let mut results: Vec<FileResult> = invalid
            .into_iter()
            .map(|f| {
                cleanup_temp_file(&f.temp_path);
                aggregate::error_result(&f.filename, "batch_parallel", format!("unsupported content-type: {}", f.content_type))
            })
            .collect();

        if valid.is_empty() {
            return results;
        }

        let concurrency = request
            .max_concurrent
            .unwrap_or(self.default_concurrent)
            .min(valid.len() as u32)
            .max(1) as usize;

        let model = self.model.clone();
        let request = request.clone();
        let batch_results = self
            .dispatcher
            .dispatch(valid, concurrency, move |file| {
                let model = model.clone();
                let request = request.clone();
                async move {
                    let result = transcribe_whole_file(&model, &file, &request).await;
                    cleanup_temp_file(&file.temp_path);
                    result
                }
            })
            .await;

        results.extend(batch_results.into_iter().map(|outcome| match outcome {
            dispatch::Outcome::Done(r) => r.unwrap_or_else(|e| e),
            dispatch::Outcome::Panicked(file) => {
                cleanup_temp_file(&file.temp_path);
                aggregate::error_result(&file.filename, "batch_parallel", "processing task panicked")
            }
        }));
        results
    }

    async fn process_slice_only(&self, file: FileInfo, request: &TranscribeRequest) -> FileResult {
        let temp_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => {
                cleanup_temp_file(&file.temp_path);
                return aggregate::error_result(&file.filename, "sliced_parallel", format!("temp dir creation failed: {err}"));
            }
        };

        let plan = match slicer::slice_audio_file(&file.temp_path, temp_dir.path(), &self.audio_slice_cfg) {
            Ok(plan) => plan,
            Err(err) => {
                cleanup_temp_file(&file.temp_path);
                return aggregate::error_result(&file.filename, "sliced_parallel", err.to_string());
            }
        };

        let concurrency = self
            .optimizer
            .optimal_concurrency(plan.len(), file.duration_sec, request.max_concurrent);

        let model = self.model.clone();
        let request = request.clone();
        let slice_results: Vec<SliceResult> = self
            .dispatcher
            .dispatch(plan.clone(), concurrency as usize, move |slice_info| {
                let model = model.clone();
                let request = request.clone();
                async move { Ok::<SliceResult, SliceResult>(transcribe_slice(&model, &slice_info, &request).await) }
            })
            .await
            .into_iter()
            .map(|outcome| match outcome {
                dispatch::Outcome::Done(r) => r.unwrap_or_else(|e| e),
                dispatch::Outcome::Panicked(slice_info) => SliceResult::Err {
                    index: slice_info.index,
                    error: "processing task panicked".to_string(),
                },
            })
            .collect();

        slicer::cleanup_slices(&plan);
        cleanup_temp_file(&file.temp_path);

        aggregate::aggregate_results(&file.filename, "sliced_parallel", file.duration_sec, slice_results)
    }

    async fn process_mixed(&self, files: Vec<FileInfo>, request: &TranscribeRequest) -> Vec<FileResult> {
        let (shorts, longs): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| !f.requires_slicing);

        let (short_results, long_results) = tokio::join!(self.process_batch(shorts, request), self.process_long_sequential(longs, request));

        let mut results = short_results;
        results.extend(long_results);
        results
    }

    async fn process_long_sequential(&self, longs: Vec<FileInfo>, request: &TranscribeRequest) -> Vec<FileResult> {
        let mut results = Vec::with_capacity(longs.len());
        for file in longs {
            results.push(self.process_slice_only(file, request).await);
        }
        results
    }
}

async fn transcribe_whole_file(model: &TranscribeAdapter, file: &FileInfo, request: &TranscribeRequest) -> std::result::Result<FileResult, FileResult> {
    match model
        .transcribe(request.model_key(), &file.temp_path, request.beam_size, request.language.as_deref())
        .await
    {
        Ok(output) => Ok(engine_output_to_file_result(&file.filename, file.duration_sec, output)),
        Err(err) => Err(aggregate::error_result(&file.filename, "batch_parallel", err.to_string())),
    }
}

fn engine_output_to_file_result(filename: &str, duration_sec: f64, output: EngineOutput) -> FileResult {
    let transcript: String = output.segments.iter().map(|s| s.text.as_str()).collect();
    let segments: Vec<Segment> = output
        .segments
        .into_iter()
        .map(|s| Segment { start: s.start, end: s.end, text: s.text })
        .collect();
    FileResult {
        filename: filename.to_string(),
        transcript,
        language: output.language,
        language_probability: output.language_probability,
        total_segments: segments.len(),
        segments,
        slice_count: 0,
        processing_mode: "batch_parallel".to_string(),
        original_duration: duration_sec,
        warning: None,
        error: None,
    }
}

async fn transcribe_slice(model: &TranscribeAdapter, slice_info: &slicer::SliceInfo, request: &TranscribeRequest) -> SliceResult {
    match model
        .transcribe(request.model_key(), &slice_info.path, request.beam_size, request.language.as_deref())
        .await
    {
        Ok(output) => SliceResult::Ok {
            index: slice_info.index,
            transcript: output.segments.iter().map(|s| s.text.as_str()).collect(),
            language: output.language,
            language_probability: output.language_probability,
            segments: output.segments.into_iter().map(|s| Segment { start: s.start, end: s.end, text: s.text }).collect(),
            slice_start_time: slice_info.start_time_sec,
        },
        Err(err) => SliceResult::Err {
            index: slice_info.index,
            error: err.to_string(),
        },
    }
}

fn cleanup_temp_file(path: &std::path::Path) {
    if let Err(err) = std::fs::remove_file(path) {
        log::warn!("failed to remove temp upload {}: {err}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(name: &str, duration: f64, auto_slice: bool) -> FileInfo {
        FileInfo::new(name, PathBuf::from(format!("/tmp/{name}")), "audio/wav", duration, auto_slice)
    }

    #[test]
    fn single_long_file_is_slice_only() {
        let files = vec![file("a.wav", 900.0, true)];
        assert_eq!(select_strategy(&files, true), Strategy::SliceOnly);
    }

    #[test]
    fn single_short_file_is_batch_only() {
        let files = vec![file("a.wav", 100.0, true)];
        assert_eq!(select_strategy(&files, true), Strategy::BatchOnly);
    }

    #[test]
    fn mixed_durations_select_mixed() {
        let files = vec![file("a.wav", 100.0, true), file("b.wav", 700.0, true)];
        assert_eq!(select_strategy(&files, true), Strategy::Mixed);
    }

    #[test]
    fn auto_slice_disabled_forces_batch_only() {
        let files = vec![file("a.wav", 900.0, false)];
        assert_eq!(select_strategy(&files, false), Strategy::BatchOnly);
    }

    #[test]
    fn all_short_files_are_batch_only() {
        let files = vec![file("a.wav", 100.0, true), file("b.wav", 200.0, true)];
        assert_eq!(select_strategy(&files, true), Strategy::BatchOnly);
    }
}
