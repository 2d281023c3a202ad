use crate::error::{ModelError, Result};
use async_trait::async_trait;
use std::path::Path;

/// One recognized span of speech within a slice, in seconds relative to the
/// start of whatever audio was passed to `transcribe`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub segments: Vec<Segment>,
    pub language: Option<String>,
    pub language_probability: Option<f32>,
}

/// The external transcription engine's interface: a black box over
/// `Transcribe(path, beam_size, language?)`.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, beam_size: u32, language: Option<&str>) -> Result<EngineOutput>;
}

/// `whisper.cpp` bindings, pinned to a single local model file loaded at
/// construction time (`local_files_only = true`).
pub struct WhisperRsEngine {
    context: whisper_rs::WhisperContext,
}

impl WhisperRsEngine {
    pub fn load(model_path: &Path) -> Result<Self> {
        let params = whisper_rs::WhisperContextParameters::default();
        let context = whisper_rs::WhisperContext::new_with_params(
            model_path.to_str().ok_or_else(|| ModelError::ModelLoadFailed("non-utf8 model path".into()))?,
            params,
        )
        .map_err(|e| ModelError::ModelLoadFailed(e.to_string()))?;
        Ok(Self { context })
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperRsEngine {
    async fn transcribe(&self, audio_path: &Path, beam_size: u32, language: Option<&str>) -> Result<EngineOutput> {
        let audio_path = audio_path.to_path_buf();
        let language = language.map(|s| s.to_string());
        let samples = read_pcm_f32_mono(&audio_path)?;

        let mut state = self
            .context
            .create_state()
            .map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;

        let mut params = whisper_rs::FullParams::new(whisper_rs::SamplingStrategy::Greedy {
            best_of: beam_size.max(1) as i32,
        });
        params.set_language(language.as_deref());
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);

        state
            .full(params, &samples)
            .map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;

        let num_segments = state.full_n_segments().map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;
        let mut segments = Vec::with_capacity(num_segments as usize);
        for i in 0..num_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;
            let t0 = state.full_get_segment_t0(i).map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;
            let t1 = state.full_get_segment_t1(i).map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;
            segments.push(Segment {
                start: t0 as f64 / 100.0,
                end: t1 as f64 / 100.0,
                text,
            });
        }

        let detected_language = state.full_lang_id().ok().map(|id| whisper_rs::get_lang_str(id).to_string());

        Ok(EngineOutput {
            segments,
            language: detected_language,
            language_probability: None,
        })
    }
}

fn read_pcm_f32_mono(path: &Path) -> Result<Vec<f32>> {
    let waveform = slicer::Waveform::decode_file(path).map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;
    let mono = waveform.to_mono();
    if waveform.sample_rate == 16_000 {
        return Ok(mono);
    }
    let resampled = waveform
        .resampled(16_000)
        .map_err(|e| ModelError::TranscribeFailed(e.to_string()))?;
    Ok(resampled.to_mono())
}
