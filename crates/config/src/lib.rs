//! Static and environment-driven tuning surface for the transcription pipeline.
//!
//! Ported from the original service's `config/settings.py`: every table and
//! env var here has a one-to-one counterpart there.

use std::collections::HashMap;

/// Audio longer than this is classified `FileKind::Long`.
pub const SHORT_DURATION_LIMIT_SEC: f64 = 300.0;
/// Audio longer than this requires slicing when auto-slice is enabled.
pub const SLICE_TRIGGER_SEC: f64 = 480.0;

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_int(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Silence-slicing tuning, all in milliseconds unless noted.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSliceConfig {
    pub min_slice_length_ms: u32,
    pub max_slice_length_ms: u32,
    pub min_interval_ms: u32,
    pub threshold_db: f64,
    pub hop_size_ms: u32,
    pub max_sil_kept_ms: u32,
    pub max_total_slices: usize,
}

impl Default for AudioSliceConfig {
    fn default() -> Self {
        Self {
            min_slice_length_ms: 240_000,
            max_slice_length_ms: 600_000,
            min_interval_ms: 500,
            threshold_db: -40.0,
            hop_size_ms: 20,
            max_sil_kept_ms: 1000,
            max_total_slices: 36,
        }
    }
}

/// Concurrency-optimizer tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyConfig {
    pub default_max_concurrent: u32,
    pub min_concurrent_limit: u32,
    pub max_concurrent_limit: u32,
    pub slices_per_thread: u32,
    pub consider_system_load: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent: 4,
            min_concurrent_limit: 1,
            max_concurrent_limit: 8,
            slices_per_thread: 3,
            consider_system_load: true,
        }
    }
}

/// Process-wide settings, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_model: String,
    pub default_device: String,
    pub default_compute_type: String,
    pub default_beam_size: u32,
    pub models_dir: String,

    pub host: String,
    pub port: u16,
    pub workers: u32,

    pub audio_slice: AudioSliceConfig,
    pub concurrency: ConcurrencyConfig,
}

impl Settings {
    /// Build settings from the process environment, falling back to the
    /// same defaults the original service shipped.
    pub fn from_env() -> Self {
        let audio_slice = AudioSliceConfig {
            min_slice_length_ms: env_int("MIN_SLICE_LENGTH", AudioSliceConfig::default().min_slice_length_ms),
            max_slice_length_ms: env_int("MAX_SLICE_LENGTH", AudioSliceConfig::default().max_slice_length_ms),
            min_interval_ms: env_int("MIN_INTERVAL", AudioSliceConfig::default().min_interval_ms),
            threshold_db: std::env::var("THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(AudioSliceConfig::default().threshold_db),
            hop_size_ms: env_int("HOP_SIZE", AudioSliceConfig::default().hop_size_ms),
            max_sil_kept_ms: env_int("MAX_SIL_KEPT", AudioSliceConfig::default().max_sil_kept_ms),
            max_total_slices: env_int("MAX_TOTAL_SLICES", AudioSliceConfig::default().max_total_slices as u32) as usize,
        };

        let concurrency = ConcurrencyConfig {
            default_max_concurrent: env_int("MAX_CONCURRENT", ConcurrencyConfig::default().default_max_concurrent),
            min_concurrent_limit: env_int("MIN_CONCURRENT", ConcurrencyConfig::default().min_concurrent_limit),
            max_concurrent_limit: env_int("MAX_CONCURRENT_LIMIT", ConcurrencyConfig::default().max_concurrent_limit),
            slices_per_thread: env_int("SLICES_PER_THREAD", ConcurrencyConfig::default().slices_per_thread),
            consider_system_load: env_bool("CONSIDER_SYSTEM_LOAD", ConcurrencyConfig::default().consider_system_load),
        };

        Self {
            default_model: env_str("MODEL_NAME", "faster-whisper-large-v3-turbo"),
            default_device: env_str("DEVICE", "cpu"),
            default_compute_type: env_str("COMPUTE_TYPE", "int8"),
            default_beam_size: env_int("BEAM_SIZE", 5),
            models_dir: env_str("MODELS_DIR", "./models"),
            host: env_str("HOST", "0.0.0.0"),
            port: env_int("PORT", 9898) as u16,
            workers: env_int("WORKERS", 4),
            audio_slice,
            concurrency,
        }
    }

    /// Size of the process-wide blocking pool used for model loads, slicing
    /// and other non-transcription blocking work: `max(LIMIT + 2, 32)`.
    pub fn blocking_pool_size(&self) -> u32 {
        (self.concurrency.max_concurrent_limit + 2).max(32)
    }

    /// Permits for the global transcription semaphore, derived from
    /// `max_concurrent_limit`.
    pub fn global_transcribe_limit(&self) -> usize {
        self.concurrency.max_concurrent_limit as usize
    }
}

/// HuggingFace repo IDs this service will serve.
pub fn supported_models() -> &'static [&'static str] {
    &["faster-whisper-large-v3-turbo"]
}

/// MIME types accepted as audio uploads.
pub fn allowed_audio_types() -> &'static [&'static str] {
    &[
        "audio/wav",
        "audio/x-wav",
        "audio/wave",
        "audio/x-pn-wav",
        "audio/mpeg",
        "audio/mp3",
        "audio/mp4",
        "audio/x-m4a",
        "audio/flac",
        "audio/ogg",
        "audio/webm",
        "application/octet-stream",
    ]
}

/// Compute types each device supports, in fallback-preference order.
/// `[0]` is what an unsupported `compute_type` silently coerces to.
pub fn device_compute_compatibility() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("cpu", ["float32", "int8"].as_slice()),
        ("cuda", ["float16", "float32", "int8"].as_slice()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_service() {
        // SAFETY: tests run single-threaded within this module via serial env access.
        for key in [
            "MODEL_NAME", "DEVICE", "COMPUTE_TYPE", "BEAM_SIZE", "MODELS_DIR", "HOST", "PORT",
            "WORKERS", "MIN_SLICE_LENGTH", "MAX_SLICE_LENGTH", "MIN_INTERVAL", "THRESHOLD",
            "HOP_SIZE", "MAX_SIL_KEPT", "MAX_TOTAL_SLICES", "MAX_CONCURRENT", "MIN_CONCURRENT",
            "MAX_CONCURRENT_LIMIT", "SLICES_PER_THREAD", "CONSIDER_SYSTEM_LOAD",
        ] {
            unsafe { std::env::remove_var(key) };
        }
        let settings = Settings::from_env();
        assert_eq!(settings.default_model, "faster-whisper-large-v3-turbo");
        assert_eq!(settings.audio_slice.max_total_slices, 36);
        assert_eq!(settings.concurrency.max_concurrent_limit, 8);
        assert_eq!(settings.blocking_pool_size(), 32);
        assert_eq!(settings.global_transcribe_limit(), 8);
    }

    #[test]
    fn device_compat_has_fallback_first() {
        let compat = device_compute_compatibility();
        assert_eq!(compat["cpu"][0], "float32");
        assert_eq!(compat["cuda"][0], "float16");
    }
}
