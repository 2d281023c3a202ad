mod compactor;
mod error;
mod slicer;
mod types;
mod waveform;

pub use compactor::SliceCompactor;
pub use error::{Result, SliceError};
pub use slicer::AudioSlicer;
pub use types::{MergeInfo, SliceInfo};
pub use waveform::Waveform;

use config::AudioSliceConfig;
use std::path::{Path, PathBuf};

/// Decode `source`, slice it on silence, compact the plan to
/// `cfg.max_total_slices`, and write each resulting chunk as a WAV file
/// under `out_dir`. Returns the slice plan in playback order.
pub fn slice_audio_file(source: &Path, out_dir: &Path, cfg: &AudioSliceConfig) -> Result<Vec<SliceInfo>> {
    std::fs::create_dir_all(out_dir)?;

    let waveform = Waveform::decode_file(source)?;
    let slicer = AudioSlicer::new(cfg.clone(), waveform.sample_rate)?;
    let chunks = slicer.slice(&waveform)?;

    let mut start = 0.0;
    let dated: Vec<(SliceInfo, Waveform)> = chunks
        .into_iter()
        .enumerate()
        .map(|(index, wave)| {
            let duration_sec = wave.duration_sec();
            let info = SliceInfo {
                path: out_dir.join(format!("slice_{index:04}.wav")),
                index,
                duration_sec,
                start_time_sec: start,
                merged: None,
            };
            start += duration_sec;
            (info, wave)
        })
        .collect();

    let compactor = SliceCompactor::new(cfg.max_total_slices);
    let compacted = compactor.compact(dated)?;

    let mut plan = Vec::with_capacity(compacted.len());
    for (info, wave) in compacted {
        wave.write_wav(&info.path)?;
        log::debug!(
            "wrote slice {} ({:.2}s @ {:.2}s) to {}",
            info.index,
            info.duration_sec,
            info.start_time_sec,
            info.path.display()
        );
        plan.push(info);
    }

    if plan.is_empty() {
        return Err(SliceError::NoChunksProduced);
    }

    Ok(plan)
}

/// Best-effort removal of every slice file in `plan`. Logs but does not fail
/// on individual missing/unremovable files, since cleanup runs after the
/// result has already been produced.
pub fn cleanup_slices(plan: &[SliceInfo]) {
    for info in plan {
        if let Err(err) = std::fs::remove_file(&info.path) {
            log::warn!("failed to remove slice file {}: {err}", info.path.display());
        }
    }
}

/// Returns the directory a caller should use for a given request's
/// transient slice files.
pub fn slice_dir_for(base: &Path, request_id: &str) -> PathBuf {
    base.join(request_id)
}
