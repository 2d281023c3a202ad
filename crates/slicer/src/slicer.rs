use crate::error::{Result, SliceError};
use crate::waveform::Waveform;
use config::AudioSliceConfig;

/// Windowed-RMS-based silence slicer. Derives frame-indexed thresholds from
/// the millisecond configuration and the waveform's sample rate at
/// construction, then walks the signal frame by frame looking for silence
/// runs long enough to cut on.
pub struct AudioSlicer {
    cfg: AudioSliceConfig,
    threshold: f32,
    hop: usize,
    win: usize,
    min_length_f: usize,
    min_interval_f: usize,
    max_sil_kept_f: usize,
}

fn round_usize(x: f64) -> usize {
    x.round().max(0.0) as usize
}

impl AudioSlicer {
    pub fn new(cfg: AudioSliceConfig, sample_rate: u32) -> Result<Self> {
        if cfg.min_slice_length_ms < cfg.min_interval_ms || cfg.min_interval_ms < cfg.hop_size_ms {
            return Err(SliceError::InvalidConfig(
                "requires min_slice_length_ms >= min_interval_ms >= hop_size_ms".into(),
            ));
        }
        if cfg.max_sil_kept_ms < cfg.hop_size_ms {
            return Err(SliceError::InvalidConfig(
                "requires max_sil_kept_ms >= hop_size_ms".into(),
            ));
        }

        let sr = sample_rate as f64;
        let threshold = 10f32.powf(cfg.threshold_db as f32 / 20.0);

        let hop = round_usize(sr * cfg.hop_size_ms as f64 / 1000.0).max(1);
        let win = (cfg.min_interval_ms as usize).min(4 * hop);
        let min_length_f = round_usize(sr * cfg.min_slice_length_ms as f64 / 1000.0 / hop as f64);
        let min_interval_f = round_usize(cfg.min_interval_ms as f64 / hop as f64);
        let max_sil_kept_f = round_usize(sr * cfg.max_sil_kept_ms as f64 / 1000.0 / hop as f64);

        Ok(Self {
            cfg,
            threshold,
            hop,
            win,
            min_length_f,
            min_interval_f,
            max_sil_kept_f,
        })
    }

    pub fn config(&self) -> &AudioSliceConfig {
        &self.cfg
    }

    /// Slice `waveform` on silence, returning chunks in playback order. A
    /// waveform shorter than `min_length_f` frames comes back as a single
    /// unsliced chunk.
    pub fn slice(&self, waveform: &Waveform) -> Result<Vec<Waveform>> {
        let mono = waveform.to_mono();
        let total_samples = mono.len();
        let total_frames = total_samples.div_ceil(self.hop.max(1));

        if total_frames <= self.min_length_f {
            return Ok(vec![waveform.clone()]);
        }

        let rms = self.rms_per_frame(&mono);
        let sil_tags = self.find_silence_tags(&rms, total_frames);

        if sil_tags.is_empty() {
            return Ok(vec![waveform.clone()]);
        }

        let chunks = self.emit_chunks(waveform, &sil_tags, total_samples);
        if chunks.is_empty() {
            return Err(SliceError::NoChunksProduced);
        }
        Ok(chunks)
    }

    /// Windowed RMS, one value per hop-sized frame, with half-window
    /// zero-padding on both ends so frame `i` is centered on sample `i*hop`.
    fn rms_per_frame(&self, mono: &[f32]) -> Vec<f32> {
        let pad = self.win / 2;
        let mut padded = vec![0f32; pad];
        padded.extend_from_slice(mono);
        padded.extend(std::iter::repeat_n(0f32, pad + self.win));

        let total_frames = mono.len().div_ceil(self.hop.max(1));
        let mut out = Vec::with_capacity(total_frames);
        for frame in 0..total_frames {
            let start = frame * self.hop;
            let end = (start + self.win).min(padded.len());
            let window = &padded[start..end];
            let sum_sq: f32 = window.iter().map(|s| s * s).sum();
            out.push((sum_sq / window.len().max(1) as f32).sqrt());
        }
        out
    }

    /// Walk the RMS curve, returning `(start, end)` frame ranges to cut out
    /// as silence. Mirrors the reference slicer's three width regimes.
    fn find_silence_tags(&self, rms: &[f32], total_frames: usize) -> Vec<(usize, usize)> {
        let mut sil_tags = Vec::new();
        let mut silence_start: Option<usize> = None;
        let mut clip_start = 0usize;

        for i in 0..total_frames {
            let is_silent = rms[i] < self.threshold;

            if silence_start.is_none() {
                if is_silent {
                    silence_start = Some(i);
                }
                continue;
            }

            if is_silent {
                continue;
            }

            // Silence run [silence_start, i) just ended.
            let sil_start = silence_start.unwrap();
            let is_leading_silence = sil_start == 0 && i > self.max_sil_kept_f;
            let need_slice_middle = i - sil_start >= self.min_interval_f && i - clip_start >= self.min_length_f;

            if !is_leading_silence && !need_slice_middle {
                silence_start = None;
                continue;
            }

            let run_len = i - sil_start;
            if run_len <= self.max_sil_kept_f {
                let pos = argmin(bounded(rms, sil_start, i + 1)) + sil_start;
                if sil_start == 0 {
                    sil_tags.push((0, pos));
                } else {
                    sil_tags.push((pos, pos));
                }
                clip_start = pos;
            } else if run_len <= self.max_sil_kept_f * 2 {
                let global_lo = i - self.max_sil_kept_f;
                let global_hi = sil_start + self.max_sil_kept_f + 1;
                let pos = argmin(bounded(rms, global_lo, global_hi)) + global_lo;
                let pos_l = argmin(bounded(rms, sil_start, sil_start + self.max_sil_kept_f + 1)) + sil_start;
                let pos_r = argmin(bounded(rms, i - self.max_sil_kept_f, i + 1)) + (i - self.max_sil_kept_f);
                if sil_start == 0 {
                    sil_tags.push((0, pos_r));
                    clip_start = pos_r;
                } else {
                    sil_tags.push((pos_l.min(pos), pos_r.max(pos)));
                    clip_start = pos_r.max(pos);
                }
            } else {
                let pos_l = argmin(bounded(rms, sil_start, sil_start + self.max_sil_kept_f + 1)) + sil_start;
                let pos_r = argmin(bounded(rms, i - self.max_sil_kept_f, i + 1)) + (i - self.max_sil_kept_f);
                if sil_start == 0 {
                    sil_tags.push((0, pos_r));
                } else {
                    sil_tags.push((pos_l, pos_r));
                }
                clip_start = pos_r;
            }
            silence_start = None;
        }

        // Trailing silence run reaching end-of-signal.
        if let Some(sil_start) = silence_start {
            let run_len = total_frames - sil_start;
            if run_len >= self.min_interval_f {
                let silence_end = (sil_start + self.max_sil_kept_f).min(total_frames);
                let pos = argmin(bounded(rms, sil_start, silence_end + 1)) + sil_start;
                sil_tags.push((pos, total_frames + 1));
            }
        }

        sil_tags
    }

    fn emit_chunks(&self, waveform: &Waveform, sil_tags: &[(usize, usize)], total_samples: usize) -> Vec<Waveform> {
        let mut chunks = Vec::new();
        let hop = self.hop;

        if sil_tags[0].0 > 0 {
            let end = (sil_tags[0].0 * hop).min(total_samples);
            chunks.push(waveform.slice_samples(0, end));
        }

        for pair in sil_tags.windows(2) {
            let start = (pair[0].1 * hop).min(total_samples);
            let end = (pair[1].0 * hop).min(total_samples);
            if end > start {
                chunks.push(waveform.slice_samples(start, end));
            }
        }

        let last = sil_tags.last().unwrap();
        if last.1 < total_samples.div_ceil(hop.max(1)) {
            let start = (last.1 * hop).min(total_samples);
            if start < total_samples {
                chunks.push(waveform.slice_samples(start, total_samples));
            }
        }

        chunks
    }
}

/// Clamp `[start, end)` to `rms`'s bounds, mirroring numpy's forgiving
/// out-of-range slicing.
fn bounded(rms: &[f32], start: usize, end: usize) -> &[f32] {
    let start = start.min(rms.len());
    let end = end.min(rms.len()).max(start);
    &rms[start..end]
}

fn argmin(values: &[f32]) -> usize {
    let mut best_idx = 0;
    let mut best_val = f32::INFINITY;
    for (i, v) in values.iter().enumerate() {
        if *v < best_val {
            best_val = *v;
            best_idx = i;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_then_loud(silent_sec: f64, loud_sec: f64, sr: u32) -> Waveform {
        let silent_n = (silent_sec * sr as f64) as usize;
        let loud_n = (loud_sec * sr as f64) as usize;
        let mut samples = vec![0f32; silent_n];
        for i in 0..loud_n {
            samples.push(((i as f32) * 0.3).sin() * 0.5);
        }
        Waveform {
            channels: vec![samples],
            sample_rate: sr,
        }
    }

    #[test]
    fn rejects_invalid_ordering() {
        let mut cfg = AudioSliceConfig::default();
        cfg.min_interval_ms = cfg.hop_size_ms - 1;
        assert!(AudioSlicer::new(cfg, 16_000).is_err());
    }

    #[test]
    fn short_waveform_returns_single_chunk() {
        let cfg = AudioSliceConfig::default();
        let slicer = AudioSlicer::new(cfg, 16_000).unwrap();
        let waveform = silent_then_loud(0.1, 0.1, 16_000);
        let chunks = slicer.slice(&waveform).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_waveform_with_leading_silence_is_sliced() {
        let mut cfg = AudioSliceConfig::default();
        cfg.min_slice_length_ms = 500;
        cfg.min_interval_ms = 300;
        cfg.hop_size_ms = 10;
        cfg.max_sil_kept_ms = 200;
        let slicer = AudioSlicer::new(cfg, 16_000).unwrap();

        let waveform = silent_then_loud(1.0, 1.0, 16_000);
        let chunks = slicer.slice(&waveform).unwrap();
        assert!(!chunks.is_empty());
        let total: usize = chunks.iter().map(|c| c.num_samples()).sum();
        assert!(total <= waveform.num_samples());
    }

    #[test]
    fn frame_thresholds_scale_with_sample_rate() {
        let cfg = AudioSliceConfig::default();
        let at_16k = AudioSlicer::new(cfg.clone(), 16_000).unwrap();
        let at_44k = AudioSlicer::new(cfg, 44_100).unwrap();
        assert!(at_44k.min_length_f > at_16k.min_length_f);
        assert!(at_44k.hop > at_16k.hop);
    }
}
