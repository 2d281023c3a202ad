use crate::error::Result;
use crate::types::{MergeInfo, SliceInfo};
use crate::waveform::Waveform;

/// Collapses an over-long slice plan down to at most `max_total_slices`
/// entries. When `n > M`, consecutive slices are grouped into batches of
/// size `k = floor(n / M) + 1` (the last batch may be smaller) and each
/// batch is materialized into one merged waveform by concatenation in
/// index order, so `ceil(n / k) <= M` entries come out.
pub struct SliceCompactor {
    max_total_slices: usize,
}

impl SliceCompactor {
    pub fn new(max_total_slices: usize) -> Self {
        Self { max_total_slices }
    }

    /// `slices` must be in ascending `start_time_sec` order, one waveform per
    /// entry.
    pub fn compact(&self, slices: Vec<(SliceInfo, Waveform)>) -> Result<Vec<(SliceInfo, Waveform)>> {
        let n = slices.len();
        if n <= self.max_total_slices || self.max_total_slices == 0 {
            return Ok(slices);
        }

        let batch_size = n / self.max_total_slices + 1;
        let mut out = Vec::with_capacity(n.div_ceil(batch_size));

        for batch in slices.chunks(batch_size) {
            if batch.len() == 1 {
                out.push(batch[0].clone());
                continue;
            }
            out.push(merge_batch(batch)?);
        }

        Ok(out)
    }
}

fn merge_batch(batch: &[(SliceInfo, Waveform)]) -> Result<(SliceInfo, Waveform)> {
    let (first_info, first_wave) = &batch[0];
    let target_sr = first_wave.sample_rate;

    let mut merged_wave = first_wave.clone();
    let mut duration_sec = first_info.duration_sec;
    let mut original_indices = vec![first_info.index];

    for (info, wave) in &batch[1..] {
        let resampled = wave.resampled(target_sr)?;
        let (left, right) = align_channels(merged_wave, resampled);
        merged_wave = left.concat(&right);
        duration_sec += info.duration_sec;
        original_indices.push(info.index);
    }

    let merged_info = SliceInfo {
        path: first_info.path.clone(),
        index: first_info.index,
        duration_sec,
        start_time_sec: first_info.start_time_sec,
        merged: Some(MergeInfo { original_indices }),
    };

    Ok((merged_info, merged_wave))
}

fn align_channels(left: Waveform, right: Waveform) -> (Waveform, Waveform) {
    match (left.num_channels(), right.num_channels()) {
        (a, b) if a == b => (left, right),
        (1, _) => (left.upmixed_to_stereo(), right),
        (_, 1) => (left, right.upmixed_to_stereo()),
        _ => (left, right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn slice(index: usize, start: f64, dur: f64, n_samples: usize) -> (SliceInfo, Waveform) {
        (
            SliceInfo {
                path: PathBuf::from(format!("slice_{index}.wav")),
                index,
                duration_sec: dur,
                start_time_sec: start,
                merged: None,
            },
            Waveform {
                channels: vec![vec![0.1f32; n_samples]],
                sample_rate: 16_000,
            },
        )
    }

    #[test]
    fn under_budget_is_untouched() {
        let compactor = SliceCompactor::new(4);
        let slices = vec![slice(0, 0.0, 1.0, 16_000), slice(1, 1.0, 1.0, 16_000)];
        let out = compactor.compact(slices).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn over_budget_batches_to_fixed_size() {
        // n=7, M=2 -> k = 7/2 + 1 = 4, batches of [4, 3] -> 2 entries.
        let compactor = SliceCompactor::new(2);
        let slices: Vec<_> = (0..7).map(|i| slice(i, i as f64, 1.0, 16_000)).collect();
        let out = compactor.compact(slices).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0.index, 0);
        assert_eq!(out[0].0.merged.as_ref().unwrap().original_indices, vec![0, 1, 2, 3]);
        assert_eq!(out[1].0.index, 4);
        assert_eq!(out[1].0.merged.as_ref().unwrap().original_indices, vec![4, 5, 6]);
        let total_samples: usize = out.iter().map(|(_, w)| w.num_samples()).sum();
        assert_eq!(total_samples, 16_000 * 7);
    }

    #[test]
    fn singleton_batch_is_returned_unchanged() {
        let compactor = SliceCompactor::new(3);
        let slices: Vec<_> = (0..4).map(|i| slice(i, i as f64, 1.0, 16_000)).collect();
        // n=4, M=3 -> k = 4/3 + 1 = 2, batches of [2, 2] -> 2 entries (all merged).
        let out = compactor.compact(slices).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|(info, _)| info.merged.is_some()));
    }
}
