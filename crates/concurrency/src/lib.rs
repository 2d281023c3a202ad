//! Picks a per-request parallelism level from core count, slice count,
//! audio duration and (optionally) live system load.

use config::ConcurrencyConfig;
use std::time::Duration;
use sysinfo::System;

/// Stateless optimizer bound to one `ConcurrencyConfig`. Safe to share
/// across requests; load sampling is done fresh on every call.
pub struct ConcurrencyOptimizer {
    cfg: ConcurrencyConfig,
}

impl ConcurrencyOptimizer {
    pub fn new(cfg: ConcurrencyConfig) -> Self {
        Self { cfg }
    }

    /// Compute the concurrency to use for one request. `pinned` overrides
    /// the computation when the caller requested a specific value, still
    /// clamped to `[1, total_slices]` when slicing is in play.
    pub fn optimal_concurrency(&self, total_slices: usize, audio_duration_sec: f64, pinned: Option<u32>) -> u32 {
        if let Some(value) = pinned {
            return if total_slices > 0 {
                value.min(total_slices as u32).max(1)
            } else {
                value
            };
        }

        let cores = num_cpus::get();
        let cpu_based = self.cpu_based(cores);
        let slice_based = self.slice_based(total_slices);
        let duration_based = self.duration_based(audio_duration_sec, cores);
        let load_based_or_cpu_based = if self.cfg.consider_system_load {
            self.load_based(cores)
        } else {
            cpu_based
        };

        let soft = slice_based.max(duration_based).max(load_based_or_cpu_based);
        let hard = cpu_based.min(self.cfg.max_concurrent_limit);
        let result = hard.min(soft);

        result.clamp(self.cfg.min_concurrent_limit, self.cfg.max_concurrent_limit)
    }

    fn cpu_based(&self, cores: usize) -> u32 {
        let cores = cores as u32;
        let reserved = match cores {
            0..=4 => cores.saturating_sub(1),
            5..=8 => cores.saturating_sub(2),
            9..=16 => cores.saturating_sub(4),
            17..=32 => cores.saturating_sub(8),
            _ => (cores * 3 / 4).min(32),
        };
        reserved.max(1)
    }

    fn slice_based(&self, total_slices: usize) -> u32 {
        let n = total_slices as u32;
        let spt = self.cfg.slices_per_thread.max(1);
        let per_thread = n.div_ceil(spt);
        match n {
            0..=5 => per_thread.min(2).min(n.max(1)),
            6..=20 => per_thread.min(8),
            21..=50 => per_thread.min(16),
            51..=100 => per_thread.min(24),
            _ => per_thread.min(self.cfg.max_concurrent_limit),
        }
    }

    fn duration_based(&self, audio_duration_sec: f64, cores: usize) -> u32 {
        let cores = cores as u32;
        let minutes = audio_duration_sec / 60.0;
        let limit = self.cfg.max_concurrent_limit;
        if minutes > 60.0 {
            limit.min((cores * 4 / 5).max(4))
        } else if minutes > 30.0 {
            limit.min((cores * 3 / 5).max(3))
        } else {
            limit.min((cores / 2).max(2))
        }
    }

    fn load_based(&self, cores: usize) -> u32 {
        let cores = cores as u32;
        match sample_system_load() {
            Some((cpu_pct, mem_pct)) => {
                if cpu_pct >= 80.0 || mem_pct >= 80.0 {
                    (cores / 2).max(1)
                } else if cpu_pct > 60.0 {
                    cores.saturating_sub(2).max(2)
                } else {
                    cores
                }
            }
            None => {
                log::warn!("system load sampling failed, falling back to cores-2");
                cores.saturating_sub(2).max(2)
            }
        }
    }
}

/// Sample global CPU usage (100ms window, matching the reference sampler)
/// and memory usage percentage. Returns `None` on a degenerate reading.
fn sample_system_load() -> Option<(f64, f64)> {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    std::thread::sleep(Duration::from_millis(100));
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let cpu_pct = sys.global_cpu_usage() as f64;
    let total_mem = sys.total_memory();
    if total_mem == 0 {
        return None;
    }
    let mem_pct = sys.used_memory() as f64 / total_mem as f64 * 100.0;
    Some((cpu_pct, mem_pct))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ConcurrencyConfig {
        ConcurrencyConfig {
            default_max_concurrent: 4,
            min_concurrent_limit: 1,
            max_concurrent_limit: 8,
            slices_per_thread: 3,
            consider_system_load: false,
        }
    }

    #[test]
    fn pinned_value_is_clamped_to_slice_count() {
        let optimizer = ConcurrencyOptimizer::new(cfg());
        assert_eq!(optimizer.optimal_concurrency(3, 100.0, Some(10)), 3);
        assert_eq!(optimizer.optimal_concurrency(0, 100.0, Some(10)), 10);
    }

    #[test]
    fn result_never_exceeds_configured_limit() {
        let optimizer = ConcurrencyOptimizer::new(cfg());
        let result = optimizer.optimal_concurrency(200, 5000.0, None);
        assert!(result <= cfg().max_concurrent_limit);
        assert!(result >= cfg().min_concurrent_limit);
    }

    #[test]
    fn small_slice_counts_stay_small() {
        let optimizer = ConcurrencyOptimizer::new(cfg());
        let result = optimizer.optimal_concurrency(2, 10.0, None);
        assert!(result <= 2);
    }
}
