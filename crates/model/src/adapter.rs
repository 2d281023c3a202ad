use crate::cache::ModelCache;
use crate::engine::{EngineOutput, TranscriptionEngine, WhisperRsEngine};
use crate::error::Result;
use crate::fetcher::ModelFetcher;
use crate::key::ModelKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Thin wrapper that resolves a `ModelKey` to a cached engine handle and
/// forwards transcription calls to it.
pub struct TranscribeAdapter {
    cache: ModelCache<WhisperRsEngine>,
    fetcher: Arc<dyn ModelFetcher>,
    models_dir: PathBuf,
}

impl TranscribeAdapter {
    pub fn new(fetcher: Arc<dyn ModelFetcher>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache: ModelCache::new(),
            fetcher,
            models_dir: models_dir.into(),
        }
    }

    pub async fn transcribe(
        &self,
        key: ModelKey,
        audio_path: &Path,
        beam_size: u32,
        language: Option<&str>,
    ) -> Result<EngineOutput> {
        let key = key.coerced();
        let target_dir = self.models_dir.join(key.local_dir_name());
        let fetcher = self.fetcher.clone();
        let repo_id = key.repo_id.clone();

        let engine = self
            .cache
            .get_or_load(key, || async move {
                let model_path = if target_dir.exists() {
                    find_existing_model_file(&target_dir)?
                } else {
                    fetcher.fetch(&repo_id, &target_dir).await?
                };
                WhisperRsEngine::load(&model_path)
            })
            .await?;

        engine.transcribe(audio_path, beam_size, language).await
    }

    /// Loads `key` into the cache without transcribing anything, so the
    /// first real request doesn't pay the fetch/load cost.
    pub async fn warm(&self, key: ModelKey) -> Result<()> {
        let key = key.coerced();
        let target_dir = self.models_dir.join(key.local_dir_name());
        let fetcher = self.fetcher.clone();
        let repo_id = key.repo_id.clone();

        self.cache
            .get_or_load(key, || async move {
                let model_path = if target_dir.exists() {
                    find_existing_model_file(&target_dir)?
                } else {
                    fetcher.fetch(&repo_id, &target_dir).await?
                };
                WhisperRsEngine::load(&model_path)
            })
            .await?;
        Ok(())
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cached_keys(&self) -> Vec<ModelKey> {
        self.cache.names().await
    }
}

fn find_existing_model_file(dir: &Path) -> Result<PathBuf> {
    std::fs::read_dir(dir)
        .ok()
        .and_then(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .find(|p| p.extension().and_then(|e| e.to_str()) == Some("bin"))
        })
        .ok_or_else(|| crate::error::ModelError::ModelLoadFailed(format!("no model file under {}", dir.display())))
}
