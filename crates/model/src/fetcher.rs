use crate::error::{ModelError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Downloads a model repo into a local directory, resuming a previous
/// partial download when possible. `FetchModel` from the component design.
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    async fn fetch(&self, repo_id: &str, target_dir: &Path) -> Result<PathBuf>;
}

/// Production fetcher backed by the HuggingFace Hub.
pub struct HfHubFetcher {
    cache_dir: PathBuf,
}

impl HfHubFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into() }
    }
}

#[async_trait]
impl ModelFetcher for HfHubFetcher {
    async fn fetch(&self, repo_id: &str, target_dir: &Path) -> Result<PathBuf> {
        use hf_hub::api::tokio::ApiBuilder;

        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| ModelError::FetchFailed(e.to_string()))?;

        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .build()
            .map_err(|e| ModelError::FetchFailed(e.to_string()))?;
        let repo = api.model(repo_id.to_string());

        // ggml-format whisper checkpoints publish a single binary; the exact
        // filename varies by repo so we ask the repo for its file listing
        // and grab the first `.bin`.
        let info = repo.info().await.map_err(|e| ModelError::FetchFailed(e.to_string()))?;
        let model_file = info
            .siblings
            .iter()
            .map(|s| s.rfilename.clone())
            .find(|name| name.ends_with(".bin"))
            .ok_or_else(|| ModelError::FetchFailed(format!("no .bin model file found in {repo_id}")))?;

        let downloaded = repo
            .get(&model_file)
            .await
            .map_err(|e| ModelError::FetchFailed(e.to_string()))?;

        let dest = target_dir.join(&model_file);
        if downloaded != dest {
            tokio::fs::copy(&downloaded, &dest)
                .await
                .map_err(|e| ModelError::FetchFailed(e.to_string()))?;
        }
        Ok(dest)
    }
}
