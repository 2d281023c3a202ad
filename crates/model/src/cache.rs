use crate::error::Result;
use crate::key::ModelKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Single-flight keyed cache of model handles. Concurrent `get_or_load`
/// calls for the same key share one in-flight load; different keys load
/// independently.
pub struct ModelCache<H> {
    entries: Mutex<HashMap<ModelKey, Arc<OnceCell<Arc<H>>>>>,
}

impl<H> Default for ModelCache<H> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<H> ModelCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `key`, loading it via `loader` if this
    /// is the first request for that key. A failed load is not cached; the
    /// next caller retries from scratch.
    pub async fn get_or_load<F, Fut>(&self, key: ModelKey, loader: F) -> Result<Arc<H>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<H>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = cell
            .get_or_try_init(|| async { loader().await.map(Arc::new) })
            .await;

        match result {
            Ok(handle) => Ok(handle.clone()),
            Err(err) => {
                // Drop the failed cell so a retry doesn't replay the error forever.
                let mut entries = self.entries.lock().await;
                entries.remove(&key);
                Err(err)
            }
        }
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }

    pub async fn names(&self) -> Vec<ModelKey> {
        let entries = self.entries.lock().await;
        entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_gets_load_once() {
        let cache: Arc<ModelCache<u32>> = Arc::new(ModelCache::new());
        let load_count = Arc::new(AtomicUsize::new(0));
        let key = ModelKey::new("org/model", "cpu", "int8");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let load_count = load_count.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(key, || async {
                        load_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Ok::<u32, ModelError>(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(*handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(load_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache: ModelCache<u32> = ModelCache::new();
        let key = ModelKey::new("org/model", "cpu", "int8");

        let first = cache
            .get_or_load(key.clone(), || async { Err(ModelError::ModelLoadFailed("boom".into())) })
            .await;
        assert!(first.is_err());

        let second = cache.get_or_load(key, || async { Ok::<u32, ModelError>(7) }).await;
        assert_eq!(*second.unwrap(), 7);
    }

    #[tokio::test]
    async fn clear_drops_all_entries() {
        let cache: ModelCache<u32> = ModelCache::new();
        let key = ModelKey::new("org/model", "cpu", "int8");
        cache.get_or_load(key.clone(), || async { Ok::<u32, ModelError>(1) }).await.unwrap();
        assert_eq!(cache.names().await.len(), 1);
        cache.clear().await;
        assert_eq!(cache.names().await.len(), 0);
    }
}
