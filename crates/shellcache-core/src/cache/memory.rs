use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheStorage, CachedData};
use crate::error::CacheResult;
use crate::models::{Request, Response};

type Bucket = BTreeMap<String, CachedData<Response>>;

/// In-process cache storage. Clones of the stored responses are handed out,
/// so callers never observe later writes through a returned value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, bucket: &str) -> CacheResult<()> {
        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_all(&self, bucket: &str, entries: Vec<(Request, Response)>) -> CacheResult<()> {
        // Built outside the lock so the insert below cannot fail halfway
        let staged: Vec<(String, CachedData<Response>)> = entries
            .into_iter()
            .map(|(request, response)| (request.cache_key(), CachedData::new(response)))
            .collect();

        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket.to_string()).or_default().extend(staged);
        Ok(())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let buckets = self.buckets.read().await;
        let mut names: Vec<String> = buckets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, bucket: &str) -> CacheResult<bool> {
        let mut buckets = self.buckets.write().await;
        Ok(buckets.remove(bucket).is_some())
    }

    async fn match_request(
        &self,
        bucket: &str,
        request: &Request,
    ) -> CacheResult<Option<CachedData<Response>>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .and_then(|b| b.get(&request.cache_key()))
            .cloned())
    }

    async fn entries(&self, bucket: &str) -> CacheResult<Vec<String>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default())
    }
}
