use async_trait::async_trait;

use crate::cache::CachedData;
use crate::error::CacheResult;
use crate::models::{Request, Response};

/// Named-bucket cache storage shared by every lifecycle phase.
///
/// Install is the only writer (`put_all`), activate the only deleter
/// (`delete`); fetch only reads.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a bucket, creating it if absent
    async fn open(&self, bucket: &str) -> CacheResult<()>;

    /// Store every entry or none of them
    async fn put_all(&self, bucket: &str, entries: Vec<(Request, Response)>) -> CacheResult<()>;

    /// Names of all existing buckets, sorted
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Delete a bucket by name. Returns false if it did not exist.
    async fn delete(&self, bucket: &str) -> CacheResult<bool>;

    /// Look up a stored response by request identity
    async fn match_request(
        &self,
        bucket: &str,
        request: &Request,
    ) -> CacheResult<Option<CachedData<Response>>>;

    /// Cache keys stored in a bucket, sorted. Empty if the bucket is absent.
    async fn entries(&self, bucket: &str) -> CacheResult<Vec<String>>;
}
