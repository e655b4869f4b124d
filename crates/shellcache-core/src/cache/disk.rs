//! Filesystem cache storage.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<bucket>/index.json        cache key -> response metadata + blob name
//! <root>/<bucket>/blobs/<sha>.bin   response bodies
//! ```
//!
//! Blobs are named by a hash of cache key and body, so a write never touches
//! a blob the live index points at. `put_all` writes new blobs first, swaps in
//! the new index with a rename, then removes blobs nothing references.
//! Readers see either the previous index or the complete new one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::cache::{CacheStorage, CachedData};
use crate::error::{CacheError, CacheResult};
use crate::models::{Request, Response};

const INDEX_FILE: &str = "index.json";
const INDEX_TMP_FILE: &str = "index.json.tmp";
const BLOB_DIR: &str = "blobs";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    blob: String,
    #[serde(flatten)]
    cached: CachedData<Response>,
}

type Index = BTreeMap<String, IndexEntry>;

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub async fn new(root: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::io(format!("creating cache root {}", root.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> CacheResult<PathBuf> {
        validate_bucket_name(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn blob_name(key: &str, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(body);
        format!("{}.bin", hex::encode(hasher.finalize()))
    }

    /// Write a blob through a temp file so a partial write is never visible
    /// under its final name. An existing blob with the same name already
    /// holds these bytes.
    async fn write_blob(blob_dir: &Path, blob: &str, body: &[u8]) -> CacheResult<()> {
        let path = blob_dir.join(blob);
        if fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Ok(());
        }
        let tmp = blob_dir.join(format!("{}.tmp", blob));
        fs::write(&tmp, body)
            .await
            .map_err(|e| CacheError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| CacheError::io(format!("renaming {}", tmp.display()), e))?;
        Ok(())
    }

    /// Remove files the index no longer references, including temp files
    /// from failed writes. Failures only leave unused files behind.
    async fn remove_unreferenced(blob_dir: &Path, index: &Index) {
        let Ok(mut dir) = fs::read_dir(blob_dir).await else {
            return;
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if index.values().any(|e| e.blob == name) {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()).await {
                debug!(blob = name, error = %e, "Failed to remove unreferenced blob");
            }
        }
    }

    async fn read_entry(dir: &Path, key: &str) -> CacheResult<Option<(IndexEntry, Vec<u8>)>> {
        let Some(mut index) = Self::load_index(dir).await? else {
            return Ok(None);
        };
        let Some(entry) = index.remove(key) else {
            return Ok(None);
        };
        let blob_path = dir.join(BLOB_DIR).join(&entry.blob);
        let body = fs::read(&blob_path)
            .await
            .map_err(|e| CacheError::io(format!("reading {}", blob_path.display()), e))?;
        Ok(Some((entry, body)))
    }

    async fn load_index(dir: &Path) -> CacheResult<Option<Index>> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .await
            .map_err(|e| CacheError::io(format!("reading {}", path.display()), e))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn write_index(dir: &Path, index: &Index) -> CacheResult<()> {
        let tmp = dir.join(INDEX_TMP_FILE);
        let path = dir.join(INDEX_FILE);
        let contents = serde_json::to_string_pretty(index)?;
        fs::write(&tmp, contents)
            .await
            .map_err(|e| CacheError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| CacheError::io(format!("replacing {}", path.display()), e))?;
        Ok(())
    }
}

/// Bucket names become directory names, so they must be a single path
/// component.
fn validate_bucket_name(bucket: &str) -> CacheResult<()> {
    let invalid = bucket.is_empty()
        || bucket.starts_with('.')
        || bucket.contains(['/', '\\', '\0'])
        || bucket.len() > 255;
    if invalid {
        return Err(CacheError::InvalidBucket(bucket.to_string()));
    }
    Ok(())
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, bucket: &str) -> CacheResult<()> {
        let dir = self.bucket_path(bucket)?;
        fs::create_dir_all(dir.join(BLOB_DIR))
            .await
            .map_err(|e| CacheError::io(format!("creating bucket {}", bucket), e))?;
        if Self::load_index(&dir).await?.is_none() {
            Self::write_index(&dir, &Index::new()).await?;
        }
        Ok(())
    }

    async fn put_all(&self, bucket: &str, entries: Vec<(Request, Response)>) -> CacheResult<()> {
        self.open(bucket).await?;
        let dir = self.bucket_path(bucket)?;
        let blob_dir = dir.join(BLOB_DIR);
        let mut index = Self::load_index(&dir).await?.unwrap_or_default();

        for (request, response) in entries {
            let key = request.cache_key();
            let blob = Self::blob_name(&key, &response.body);
            Self::write_blob(&blob_dir, &blob, &response.body).await?;
            index.insert(
                key,
                IndexEntry {
                    blob,
                    cached: CachedData::new(response),
                },
            );
        }

        Self::write_index(&dir, &index).await?;
        debug!(bucket = bucket, entries = index.len(), "Wrote bucket index");
        Self::remove_unreferenced(&blob_dir, &index).await;
        Ok(())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| CacheError::io("reading cache root", e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io("reading cache root entry", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_bucket_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, bucket: &str) -> CacheResult<bool> {
        let dir = self.bucket_path(bucket)?;
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(format!("deleting bucket {}", bucket), e))?;
        Ok(true)
    }

    async fn match_request(
        &self,
        bucket: &str,
        request: &Request,
    ) -> CacheResult<Option<CachedData<Response>>> {
        let dir = self.bucket_path(bucket)?;
        let key = request.cache_key();

        // A concurrent put_all may remove the blob between reading the index
        // and reading the body; the index it swapped in is complete.
        let found = match Self::read_entry(&dir, &key).await {
            Err(CacheError::Io { ref source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::read_entry(&dir, &key).await?
            }
            other => other?,
        };
        let Some((entry, body)) = found else {
            return Ok(None);
        };

        let mut cached = entry.cached;
        cached.data.body = body;
        Ok(Some(cached))
    }

    async fn entries(&self, bucket: &str) -> CacheResult<Vec<String>> {
        let dir = self.bucket_path(bucket)?;
        Ok(Self::load_index(&dir)
            .await?
            .map(|index| index.into_keys().collect())
            .unwrap_or_default())
    }
}
