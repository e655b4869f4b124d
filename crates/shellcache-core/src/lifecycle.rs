//! The offline cache policy: install, activate, fetch.
//!
//! Each phase is a free function over an explicit `CacheConfig`, so several
//! versions can be exercised side by side without shared global state. The
//! host decides when each phase runs (see `crate::worker`).

use futures::future::{join_all, try_join_all};
use tracing::{debug, error, info, warn};

use crate::cache::CacheStorage;
use crate::config::CacheConfig;
use crate::error::{truncate_body, CacheError, CacheResult};
use crate::models::{Request, Response};
use crate::network::Network;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub bucket: String,
    pub cached: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// The current bucket, if it exists
    pub kept: Option<String>,
    pub deleted: Vec<String>,
    /// Stale buckets that could not be deleted, with the reason
    pub failed: Vec<(String, String)>,
}

/// What the fetch hook decided for one intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the host's default network handling applies.
    Passthrough,
    /// Served verbatim from the current bucket.
    Cached(Response),
    /// Fetched from the network and passed through without being stored.
    Network(Response),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Cached(r) | FetchOutcome::Network(r) => Some(r),
        }
    }
}

async fn fetch_asset(network: &dyn Network, request: Request) -> CacheResult<(Request, Response)> {
    let url = request.url.to_string();
    let response = network
        .fetch(&request)
        .await
        .map_err(|e| CacheError::Population {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    if response.is_opaque() {
        return Err(CacheError::Population {
            url,
            reason: "opaque response cannot be validated".to_string(),
        });
    }
    if !response.ok() {
        return Err(CacheError::Population {
            url,
            reason: format!("status {}: {}", response.status, truncate_body(&response.body)),
        });
    }

    Ok((request, response))
}

/// Populate the bucket named by `config.version` with every listed asset.
///
/// All-or-nothing: if any asset cannot be fetched or stored, nothing is
/// written and a bucket created by this call is removed again.
pub async fn install(
    config: &CacheConfig,
    storage: &dyn CacheStorage,
    network: &dyn Network,
) -> CacheResult<InstallReport> {
    config.validate()?;
    let bucket = config.version.as_str();
    let urls = config.asset_urls()?;

    let existed = storage.keys().await?.iter().any(|name| name == bucket);
    storage.open(bucket).await?;
    info!(bucket = bucket, assets = urls.len(), "Caching app shell");

    let populate = async {
        let entries =
            try_join_all(urls.into_iter().map(|url| fetch_asset(network, Request::get(url)))).await?;
        let count = entries.len();
        storage.put_all(bucket, entries).await?;
        Ok::<usize, CacheError>(count)
    };

    match populate.await {
        Ok(cached) => {
            info!(bucket = bucket, cached = cached, "App shell cached");
            Ok(InstallReport {
                bucket: bucket.to_string(),
                cached,
            })
        }
        Err(e) => {
            error!(bucket = bucket, error = %e, "Failed to cache app shell");
            if !existed {
                if let Err(cleanup) = storage.delete(bucket).await {
                    warn!(bucket = bucket, error = %cleanup, "Failed to remove incomplete bucket");
                }
            }
            Err(e)
        }
    }
}

/// Delete every bucket except the current one.
///
/// Deletions run concurrently; a failed deletion is logged and reported but
/// does not fail activation.
pub async fn activate(config: &CacheConfig, storage: &dyn CacheStorage) -> CacheResult<ActivateReport> {
    let current = config.version.as_str();
    let names = storage.keys().await?;

    let (kept, stale): (Vec<String>, Vec<String>) =
        names.into_iter().partition(|name| name == current);

    let results = join_all(stale.into_iter().map(|name| async move {
        info!(bucket = %name, "Clearing old cache");
        let result = storage.delete(&name).await;
        (name, result)
    }))
    .await;

    let mut report = ActivateReport {
        kept: kept.into_iter().next(),
        ..Default::default()
    };
    for (name, result) in results {
        match result {
            Ok(_) => report.deleted.push(name),
            Err(e) => {
                warn!(bucket = %name, error = %e, "Failed to clear old cache");
                report.failed.push((name, e.to_string()));
            }
        }
    }

    info!(
        current = current,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "Activated"
    );
    Ok(report)
}

/// Cache-first with network fallback, GET only.
///
/// Nothing fetched here is ever stored: only the install-time asset list is
/// cached. A network failure surfaces as an error; no fallback content is
/// synthesized.
pub async fn handle_fetch(
    config: &CacheConfig,
    storage: &dyn CacheStorage,
    network: &dyn Network,
    request: &Request,
) -> CacheResult<FetchOutcome> {
    if !request.method.is_get() {
        return Ok(FetchOutcome::Passthrough);
    }

    match storage.match_request(&config.version, request).await {
        Ok(Some(cached)) => {
            debug!(url = %request.url, "Cache hit");
            return Ok(FetchOutcome::Cached(cached.data));
        }
        Ok(None) => debug!(url = %request.url, "Cache miss"),
        Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed, using network"),
    }

    match network.fetch(request).await {
        Ok(response) => {
            if response.is_opaque() {
                debug!(url = %request.url, "Passing through opaque response");
            } else if response.status != 200 {
                debug!(url = %request.url, status = response.status, "Passing through non-200 response");
            }
            Ok(FetchOutcome::Network(response))
        }
        Err(e) => {
            warn!(url = %request.url, error = %e, "Network request failed and no cached copy");
            Err(e.into())
        }
    }
}
