//! Cache configuration.
//!
//! A configuration is one version string naming the current bucket, the
//! origin that same-origin asset paths resolve against, and the ordered
//! asset list to pre-cache. Changing the version is the only way to
//! invalidate what is cached.
//!
//! Configuration is stored at `~/.config/shellcache/config.json`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CacheError, CacheResult};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "shellcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_VERSION: &str = "joseph-planner-v2";

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080/";

pub const DEFAULT_ASSETS: &[&str] = &[
    "/index.html",
    "/manifest.json",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/webfonts/fa-solid-900.woff2",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub version: String,
    /// Base URL that same-origin asset paths resolve against
    pub origin: String,
    pub assets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CacheConfig {
    pub fn new(version: impl Into<String>, origin: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            version: version.into(),
            origin: origin.into(),
            assets,
        }
    }

    /// Same origin and asset list under another version.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> CacheResult<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| CacheError::io(format!("reading {}", path.display()), e))?;
            let config: Self = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> CacheResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::io(format!("creating {}", parent.display()), e))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| CacheError::io(format!("writing {}", path.display()), e))?;
        Ok(())
    }

    pub fn default_path() -> CacheResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            CacheError::InvalidConfig("Could not find config directory".to_string())
        })?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn default_cache_dir() -> CacheResult<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| {
            CacheError::InvalidConfig("Could not find cache directory".to_string())
        })?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn origin_url(&self) -> CacheResult<Url> {
        Url::parse(&self.origin).map_err(|source| CacheError::InvalidUrl {
            url: self.origin.clone(),
            source,
        })
    }

    /// Resolve a path or absolute URL against the configured origin.
    pub fn resolve(&self, asset: &str) -> CacheResult<Url> {
        self.origin_url()?
            .join(asset)
            .map_err(|source| CacheError::InvalidUrl {
                url: asset.to_string(),
                source,
            })
    }

    /// The asset list as absolute URLs, in configured order.
    pub fn asset_urls(&self) -> CacheResult<Vec<Url>> {
        self.assets.iter().map(|a| self.resolve(a)).collect()
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.version.trim().is_empty() {
            return Err(CacheError::InvalidConfig("version must not be empty".to_string()));
        }
        if self.assets.is_empty() {
            return Err(CacheError::InvalidConfig("asset list must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for url in self.asset_urls()? {
            let mut key = url.clone();
            key.set_fragment(None);
            if !seen.insert(key.to_string()) {
                return Err(CacheError::InvalidConfig(format!(
                    "asset listed twice: {}",
                    url
                )));
            }
        }
        Ok(())
    }
}
