//! Subcommand implementations.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use shellcache_core::{
    activate, install, CacheConfig, CacheStorage, DiskStorage, HttpNetwork, Method, Request,
    ResponseSource, WorkerHost,
};
use tracing::{debug, info};
use url::Url;

use crate::cli::{Cli, ConfigCommand, FetchArgs};

/// Effective settings resolved from flags, environment, and config file.
pub struct Settings {
    pub config: CacheConfig,
    pub config_path: PathBuf,
    pub cache_dir: PathBuf,
}

impl Settings {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config_path = match cli.config {
            Some(ref path) => path.clone(),
            None => CacheConfig::default_path()?,
        };
        let mut config = CacheConfig::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        if let Some(ref version) = cli.version_tag {
            config = config.with_version(version.clone());
        }
        config.validate()?;

        let cache_dir = match cli.cache_dir {
            Some(ref dir) => dir.clone(),
            None => CacheConfig::default_cache_dir()?,
        };
        debug!(config = %config_path.display(), cache_dir = %cache_dir.display(), version = %config.version, "Resolved settings");

        Ok(Self {
            config,
            config_path,
            cache_dir,
        })
    }

    async fn storage(&self) -> Result<Arc<DiskStorage>> {
        let storage = DiskStorage::new(self.cache_dir.clone())
            .await
            .with_context(|| format!("Failed to open cache at {}", self.cache_dir.display()))?;
        Ok(Arc::new(storage))
    }

    fn network(&self) -> Result<Arc<HttpNetwork>> {
        Ok(Arc::new(HttpNetwork::new(&self.config.origin_url()?)?))
    }
}

pub async fn install_cmd(settings: &Settings) -> Result<()> {
    let storage = settings.storage().await?;
    let network = settings.network()?;
    let report = install(&settings.config, storage.as_ref(), network.as_ref())
        .await
        .context("Install failed")?;
    println!("Cached {} assets in {}", report.cached, report.bucket);
    Ok(())
}

pub async fn activate_cmd(settings: &Settings) -> Result<()> {
    let storage = settings.storage().await?;
    // Activating a version that is not installed would delete the bucket
    // of the version still in control
    let version = &settings.config.version;
    if !storage.keys().await?.iter().any(|name| name == version) {
        bail!("{} is not installed; run `shellcache install` first", version);
    }

    let report = activate(&settings.config, storage.as_ref()).await?;

    for name in &report.deleted {
        println!("Deleted {}", name);
    }
    for (name, reason) in &report.failed {
        eprintln!("Could not delete {}: {}", name, reason);
    }
    println!("Active: {}", version);
    Ok(())
}

pub async fn register_cmd(settings: &Settings) -> Result<()> {
    let host = WorkerHost::new(settings.storage().await?, settings.network()?);
    let registration = host
        .register(settings.config.clone())
        .await
        .context("Registration failed, previous version stays in control")?;

    println!(
        "Cached {} assets in {}",
        registration.install.cached, registration.install.bucket
    );
    for name in &registration.activate.deleted {
        println!("Deleted {}", name);
    }
    for (name, reason) in &registration.activate.failed {
        eprintln!("Could not delete {}: {}", name, reason);
    }
    Ok(())
}

pub async fn fetch_cmd(settings: &Settings, args: &FetchArgs) -> Result<()> {
    let method: Method = args.method.parse()?;
    let url = settings.config.resolve(&args.url)?;
    let request = Request::new(method, url);

    let host = WorkerHost::new(settings.storage().await?, settings.network()?);
    if !host.resume(settings.config.clone()).await? {
        info!(version = %settings.config.version, "Version not installed, requests go to the network");
    }

    let dispatched = host.dispatch(&request).await?;
    let source = match dispatched.source {
        ResponseSource::Cache => "cache",
        ResponseSource::Network => "network",
    };
    eprintln!(
        "{} {} -> {} ({}{})",
        request.method,
        request.url,
        dispatched.response.status,
        source,
        if dispatched.intercepted { "" } else { ", not intercepted" }
    );

    match args.output {
        Some(ref path) => std::fs::write(path, &dispatched.response.body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => std::io::stdout()
            .write_all(&dispatched.response.body)
            .context("Failed to write response body")?,
    }
    Ok(())
}

pub async fn list_cmd(settings: &Settings) -> Result<()> {
    let storage = settings.storage().await?;
    let buckets = storage.keys().await?;
    if buckets.is_empty() {
        println!("No buckets in {}", settings.cache_dir.display());
        return Ok(());
    }

    for bucket in buckets {
        let marker = if bucket == settings.config.version { "*" } else { " " };
        let entries = storage.entries(&bucket).await?;
        println!("{} {} ({} entries)", marker, bucket, entries.len());

        for key in entries {
            let request = Request::get(Url::parse(&key)?);
            if let Some(cached) = storage.match_request(&bucket, &request).await? {
                println!(
                    "    {:>3} {:>9}  {:<10} {}",
                    cached.data.status,
                    format_size(cached.data.body.len()),
                    cached.age_display(),
                    key
                );
            }
        }
    }
    Ok(())
}

pub fn config_cmd(settings: &Settings, command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("# {}", settings.config_path.display());
            println!("{}", serde_json::to_string_pretty(&settings.config)?);
        }
        ConfigCommand::Init { force } => {
            if settings.config_path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    settings.config_path.display()
                );
            }
            CacheConfig::default().save(&settings.config_path)?;
            println!("Wrote {}", settings.config_path.display());
        }
    }
    Ok(())
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
