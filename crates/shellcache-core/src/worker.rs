//! Host boundary for the cache lifecycle.
//!
//! `ServiceWorker` binds one configuration to the shared storage and network.
//! `WorkerHost` plays the environment: it runs install, activates only on
//! success, keeps the previous worker in control when install fails, and
//! routes requests to the active worker.

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::CacheStorage;
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::lifecycle::{self, ActivateReport, FetchOutcome, InstallReport};
use crate::models::{Request, Response};
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; never activated.
    Redundant,
}

pub struct ServiceWorker {
    config: CacheConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: WorkerState,
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("version", &self.config.version)
            .field("state", &self.state)
            .finish()
    }
}

impl ServiceWorker {
    pub fn new(
        config: CacheConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
            state: WorkerState::Parsed,
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub async fn install(&mut self) -> CacheResult<InstallReport> {
        self.state = WorkerState::Installing;
        match lifecycle::install(&self.config, self.storage.as_ref(), self.network.as_ref()).await {
            Ok(report) => {
                self.state = WorkerState::Installed;
                Ok(report)
            }
            Err(e) => {
                self.state = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    pub async fn activate(&mut self) -> CacheResult<ActivateReport> {
        self.state = WorkerState::Activating;
        let report = lifecycle::activate(&self.config, self.storage.as_ref()).await?;
        self.state = WorkerState::Activated;
        Ok(report)
    }

    pub async fn handle_fetch(&self, request: &Request) -> CacheResult<FetchOutcome> {
        lifecycle::handle_fetch(
            &self.config,
            self.storage.as_ref(),
            self.network.as_ref(),
            request,
        )
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

/// A response delivered by the host, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub response: Response,
    pub source: ResponseSource,
    /// Whether the active worker took the request
    pub intercepted: bool,
}

/// Outcome of registering a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub install: InstallReport,
    pub activate: ActivateReport,
}

pub struct WorkerHost {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    active: RwLock<Option<ServiceWorker>>,
}

impl WorkerHost {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            storage,
            network,
            active: RwLock::new(None),
        }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub async fn active_version(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|w| w.version().to_string())
    }

    /// Install a worker for `config` and, if that succeeds, activate it in
    /// place of the current one.
    pub async fn register(&self, config: CacheConfig) -> CacheResult<Registration> {
        config.validate()?;
        let mut worker = ServiceWorker::new(config, self.storage.clone(), self.network.clone());
        info!(version = worker.version(), "Registering worker");

        let install = match worker.install().await {
            Ok(report) => report,
            Err(e) => {
                let current = self.active_version().await;
                warn!(
                    version = worker.version(),
                    active = ?current,
                    "Install failed, keeping current worker"
                );
                return Err(e);
            }
        };

        // Hold the slot so no request reaches a half-activated worker
        let mut active = self.active.write().await;
        let activate = worker.activate().await?;
        if let Some(previous) = active.replace(worker) {
            info!(version = previous.version(), "Previous worker retired");
        }

        Ok(Registration { install, activate })
    }

    /// Put an already installed version back in control without
    /// reinstalling, as after a host restart. Returns false if its bucket
    /// does not exist; the active worker, if any, is then left unchanged.
    pub async fn resume(&self, config: CacheConfig) -> CacheResult<bool> {
        config.validate()?;
        let installed = self
            .storage
            .keys()
            .await?
            .iter()
            .any(|name| *name == config.version);
        if !installed {
            return Ok(false);
        }

        let mut worker = ServiceWorker::new(config, self.storage.clone(), self.network.clone());
        worker.state = WorkerState::Activated;
        debug!(version = worker.version(), "Resumed worker");
        *self.active.write().await = Some(worker);
        Ok(true)
    }

    /// Route a request through the active worker, falling back to the
    /// host's own network path when it is not intercepted.
    pub async fn dispatch(&self, request: &Request) -> CacheResult<Dispatched> {
        let outcome = match self.active.read().await.as_ref() {
            Some(worker) => worker.handle_fetch(request).await?,
            None => FetchOutcome::Passthrough,
        };

        Ok(match outcome {
            FetchOutcome::Cached(response) => Dispatched {
                response,
                source: ResponseSource::Cache,
                intercepted: true,
            },
            FetchOutcome::Network(response) => Dispatched {
                response,
                source: ResponseSource::Network,
                intercepted: true,
            },
            FetchOutcome::Passthrough => Dispatched {
                response: self.network.fetch(request).await?,
                source: ResponseSource::Network,
                intercepted: false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    use crate::cache::MemoryStorage;
    use crate::lifecycle::tests::FakeNetwork;
    use crate::models::{Method, ResponseType};

    fn config(version: &str) -> CacheConfig {
        CacheConfig::default().with_version(version)
    }

    fn host(network: Arc<FakeNetwork>) -> (WorkerHost, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (WorkerHost::new(storage.clone(), network), storage)
    }

    #[tokio::test]
    async fn test_register_installs_and_activates() {
        let v2 = config("joseph-planner-v2");
        let network = Arc::new(FakeNetwork::serving(&v2));
        let (host, storage) = host(network);

        let registration = host.register(v2).await.unwrap();
        assert_eq!(registration.install.cached, 6);
        assert_eq!(host.active_version().await.as_deref(), Some("joseph-planner-v2"));
        assert_eq!(storage.keys().await.unwrap(), vec!["joseph-planner-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_worker() {
        let v1 = config("joseph-planner-v1");
        let network = Arc::new(FakeNetwork::serving(&v1));
        let (host, storage) = host(network.clone());
        host.register(v1.clone()).await.unwrap();

        network.remove("http://localhost:8080/icons/icon-512x512.png");
        assert!(host.register(config("joseph-planner-v2")).await.is_err());

        assert_eq!(host.active_version().await.as_deref(), Some("joseph-planner-v1"));
        assert_eq!(storage.keys().await.unwrap(), vec!["joseph-planner-v1".to_string()]);
        assert_eq!(storage.entries("joseph-planner-v1").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_upgrade_replaces_worker_and_bucket() {
        let v1 = config("joseph-planner-v1");
        let network = Arc::new(FakeNetwork::serving(&v1));
        let (host, storage) = host(network);

        host.register(v1).await.unwrap();
        let registration = host.register(config("joseph-planner-v2")).await.unwrap();

        assert_eq!(registration.activate.deleted, vec!["joseph-planner-v1".to_string()]);
        assert_eq!(host.active_version().await.as_deref(), Some("joseph-planner-v2"));
        assert_eq!(storage.entries("joseph-planner-v2").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_dispatch_serves_from_cache() {
        let v2 = config("joseph-planner-v2");
        let network = Arc::new(FakeNetwork::serving(&v2));
        let (host, _storage) = host(network.clone());
        host.register(v2.clone()).await.unwrap();
        let calls = network.calls();

        let request = Request::get(v2.resolve("/manifest.json").unwrap());
        let dispatched = host.dispatch(&request).await.unwrap();

        assert_eq!(dispatched.source, ResponseSource::Cache);
        assert!(dispatched.intercepted);
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_dispatch_post_uses_default_network_path() {
        let v2 = config("joseph-planner-v2");
        let network = Arc::new(FakeNetwork::serving(&v2));
        let save = "http://localhost:8080/api/save";
        network.set(save, Response::new(save, 201, ResponseType::Basic));
        let (host, _storage) = host(network.clone());
        host.register(v2).await.unwrap();

        let request = Request::new(Method::Post, Url::parse(save).unwrap());
        let dispatched = host.dispatch(&request).await.unwrap();

        assert!(!dispatched.intercepted);
        assert_eq!(dispatched.source, ResponseSource::Network);
        assert_eq!(dispatched.response.status, 201);
    }

    #[tokio::test]
    async fn test_dispatch_without_active_worker_goes_to_network() {
        let v2 = config("joseph-planner-v2");
        let network = Arc::new(FakeNetwork::serving(&v2));
        let (host, _storage) = host(network.clone());

        let request = Request::get(v2.resolve("/index.html").unwrap());
        let dispatched = host.dispatch(&request).await.unwrap();

        assert!(!dispatched.intercepted);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_resume_installed_version_serves_cache() {
        let v2 = config("joseph-planner-v2");
        let network = Arc::new(FakeNetwork::serving(&v2));
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        WorkerHost::new(storage.clone(), network.clone())
            .register(v2.clone())
            .await
            .unwrap();

        // A fresh host over the same storage
        let offline = Arc::new(FakeNetwork::default());
        let host = WorkerHost::new(storage, offline.clone());
        assert!(host.resume(v2.clone()).await.unwrap());

        let request = Request::get(v2.resolve("/index.html").unwrap());
        let dispatched = host.dispatch(&request).await.unwrap();
        assert_eq!(dispatched.source, ResponseSource::Cache);
        assert_eq!(offline.calls(), 0);
    }

    #[tokio::test]
    async fn test_resume_unknown_version() {
        let network = Arc::new(FakeNetwork::default());
        let (host, _storage) = host(network);
        assert!(!host.resume(config("joseph-planner-v7")).await.unwrap());
        assert_eq!(host.active_version().await, None);
    }

    #[tokio::test]
    async fn test_resume_unknown_version_keeps_active_worker() {
        let v1 = config("joseph-planner-v1");
        let network = Arc::new(FakeNetwork::serving(&v1));
        let (host, _storage) = host(network);
        host.register(v1).await.unwrap();

        assert!(!host.resume(config("joseph-planner-v7")).await.unwrap());
        assert_eq!(host.active_version().await.as_deref(), Some("joseph-planner-v1"));
    }

    #[tokio::test]
    async fn test_worker_state_transitions() {
        let v2 = config("joseph-planner-v2");
        let network: Arc<dyn Network> = Arc::new(FakeNetwork::serving(&v2));
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());

        let mut worker = ServiceWorker::new(v2.clone(), storage.clone(), network);
        assert_eq!(worker.state(), WorkerState::Parsed);
        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Installed);
        worker.activate().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);

        let offline: Arc<dyn Network> = Arc::new(FakeNetwork::default());
        let mut broken = ServiceWorker::new(v2.with_version("joseph-planner-v3"), storage, offline);
        assert!(broken.install().await.is_err());
        assert_eq!(broken.state(), WorkerState::Redundant);
    }
}
