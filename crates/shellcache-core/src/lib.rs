//! shellcache core - a versioned offline asset cache.
//!
//! This crate owns the caching policy for an offline-capable web app shell:
//! pre-cache a fixed asset list on install, drop buckets from older versions
//! on activation, and answer GET requests cache-first with network fallback.
//!
//! The policy lives in [`lifecycle`] as plain async functions that take the
//! configuration, the cache storage, and the network as arguments. The
//! [`worker`] module wires them into a host that sequences the lifecycle.

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod network;
pub mod worker;

pub use cache::{CacheStorage, CachedData, DiskStorage, MemoryStorage};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, NetworkError};
pub use lifecycle::{activate, handle_fetch, install, ActivateReport, FetchOutcome, InstallReport};
pub use models::{Method, Request, Response, ResponseType};
pub use network::{HttpNetwork, Network};
pub use worker::{
    Dispatched, Registration, ResponseSource, ServiceWorker, WorkerHost, WorkerState,
};
