//! Named cache buckets for offline asset access.
//!
//! A bucket maps a request's cache key to a stored response. One bucket per
//! deployed version; stale buckets live only until the next activation.
//!
//! Backends:
//! - `MemoryStorage`: in-process, for tests and embedders
//! - `DiskStorage`: one directory per bucket with an atomically replaced index

pub mod cached;
pub mod disk;
pub mod memory;
pub mod storage;

pub use cached::CachedData;
pub use disk::DiskStorage;
pub use memory::MemoryStorage;
pub use storage::CacheStorage;
