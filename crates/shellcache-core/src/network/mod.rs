//! Network transport used on cache misses and during install.
//!
//! `HttpNetwork` issues real requests through reqwest; tests substitute
//! their own `Network` implementations.

pub mod http;

pub use http::HttpNetwork;

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::models::{Request, Response};

#[async_trait]
pub trait Network: Send + Sync {
    /// Issue a request and return whatever the server answered.
    /// Non-2xx statuses are responses, not errors.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}
