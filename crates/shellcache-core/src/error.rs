//! Error types for shellcache.
//!
//! Cache and lifecycle operations return `CacheResult<T>`; transport
//! failures are reported as `NetworkError` and wrapped by `CacheError`.

use thiserror::Error;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to populate cache with {url}: {reason}")]
    Population { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid bucket name: {0:?}")]
    InvalidBucket(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CacheError::Io {
            context: context.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY_LENGTH {
        text.into_owned()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &text[..end], body.len())
    }
}
