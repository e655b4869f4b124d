use serde::{Deserialize, Serialize};

/// How much of a response the intercepting code is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    Basic,
    /// Cross-origin response the origin server allowed us to read.
    Cors,
    /// Cross-origin response whose status and body are hidden.
    Opaque,
    /// Network error surfaced as a response.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    // Kept out of the index; the disk backend stores bodies as blobs.
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, response_type: ResponseType) -> Self {
        Self {
            url: url.into(),
            status,
            response_type,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// An opaque response: status 0, no headers, no body.
    pub fn opaque(url: impl Into<String>) -> Self {
        Self::new(url, 0, ResponseType::Opaque)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_opaque(&self) -> bool {
        self.response_type == ResponseType::Opaque
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
