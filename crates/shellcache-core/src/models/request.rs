use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Other(m) => m,
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Ok(match upper.as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            _ => Method::Other(upper),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An intercepted request. Transient: used to key a cache lookup or to
/// decide on a network pass-through, never persisted itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    /// Identity of this request inside a bucket.
    /// Only GET requests are ever stored, so the URL alone (minus fragment)
    /// identifies an entry.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(
            "purge".parse::<Method>().unwrap(),
            Method::Other("PURGE".to_string())
        );
    }

    #[test]
    fn test_only_get_is_get() {
        assert!(Method::Get.is_get());
        assert!(!Method::Head.is_get());
        assert!(!Method::Other("GET2".to_string()).is_get());
    }

    #[test]
    fn test_cache_key_drops_fragment() {
        let url = Url::parse("https://planner.example/index.html#today").unwrap();
        let request = Request::get(url);
        assert_eq!(request.cache_key(), "https://planner.example/index.html");
    }

    #[test]
    fn test_cache_key_keeps_query() {
        let url = Url::parse("https://planner.example/index.html?v=2").unwrap();
        assert_eq!(
            Request::get(url).cache_key(),
            "https://planner.example/index.html?v=2"
        );
    }
}
