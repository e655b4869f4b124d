//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;
use url::{Origin, Url};

use super::Network;
use crate::error::NetworkError;
use crate::models::{Method, Request, Response, ResponseType};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
    origin: Origin,
}

impl HttpNetwork {
    /// Create a transport whose same-origin checks are made against `origin`
    pub fn new(origin: &Url) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|source| NetworkError::Request {
                url: origin.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            origin: origin.origin(),
        })
    }

    fn to_reqwest_method(method: &Method) -> Result<reqwest::Method, NetworkError> {
        reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|_| NetworkError::UnsupportedMethod(method.to_string()))
    }

    /// Same origin is basic; cross-origin is readable only when the server
    /// opts in with Access-Control-Allow-Origin.
    fn classify(&self, url: &Url, headers: &header::HeaderMap) -> ResponseType {
        if url.origin() == self.origin {
            ResponseType::Basic
        } else if headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN) {
            ResponseType::Cors
        } else {
            ResponseType::Opaque
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let url = request.url.as_str();
        let method = Self::to_reqwest_method(&request.method)?;

        let response = self
            .client
            .request(method, request.url.clone())
            .header(header::ORIGIN, self.origin.ascii_serialization())
            .send()
            .await
            .map_err(|source| NetworkError::Request {
                url: url.to_string(),
                source,
            })?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let response_type = self.classify(&final_url, response.headers());
        debug!(url = url, status = status, kind = ?response_type, "Network response");

        if response_type == ResponseType::Opaque {
            return Ok(Response::opaque(final_url.as_str()));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|source| NetworkError::Request {
                url: url.to_string(),
                source,
            })?;

        Ok(Response {
            url: final_url.to_string(),
            status,
            response_type,
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn network() -> HttpNetwork {
        HttpNetwork::new(&Url::parse("https://planner.example/").unwrap()).unwrap()
    }

    #[test]
    fn test_classify_same_origin_is_basic() {
        let url = Url::parse("https://planner.example/index.html").unwrap();
        assert_eq!(
            network().classify(&url, &header::HeaderMap::new()),
            ResponseType::Basic
        );
    }

    #[test]
    fn test_classify_cross_origin_without_cors_is_opaque() {
        let url = Url::parse("https://cdnjs.cloudflare.com/all.min.css").unwrap();
        assert_eq!(
            network().classify(&url, &header::HeaderMap::new()),
            ResponseType::Opaque
        );
    }

    #[test]
    fn test_classify_cross_origin_with_cors() {
        let url = Url::parse("https://cdnjs.cloudflare.com/all.min.css").unwrap();
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header::HeaderValue::from_static("*"),
        );
        assert_eq!(network().classify(&url, &headers), ResponseType::Cors);
    }

    #[test]
    fn test_different_port_is_cross_origin() {
        let url = Url::parse("https://planner.example:8443/index.html").unwrap();
        assert_eq!(
            network().classify(&url, &header::HeaderMap::new()),
            ResponseType::Opaque
        );
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(
            HttpNetwork::to_reqwest_method(&Method::Post).unwrap(),
            reqwest::Method::POST
        );
        assert!(HttpNetwork::to_reqwest_method(&Method::Other("BAD METHOD".to_string())).is_err());
    }

    fn network_for(server: &MockServer) -> HttpNetwork {
        HttpNetwork::new(&Url::parse(&server.uri()).unwrap()).unwrap()
    }

    fn get(server: &MockServer, route: &str) -> Request {
        Request::get(Url::parse(&format!("{}{}", server.uri(), route)).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_same_origin_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>planner</html>"),
            )
            .mount(&server)
            .await;

        let response = network_for(&server)
            .fetch(&get(&server, "/index.html"))
            .await
            .unwrap();

        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"<html>planner</html>");
        assert_eq!(response.header("Content-Type"), Some("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.html"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let response = network_for(&server)
            .fetch(&get(&server, "/missing.html"))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.body, b"missing");
    }

    #[tokio::test]
    async fn test_fetch_cross_origin_with_cors_is_readable() {
        let app = MockServer::start().await;
        let cdn = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/all.min.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("access-control-allow-origin", "*")
                    .set_body_string("body{}"),
            )
            .mount(&cdn)
            .await;

        let response = network_for(&app)
            .fetch(&get(&cdn, "/all.min.css"))
            .await
            .unwrap();

        assert_eq!(response.response_type, ResponseType::Cors);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"body{}");
    }

    #[tokio::test]
    async fn test_fetch_cross_origin_without_cors_is_opaque() {
        let app = MockServer::start().await;
        let cdn = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fa-solid-900.woff2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "font/woff2")
                    .set_body_bytes(vec![0x77, 0x4f, 0x46, 0x32]),
            )
            .mount(&cdn)
            .await;

        let response = network_for(&app)
            .fetch(&get(&cdn, "/fa-solid-900.woff2"))
            .await
            .unwrap();

        assert!(response.is_opaque());
        assert_eq!(response.status, 0);
        assert!(response.body.is_empty());
        assert!(response.headers.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect_and_reports_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/index.html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("home"))
            .mount(&server)
            .await;

        let response = network_for(&server).fetch(&get(&server, "/")).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(response.url.ends_with("/index.html"));
        assert_eq!(response.body, b"home");
    }

    #[tokio::test]
    async fn test_fetch_sends_request_method() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/save"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/api/save", server.uri())).unwrap();
        let response = network_for(&server)
            .fetch(&Request::new(Method::Post, url))
            .await
            .unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Grab a free port, then close it so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let origin = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let network = HttpNetwork::new(&origin).unwrap();

        let err = network
            .fetch(&Request::get(origin.join("/index.html").unwrap()))
            .await
            .unwrap_err();

        match err {
            NetworkError::Request { url, .. } => {
                assert_eq!(url, format!("http://127.0.0.1:{}/index.html", port))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
