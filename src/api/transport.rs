//! HTTP transport boundary
//!
//! The client builds fully-formed [`HttpRequest`]s; a [`Transport`] only sends
//! them and hands back status, headers, and raw body.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::error::{QuickbooksError, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to be signed and sent. Query parameters are kept apart
/// from the URL because the OAuth signature covers them individually.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// URL with the percent-encoded query string appended
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }

        let query = self
            .query
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.url, query)
    }
}

/// Raw response of one HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP exchange, bounded by `timeout`
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration, user_agent: &str) -> Result<Self, QuickbooksError> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| QuickbooksError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(timeout)
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Other(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.http_client.get(&request.url),
            Method::Post => self.http_client.post(&request.url),
        };

        builder = builder.query(&request.query).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| Self::classify(e, timeout))?;

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(name.to_string(), value_str.to_string());
            }
        }

        let body = response.text().await.map_err(|e| Self::classify(e, timeout))?;

        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_encodes_query() {
        let request = HttpRequest::get("https://example.com/company/1/query")
            .query("query", "select * from Customer where Name = 'A B'");

        assert_eq!(
            request.full_url(),
            "https://example.com/company/1/query?query=select%20%2A%20from%20Customer%20where%20Name%20%3D%20%27A%20B%27"
        );
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest::post("https://example.com").header("Content-Type", "text/xml");
        assert_eq!(request.header_value("content-type"), Some("text/xml"));
        assert_eq!(request.header_value("Accept"), None);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = ReqwestTransport::new(Duration::from_millis(200), "qb-test").unwrap();
        let result = transport
            .send(HttpRequest::get("http://127.0.0.1:1/unreachable"), Duration::from_millis(500))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // accept and hold the connection without answering
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let transport = ReqwestTransport::new(Duration::from_secs(1), "qb-test").unwrap();
        let timeout = Duration::from_millis(200);
        let result = transport
            .send(HttpRequest::get(format!("http://{}/company/1/query", address)), timeout)
            .await;

        match result {
            Err(TransportError::Timeout(elapsed)) => assert_eq!(elapsed, timeout),
            other => panic!("expected timeout, got {:?}", other),
        }
        server.abort();
    }
}
