//! HTTP Client Abstraction
//!
//! Minimal async HTTP surface used by the HTTP remote and the OAuth refresh
//! grant. Hosts inject the concrete client; tests inject mocks.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add an `Authorization: Bearer` header
    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Set an `application/x-www-form-urlencoded` body
    pub fn form(self, encoded: impl Into<String>) -> Self {
        self.header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded.into()))
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// HTTP client trait
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status; transport failures (DNS, TLS, timeouts) are errors.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::new(HttpMethod::Put, "https://example.com/a.json")
            .header("User-Agent", "test")
            .bearer_token("secret")
            .body(Bytes::from_static(b"{}"))
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com/a.json");
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer secret".to_string())
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_form_body_sets_content_type() {
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/token")
            .form("grant_type=refresh_token");

        assert_eq!(
            request.headers.get("Content-Type"),
            Some(&"application/x-www-form-urlencoded".to_string())
        );
        assert_eq!(request.body, Some(Bytes::from("grant_type=refresh_token")));
    }

    #[test]
    fn test_http_response_status_checks() {
        let response = HttpResponse {
            status: 404,
            headers: HashMap::new(),
            body: Bytes::from("missing"),
        };

        assert!(!response.is_success());
        assert!(response.is_client_error());
        assert_eq!(response.text().unwrap(), "missing");
    }
}
