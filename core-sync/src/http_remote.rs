//! Plain HTTP object remote.
//!
//! `GET`/`PUT` of `{base_url}/{remote_path}` with a bearer token. Status
//! mapping: `404` on fetch means absent, `401` is reported as
//! [`BridgeError::Remote`] so the transfer client can refresh, anything else
//! outside `2xx` is a failure carrying the status code.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::RemoteStorage;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct HttpRemoteStorage {
    http_client: Arc<dyn HttpClient>,
    base_url: Url,
    request_timeout: Option<Duration>,
}

impl HttpRemoteStorage {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid remote base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BridgeError::OperationFailed(format!(
                "Remote base URL cannot hold paths: {base_url}"
            )));
        }
        Ok(Self {
            http_client,
            base_url,
            request_timeout: None,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Object URL with each path segment percent-encoded.
    pub fn object_url(&self, remote_path: &str) -> Result<String> {
        let segments: Vec<&str> = remote_path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() || segments.iter().any(|s| *s == ".." || *s == ".") {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid remote path: {remote_path}"
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BridgeError::OperationFailed("Remote base URL cannot hold paths".to_string())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn request(&self, method: HttpMethod, url: String, token: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, url);
        if !token.is_empty() {
            request = request.bearer_token(token);
        }
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }
        request
    }
}

fn rejected(response: &HttpResponse) -> BridgeError {
    BridgeError::Remote {
        status: response.status,
        message: response
            .text()
            .unwrap_or_else(|_| "<binary body>".to_string()),
    }
}

#[async_trait]
impl RemoteStorage for HttpRemoteStorage {
    async fn fetch(&self, remote_path: &str, access_token: &str) -> Result<Option<Bytes>> {
        let url = self.object_url(remote_path)?;
        let response = self
            .http_client
            .execute(self.request(HttpMethod::Get, url, access_token))
            .await?;

        match response.status {
            404 => Ok(None),
            _ if response.is_success() => {
                debug!(remote_path, bytes = response.body.len(), "Fetched");
                Ok(Some(response.body))
            }
            _ => Err(rejected(&response)),
        }
    }

    async fn put(&self, remote_path: &str, data: Bytes, access_token: &str) -> Result<()> {
        let url = self.object_url(remote_path)?;
        let request = self
            .request(HttpMethod::Put, url, access_token)
            .header("Content-Type", "application/octet-stream")
            .body(data);
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            debug!(remote_path, status = response.status, "Stored");
            Ok(())
        } else {
            Err(rejected(&response))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &'static [u8]) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let remote = HttpRemoteStorage::new(
            Arc::new(MockHttp::new()),
            "https://files.example.com/me/data/",
        )
        .unwrap();
        assert_eq!(
            remote.object_url("Music/My Song #1.mp3").unwrap(),
            "https://files.example.com/me/data/Music/My%20Song%20%231.mp3"
        );
        assert!(remote.object_url("../secret").is_err());
        assert!(remote.object_url("").is_err());
    }

    #[tokio::test]
    async fn test_fetch_status_mapping() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.headers.get("Authorization").map(String::as_str) == Some("Bearer t")
            })
            .returning(|_| Ok(response(200, b"{}")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(404, b"")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(401, b"expired")));

        let remote = HttpRemoteStorage::new(Arc::new(http), "https://files.example.com/").unwrap();
        assert_eq!(
            remote.fetch("playlists.json", "t").await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );
        assert_eq!(remote.fetch("playlists.json", "t").await.unwrap(), None);
        assert!(remote
            .fetch("playlists.json", "t")
            .await
            .unwrap_err()
            .is_auth_expired());
    }

    #[tokio::test]
    async fn test_put_failure_keeps_status() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .withf(|req| req.method == HttpMethod::Put && req.body.is_some())
            .returning(|_| Ok(response(507, b"full")));

        let remote = HttpRemoteStorage::new(Arc::new(http), "https://files.example.com").unwrap();
        let err = remote
            .put("playlists.json", Bytes::from_static(b"[]"), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Remote { status: 507, .. }));
    }
}
