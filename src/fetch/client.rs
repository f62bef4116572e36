//! HTTP fetcher with per-attempt timeouts and linear backoff.

use super::retry::with_backoff;
use super::{FetchError, Fetcher, TempArtifact};
use crate::config::FetchConfig;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// `reqwest`-backed [`Fetcher`].
///
/// Every request is bounded by [`FetchConfig::attempt_timeout`]; failures
/// other than 404 and integrity errors are retried with linear backoff.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.attempt_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, config })
    }

    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetchConfig::default())
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn send(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn read_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.send(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }

    async fn download_once(&self, url: &str) -> Result<TempArtifact, FetchError> {
        let io_error = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };

        let response = self.send(url).await?;
        let declared = response.content_length();
        if declared == Some(0) {
            return Err(FetchError::Integrity {
                url: url.to_string(),
                expected: 0,
                received: 0,
            });
        }

        let temp = NamedTempFile::new().map_err(io_error)?;
        let mut file = tokio::fs::File::from_std(temp.reopen().map_err(io_error)?);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            // A body cut short of the declared length is an integrity
            // failure, not a transient one.
            let chunk = chunk.map_err(|source| match declared {
                Some(expected) => FetchError::Integrity {
                    url: url.to_string(),
                    expected,
                    received: written,
                },
                None => FetchError::Transport {
                    url: url.to_string(),
                    source,
                },
            })?;
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;
        drop(file);

        // `temp` is removed on drop if the sizes disagree
        if let Some(expected) = declared {
            if expected != written {
                return Err(FetchError::Integrity {
                    url: url.to_string(),
                    expected,
                    received: written,
                });
            }
        }

        debug!(url, bytes = written, "Downloaded to temporary file");
        Ok(TempArtifact::new(temp, url.to_string(), written))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        with_backoff(&self.config, url, || self.read_once(url)).await
    }

    #[instrument(skip(self))]
    async fn fetch_to_temp(&self, url: &str) -> Result<TempArtifact, FetchError> {
        with_backoff(&self.config, url, || self.download_once(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn fast_fetcher() -> HttpFetcher {
        HttpFetcher::new(FetchConfig::default().with_backoff(Duration::from_millis(10), 2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_bytes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/index.json");
                then.status(200).body("{\"ok\":true}");
            })
            .await;

        let body = fast_fetcher().fetch_bytes(&server.url("/index.json")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_fetch_to_temp() {
        let server = MockServer::start_async().await;
        let content = b"PK archive bytes";
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive/v1.0.0.zip");
                then.status(200).body(content);
            })
            .await;

        let artifact = fast_fetcher()
            .fetch_to_temp(&server.url("/archive/v1.0.0.zip"))
            .await
            .unwrap();

        assert_eq!(artifact.size_bytes(), content.len() as u64);
        assert_eq!(std::fs::read(artifact.path()).unwrap(), content);

        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/archive/v9.9.9.zip");
                then.status(404);
            })
            .await;

        let error = fast_fetcher()
            .fetch_to_temp(&server.url("/archive/v9.9.9.zip"))
            .await
            .unwrap_err();

        assert!(error.is_not_found());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_budget_exhausted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky");
                then.status(500);
            })
            .await;

        let error = fast_fetcher().fetch_bytes(&server.url("/flaky")).await.unwrap_err();

        assert!(matches!(error, FetchError::Status { status: 500, .. }));
        // first attempt plus two backoff steps
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_truncated_body_is_integrity_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        // Declares 100 bytes, sends 10, then closes the connection
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let server_hits = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                server_hits.fetch_add(1, Ordering::SeqCst);

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }

                socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n0123456789")
                    .await
                    .unwrap();
                socket.flush().await.unwrap();
                drop(socket);
            }
        });

        let error = fast_fetcher()
            .fetch_to_temp(&format!("http://{addr}/archive/v1.0.0.zip"))
            .await
            .unwrap_err();

        assert!(
            matches!(error, FetchError::Integrity { expected: 100, .. }),
            "{error:?}"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_declared_length_is_integrity_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/empty.zip");
                then.status(200).body("");
            })
            .await;

        let error = fast_fetcher()
            .fetch_to_temp(&server.url("/empty.zip"))
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::Integrity { expected: 0, .. }));
        mock.assert_hits_async(1).await;
    }
}
