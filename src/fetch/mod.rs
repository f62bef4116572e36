//! Fetch module - resilient retrieval of upstream source archives.
//!
//! - **Candidates**: ordered archive URLs for a project and version via
//!   [`candidates`]
//! - **Retry**: linear backoff state machine shared by every request
//! - **Client**: [`HttpFetcher`], the `reqwest`-backed [`Fetcher`]

pub mod candidates;
pub mod client;
pub(crate) mod retry;

pub use candidates::{candidates, CandidateError};
pub use client::HttpFetcher;

use async_trait::async_trait;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP 404; never retried so the caller can try the next candidate
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// Any other unsuccessful HTTP status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, TLS, timeout or body read failure
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Declared and received sizes disagree, or zero bytes were declared
    #[error("Incomplete download for {url}: expected {expected} bytes, received {received}")]
    Integrity {
        url: String,
        expected: u64,
        received: u64,
    },

    /// Failed to create or write the temporary artifact
    #[error("I/O error while downloading {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Transport { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A completed download stored in a temporary file.
///
/// The file is removed when the artifact is dropped.
#[derive(Debug)]
pub struct TempArtifact {
    file: NamedTempFile,
    url: String,
    size_bytes: u64,
}

impl TempArtifact {
    pub(crate) fn new(file: NamedTempFile, url: String, size_bytes: u64) -> Self {
        Self {
            file,
            url,
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Retrieves remote content with bounded retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the full response body into memory.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Streams the response body into a temporary file.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Integrity`] if the declared content length is
    /// zero or does not match the number of bytes written; no artifact is
    /// left behind in that case.
    async fn fetch_to_temp(&self, url: &str) -> Result<TempArtifact, FetchError>;
}
