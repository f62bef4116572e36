use crate::model::PackageSnapshot;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to parse manifest: {0}")]
    InvalidContent(String),
    #[error("Could not parse name field")]
    MissingName,
    #[error("Could not parse version field")]
    MissingVersion,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Identity fields read from a package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    pub name: String,
    pub version: String,
    pub source_link: String, // normalized, or empty
}

/// Ecosystem-specific knowledge needed to walk an installed package tree.
pub trait EcosystemManifest: Send + Sync {
    /// Returns the ecosystem ID this manifest reader handles (e.g., "npm").
    fn ecosystem_id(&self) -> &str;

    /// File name of the manifest inside a package directory.
    fn manifest_file(&self) -> &str;

    /// Directory holding a package's own sub-dependencies.
    fn dependency_dir(&self) -> &str;

    /// Parses raw manifest content into identity fields.
    ///
    /// A manifest without a usable name or version is an error: such a
    /// package is never materialized as a snapshot.
    fn parse(&self, content: &[u8]) -> Result<ManifestInfo, ManifestError>;
}

/// Content fingerprint of a single file.
pub trait FileDigester: Send + Sync {
    fn digest_file(&self, path: &Path) -> std::io::Result<String>;
}

/// Persisted textual form of a snapshot tree.
pub trait SnapshotCodec: Send + Sync {
    fn encode(&self, snapshot: &PackageSnapshot) -> Result<String, CodecError>;
    fn decode(&self, text: &str) -> Result<PackageSnapshot, CodecError>;
}
