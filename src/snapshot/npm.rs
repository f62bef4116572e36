//! npm `package.json` reading and normalization.

use crate::traits::{EcosystemManifest, ManifestError, ManifestInfo};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static VERSION_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_\-]+\.)?([A-Za-z0-9_\-]+\.)?([A-Za-z0-9_\-]+)$")
        .expect("version pattern is valid")
});

const GITHUB_PREFIX: &str = "https://github.com/";

/// Returns whether the string looks like a legitimate version number:
/// one to three dot-separated segments of word characters and hyphens,
/// e.g. `1.0.0`, `1.0.0-rc4`.
pub fn looks_like_version(version: &str) -> bool {
    VERSION_SHAPE.is_match(version)
}

/// Normalizes a repository URL to `https://github.com/<org>/<repo>/`.
///
/// Accepts `https://`, `git://` and `git+https://` GitHub URLs with or
/// without a trailing `.git`. Returns an empty string for anything else.
pub fn normalize_source_link(url: &str) -> String {
    let url = url.trim();
    let url = url.strip_suffix(".git").unwrap_or(url);

    let rest = if let Some(rest) = url.strip_prefix(GITHUB_PREFIX) {
        rest
    } else if let Some(rest) = url.strip_prefix("git://github.com/") {
        rest
    } else if let Some(rest) = url.strip_prefix("git+https://github.com/") {
        rest
    } else {
        return String::new();
    };

    let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
    match segments.as_slice() {
        [org, repo] if !org.is_empty() && !repo.is_empty() => {
            format!("{GITHUB_PREFIX}{org}/{repo}/")
        }
        _ => String::new(),
    }
}

/// Whether `link` is already in the canonical form produced by
/// [`normalize_source_link`].
pub fn is_normalized_source_link(link: &str) -> bool {
    !link.is_empty() && normalize_source_link(link) == link
}

/// Manifest reader for npm packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmManifest;

impl NpmManifest {
    fn repository_url(manifest: &Value) -> Option<&str> {
        match manifest.get("repository")? {
            Value::String(url) => Some(url),
            Value::Object(repo) => repo.get("url")?.as_str(),
            _ => None,
        }
    }
}

impl EcosystemManifest for NpmManifest {
    fn ecosystem_id(&self) -> &str {
        "npm"
    }

    fn manifest_file(&self) -> &str {
        "package.json"
    }

    fn dependency_dir(&self) -> &str {
        "node_modules"
    }

    fn parse(&self, content: &[u8]) -> Result<ManifestInfo, ManifestError> {
        let manifest: Value = serde_json::from_slice(content)
            .map_err(|e| ManifestError::InvalidContent(e.to_string()))?;

        let name = manifest
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingName)?;

        let version = manifest
            .get("version")
            .and_then(Value::as_str)
            .filter(|v| looks_like_version(v))
            .ok_or(ManifestError::MissingVersion)?;

        let source_link = Self::repository_url(&manifest)
            .map(normalize_source_link)
            .unwrap_or_default();

        Ok(ManifestInfo {
            name: name.to_string(),
            version: version.to_string(),
            source_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_version() {
        assert!(looks_like_version("1.0.0"));
        assert!(looks_like_version("1.0.0-rc4"));
        assert!(looks_like_version("2.1"));
        assert!(looks_like_version("7"));
        assert!(!looks_like_version("not a version!"));
        assert!(!looks_like_version("1.2.3.4"));
        assert!(!looks_like_version(""));
        assert!(!looks_like_version("1..2"));
    }

    #[test]
    fn test_normalize_source_link_forms() {
        let expected = "https://github.com/blockchain/my-wallet-v3/";
        assert_eq!(normalize_source_link("https://github.com/blockchain/my-wallet-v3.git"), expected);
        assert_eq!(normalize_source_link("git://github.com/blockchain/my-wallet-v3.git"), expected);
        assert_eq!(normalize_source_link("git+https://github.com/blockchain/my-wallet-v3.git"), expected);
        assert_eq!(normalize_source_link("https://github.com/blockchain/my-wallet-v3"), expected);
    }

    #[test]
    fn test_normalize_source_link_rejects_other_forms() {
        assert_eq!(normalize_source_link("https://gitlab.com/org/repo.git"), "");
        assert_eq!(normalize_source_link("git@github.com:org/repo.git"), "");
        assert_eq!(normalize_source_link("https://github.com/org"), "");
        assert_eq!(normalize_source_link("github:org/repo"), "");
    }

    #[test]
    fn test_is_normalized_source_link() {
        assert!(is_normalized_source_link("https://github.com/org/repo/"));
        assert!(!is_normalized_source_link("https://github.com/org/repo"));
        assert!(!is_normalized_source_link(""));
    }

    #[test]
    fn test_npm_layout() {
        assert_eq!(NpmManifest.ecosystem_id(), "npm");
        assert_eq!(NpmManifest.manifest_file(), "package.json");
        assert_eq!(NpmManifest.dependency_dir(), "node_modules");
    }

    #[test]
    fn test_parse_manifest() {
        let content = br#"{
            "name": "bigi",
            "version": "1.4.1",
            "repository": { "type": "git", "url": "https://github.com/cryptocoinjs/bigi.git" }
        }"#;

        let info = NpmManifest.parse(content).unwrap();
        assert_eq!(info.name, "bigi");
        assert_eq!(info.version, "1.4.1");
        assert_eq!(info.source_link, "https://github.com/cryptocoinjs/bigi/");
    }

    #[test]
    fn test_parse_manifest_string_repository() {
        let content = br#"{"name": "x", "version": "0.1.0", "repository": "git://github.com/a/b.git"}"#;
        assert_eq!(NpmManifest.parse(content).unwrap().source_link, "https://github.com/a/b/");
    }

    #[test]
    fn test_parse_manifest_without_repository() {
        let info = NpmManifest.parse(br#"{"name": "x", "version": "0.1.0"}"#).unwrap();
        assert_eq!(info.source_link, "");
    }

    #[test]
    fn test_parse_manifest_errors() {
        assert!(matches!(
            NpmManifest.parse(br#"{"version": "1.0.0"}"#),
            Err(ManifestError::MissingName)
        ));
        assert!(matches!(
            NpmManifest.parse(br#"{"name": "x", "version": "latest and greatest"}"#),
            Err(ManifestError::MissingVersion)
        ));
        assert!(matches!(
            NpmManifest.parse(b"{ not json"),
            Err(ManifestError::InvalidContent(_))
        ));
    }
}
