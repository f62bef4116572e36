//! Download URL candidates for tagged source archives.

use crate::snapshot::npm::{is_normalized_source_link, looks_like_version};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CandidateError {
    #[error("'{0}' is not a normalized GitHub project URL")]
    InvalidSourceLink(String),
    #[error("'{0}' does not look like a version")]
    InvalidVersion(String),
}

/// Likely `.zip` archive URLs for `version` of the project at `source_link`,
/// in the order they should be tried.
///
/// Projects tag releases either as `v1.2.3` or `1.2.3`, so both are
/// produced, `v`-prefixed first:
///
/// ```
/// use npm_verify::fetch::candidates;
///
/// let urls = candidates("https://github.com/org/repo/", "1.2.3").unwrap();
/// assert_eq!(urls, vec![
///     "https://github.com/org/repo/archive/v1.2.3.zip",
///     "https://github.com/org/repo/archive/1.2.3.zip",
/// ]);
/// ```
///
/// # Errors
///
/// Callers are expected to check their inputs first; a link that is not
/// in normalized form or a version that is not version-shaped is rejected.
pub fn candidates(source_link: &str, version: &str) -> Result<Vec<String>, CandidateError> {
    if !is_normalized_source_link(source_link) {
        return Err(CandidateError::InvalidSourceLink(source_link.to_string()));
    }
    if !looks_like_version(version) {
        return Err(CandidateError::InvalidVersion(version.to_string()));
    }

    let project = source_link.trim_end_matches('/');
    Ok(vec![
        format!("{project}/archive/v{version}.zip"),
        format!("{project}/archive/{version}.zip"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_order() {
        let urls = candidates("https://github.com/cryptocoinjs/bigi/", "1.4.1").unwrap();
        assert_eq!(
            urls,
            vec![
                "https://github.com/cryptocoinjs/bigi/archive/v1.4.1.zip",
                "https://github.com/cryptocoinjs/bigi/archive/1.4.1.zip",
            ]
        );
    }

    #[test]
    fn test_candidates_reject_bad_input() {
        assert_eq!(
            candidates("https://gitlab.com/org/repo/", "1.0.0"),
            Err(CandidateError::InvalidSourceLink("https://gitlab.com/org/repo/".to_string()))
        );
        assert_eq!(
            candidates("https://github.com/org/repo/", "not a version!"),
            Err(CandidateError::InvalidVersion("not a version!".to_string()))
        );
    }
}
