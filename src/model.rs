use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time record of one installed package and its nested dependencies.
///
/// Field names on the wire match the JSON layout earlier releases of the
/// checker wrote, so old baselines still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    #[serde(rename = "package_location")]
    pub location: String,

    #[serde(rename = "package_name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "package_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    // Empty when no GitHub project could be determined
    #[serde(rename = "github_location", default)]
    pub source_link: String,

    // `None` (absent) and `Some(vec![])` (nothing digested) are distinct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileRecord>>,

    #[serde(rename = "submodules", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PackageSnapshot>,
}

impl PackageSnapshot {
    /// Name when declared, location otherwise. Used in user-facing messages.
    pub fn name_or_location(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.location)
    }

    pub fn has_source_link(&self) -> bool {
        !self.source_link.is_empty()
    }

    /// Files collected for this node, treating "absent" as empty.
    pub fn file_records(&self) -> &[FileRecord] {
        self.files.as_deref().unwrap_or(&[])
    }

    /// Pre-order iterator over this node and all of its descendants.
    pub fn iter(&self) -> SnapshotIter<'_> {
        SnapshotIter { stack: vec![self] }
    }
}

pub struct SnapshotIter<'a> {
    stack: Vec<&'a PackageSnapshot>,
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = &'a PackageSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "file_location")]
    pub location: String, // relative to the package root, `/`-separated
    #[serde(rename = "file_hash")]
    pub digest: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscrepancyKind {
    NameChanged,
    VersionChanged,
    FilesAppeared,
    FilesMissing,
    FileHashChanged,
    FileVanished,
    SourceLinkAppeared,
    SourceLinkRemoved,
    SourceLinkChanged,
    SubmoduleAppeared,
    SubmoduleMissing,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameChanged => "name-changed",
            Self::VersionChanged => "version-changed",
            Self::FilesAppeared => "files-appeared",
            Self::FilesMissing => "files-missing",
            Self::FileHashChanged => "file-hash-changed",
            Self::FileVanished => "file-vanished",
            Self::SourceLinkAppeared => "source-link-appeared",
            Self::SourceLinkRemoved => "source-link-removed",
            Self::SourceLinkChanged => "source-link-changed",
            Self::SubmoduleAppeared => "submodule-appeared",
            Self::SubmoduleMissing => "submodule-missing",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single difference found between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub location: String, // package the difference was found in
    pub message: String,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
