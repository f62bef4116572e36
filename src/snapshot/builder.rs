//! Recursive snapshot construction for an installed package tree.

use crate::config::ScanOptions;
use crate::model::{FileRecord, PackageSnapshot};
use crate::snapshot::digest::Sha256Digester;
use crate::snapshot::npm::NpmManifest;
use crate::traits::{EcosystemManifest, FileDigester, ManifestError};
use crate::warnings::Warnings;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Walks a package directory and produces a [`PackageSnapshot`] tree.
///
/// The builder never fails hard: unreadable directories, missing or
/// malformed manifests and unreadable files are recorded in [`Warnings`]
/// and the affected subtree is skipped while siblings are still scanned.
#[derive(Clone)]
pub struct SnapshotBuilder {
    manifest: Arc<dyn EcosystemManifest>,
    digester: Arc<dyn FileDigester>,
    options: ScanOptions,
}

impl SnapshotBuilder {
    pub fn new(
        manifest: Arc<dyn EcosystemManifest>,
        digester: Arc<dyn FileDigester>,
        options: ScanOptions,
    ) -> Self {
        Self {
            manifest,
            digester,
            options,
        }
    }

    /// Builder for npm trees with SHA-256 file digests.
    pub fn npm(options: ScanOptions) -> Self {
        Self::new(Arc::new(NpmManifest), Arc::new(Sha256Digester), options)
    }

    /// Builds a snapshot rooted at `dir`, using the path as given for the
    /// root location.
    pub fn build(&self, dir: &Path, warnings: &mut Warnings) -> Option<PackageSnapshot> {
        self.build_at(dir, &dir.display().to_string(), warnings)
    }

    /// Builds a snapshot of `dir`, recording it under `location`.
    ///
    /// Returns `None` (with a warning) when the directory is unreadable,
    /// has no manifest, or its manifest lacks a usable name or version.
    pub fn build_at(
        &self,
        dir: &Path,
        location: &str,
        warnings: &mut Warnings,
    ) -> Option<PackageSnapshot> {
        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warnings.warn(format!("Could not read directory '{location}': {e}. Skipping."));
                return None;
            }
        };

        let manifest_file = self.manifest.manifest_file();
        if !entries.iter().any(|name| name == manifest_file) {
            warnings.warn(format!(
                "Could not find expected {manifest_file} in directory '{location}'. Skipping."
            ));
            return None;
        }

        let info = match fs::read(dir.join(manifest_file))
            .map_err(ManifestError::from)
            .and_then(|content| self.manifest.parse(&content))
        {
            Ok(info) => info,
            Err(e) => {
                warnings.warn(format!(
                    "Malformed {manifest_file} file for '{location}': {e}."
                ));
                return None;
            }
        };

        debug!(
            ecosystem = self.manifest.ecosystem_id(),
            location,
            name = %info.name,
            version = %info.version,
            "Read manifest"
        );

        let mut files = Vec::new();
        self.collect_files(dir, "", &entries, &mut files, warnings);

        let dependency_dir = self.manifest.dependency_dir();
        let mut children = Vec::new();
        if entries.iter().any(|name| name == dependency_dir) {
            debug!(location, "Found '{}' directory", dependency_dir);
            self.collect_children(
                &dir.join(dependency_dir),
                &format!("{location}/{dependency_dir}"),
                &mut children,
                warnings,
            );
        }

        Some(PackageSnapshot {
            location: location.to_string(),
            name: Some(info.name),
            version: Some(info.version),
            source_link: info.source_link,
            files: Some(files),
            children,
        })
    }

    /// Treats every visible directory under the dependency container as a
    /// candidate sub-package. Scope directories (`@scope/pkg`) without a
    /// manifest of their own are descended one level.
    fn collect_children(
        &self,
        container: &Path,
        container_location: &str,
        children: &mut Vec<PackageSnapshot>,
        warnings: &mut Warnings,
    ) {
        let entries = match sorted_entries(container) {
            Ok(entries) => entries,
            Err(e) => {
                warnings.warn(format!(
                    "Could not read directory '{container_location}': {e}. Skipping."
                ));
                return;
            }
        };

        for name in entries {
            let path = container.join(&name);
            if is_hidden(&name) || !path.is_dir() {
                continue;
            }

            let location = format!("{container_location}/{name}");
            if name.starts_with('@') && !path.join(self.manifest.manifest_file()).exists() {
                self.collect_children(&path, &location, children, warnings);
                continue;
            }

            debug!(location = %location, "Found possible sub-dependency");
            if let Some(child) = self.build_at(&path, &location, warnings) {
                children.push(child);
            }
        }
    }

    /// Depth-first collection of digests for files whose suffix is enabled,
    /// skipping hidden directories and the dependency container.
    fn collect_files(
        &self,
        dir: &Path,
        relative: &str,
        entries: &[String],
        files: &mut Vec<FileRecord>,
        warnings: &mut Warnings,
    ) {
        for name in entries {
            let path = dir.join(name);
            let in_package = if relative.is_empty() {
                name.clone()
            } else {
                format!("{relative}/{name}")
            };

            let file_type = match fs::symlink_metadata(&path) {
                Ok(metadata) => metadata.file_type(),
                Err(e) => {
                    warnings.warn(format!("Could not inspect '{}': {e}. Skipping.", path.display()));
                    continue;
                }
            };

            if file_type.is_dir() {
                if name == self.manifest.dependency_dir() || is_hidden(name) {
                    continue;
                }
                match sorted_entries(&path) {
                    Ok(sub_entries) => {
                        debug!(directory = %in_package, "Found package sub-directory");
                        self.collect_files(&path, &in_package, &sub_entries, files, warnings);
                    }
                    Err(e) => warnings.warn(format!(
                        "Could not read directory '{}': {e}. Skipping it for checks.",
                        path.display()
                    )),
                }
            } else if self.options.should_digest(name) {
                match self.digester.digest_file(&path) {
                    Ok(digest) => {
                        debug!(file = %in_package, digest = %digest, "Hashed file");
                        files.push(FileRecord {
                            location: in_package,
                            digest,
                        });
                    }
                    Err(e) => warnings.warn(format!(
                        "Could not hash file '{}': {e}. Skipping it for checks.",
                        path.display()
                    )),
                }
            }
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Directory entry names, sorted so repeated scans emit the same order.
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    Ok(names)
}
