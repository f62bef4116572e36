//! Structural comparison of two snapshot trees.
//!
//! [`compare`] walks both trees level by level and reports every difference
//! the [`ComparisonPolicy`] enables, recursing into matched sub-dependencies.
//! Output order is deterministic for a given pair of snapshots: identity,
//! files, source link, then sub-dependencies in the previous tree's order
//! followed by newly appeared ones in the current tree's order.

use crate::config::ComparisonPolicy;
use crate::model::{Discrepancy, DiscrepancyKind, FileRecord, PackageSnapshot};
use std::collections::HashMap;

/// Compares `previous` against `current` and returns every discrepancy found.
///
/// Neither snapshot is modified.
pub fn compare(
    previous: &PackageSnapshot,
    current: &PackageSnapshot,
    policy: &ComparisonPolicy,
) -> Vec<Discrepancy> {
    let mut out = Vec::new();
    compare_into(previous, current, policy, &mut out);
    out
}

fn compare_into(
    previous: &PackageSnapshot,
    current: &PackageSnapshot,
    policy: &ComparisonPolicy,
    out: &mut Vec<Discrepancy>,
) {
    let location = previous.location.as_str();
    let mut report = |kind: DiscrepancyKind, message: String| {
        out.push(Discrepancy {
            kind,
            location: location.to_string(),
            message,
        });
    };

    // Name changes are always reported.
    if let (Some(was), Some(now)) = (&previous.name, &current.name) {
        if was != now {
            report(
                DiscrepancyKind::NameChanged,
                format!("Package name of '{location}' has changed. Was: '{was}' Now: '{now}'"),
            );
        }
    }

    if policy.version {
        if let (Some(was), Some(now)) = (&previous.version, &current.version) {
            if was != now {
                report(
                    DiscrepancyKind::VersionChanged,
                    format!(
                        "Package version of '{location}' has changed. Was: '{was}' Now: '{now}'"
                    ),
                );
            }
        }
    }

    compare_files(previous, current, policy, &mut report);
    compare_source_links(previous, current, policy, &mut report);

    if policy.submodules {
        compare_children(previous, current, policy, out);
    }
}

fn compare_files(
    previous: &PackageSnapshot,
    current: &PackageSnapshot,
    policy: &ComparisonPolicy,
    report: &mut impl FnMut(DiscrepancyKind, String),
) {
    let location = previous.location.as_str();
    let was = previous.file_records();
    let now = current.file_records();

    match (was.is_empty(), now.is_empty()) {
        (true, true) => {}
        (false, true) => {
            if policy.file_missing {
                report(
                    DiscrepancyKind::FilesMissing,
                    format!("These files in '{location}' are now missing: {}", list_files(was)),
                );
            }
        }
        (true, false) => {
            if policy.file_missing {
                report(
                    DiscrepancyKind::FilesAppeared,
                    format!(
                        "These files in '{location}' were not previously present: {}",
                        list_files(now)
                    ),
                );
            }
        }
        (false, false) => {
            // Files only present in `current` are not reported here; see
            // DESIGN.md for why this asymmetry is kept.
            let index: HashMap<&str, &str> = now
                .iter()
                .map(|f| (f.location.as_str(), f.digest.as_str()))
                .collect();

            for old in was {
                match index.get(old.location.as_str()) {
                    Some(digest) if *digest != old.digest => {
                        if policy.file_hash {
                            report(
                                DiscrepancyKind::FileHashChanged,
                                format!(
                                    "Hash mismatch for '{}' in '{location}'. Was: '{}' Now: '{digest}'",
                                    old.location, old.digest
                                ),
                            );
                        }
                    }
                    Some(_) => {}
                    None => {
                        if policy.file_missing {
                            report(
                                DiscrepancyKind::FileVanished,
                                format!(
                                    "File '{}' no longer present in '{location}'",
                                    old.location
                                ),
                            );
                        }
                    }
                }
            }
        }
    }
}

fn compare_source_links(
    previous: &PackageSnapshot,
    current: &PackageSnapshot,
    policy: &ComparisonPolicy,
    report: &mut impl FnMut(DiscrepancyKind, String),
) {
    if !policy.source_link {
        return;
    }

    let location = previous.location.as_str();
    let was = previous.source_link.as_str();
    let now = current.source_link.as_str();

    match (was.is_empty(), now.is_empty()) {
        (false, true) => report(
            DiscrepancyKind::SourceLinkRemoved,
            format!("Source link for '{location}' has been deleted. Was: '{was}'"),
        ),
        (true, false) => report(
            DiscrepancyKind::SourceLinkAppeared,
            format!("Previously absent source link appeared for '{location}' as: '{now}'"),
        ),
        (false, false) if was != now => report(
            DiscrepancyKind::SourceLinkChanged,
            format!("Source link for '{location}' has been modified. Was: '{was}' Now: '{now}'"),
        ),
        _ => {}
    }
}

fn compare_children(
    previous: &PackageSnapshot,
    current: &PackageSnapshot,
    policy: &ComparisonPolicy,
    out: &mut Vec<Discrepancy>,
) {
    let location = previous.location.as_str();

    for old in &previous.children {
        match current.children.iter().find(|new| is_same_package(old, new)) {
            Some(new) => compare_into(old, new, policy, out),
            None => out.push(Discrepancy {
                kind: DiscrepancyKind::SubmoduleMissing,
                location: location.to_string(),
                message: format!(
                    "Missing sub-dependency '{}' from '{location}'",
                    old.name_or_location()
                ),
            }),
        }
    }

    for new in &current.children {
        if !previous.children.iter().any(|old| is_same_package(old, new)) {
            out.push(Discrepancy {
                kind: DiscrepancyKind::SubmoduleAppeared,
                location: location.to_string(),
                message: format!(
                    "New sub-dependency '{}' has appeared in '{location}'",
                    new.name_or_location()
                ),
            });
        }
    }
}

/// Two sub-dependencies are the same package when both declare a name and
/// the names match. Location is only consulted when a name is missing.
pub fn is_same_package(a: &PackageSnapshot, b: &PackageSnapshot) -> bool {
    match (&a.name, &b.name) {
        (Some(x), Some(y)) => x == y,
        _ => a.location == b.location,
    }
}

fn list_files(files: &[FileRecord]) -> String {
    let names: Vec<&str> = files.iter().map(|f| f.location.as_str()).collect();
    format!("[{}]", names.join(", "))
}
