//! Zip extraction into a [`TempExtraction`].

use super::pipeline::TempExtraction;
use super::traits::ExtractionError;
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Unpacks the zip archive at `archive` into `target`.
///
/// Entries that would land outside the extraction root are rejected.
/// Returns the number of files written.
pub fn extract_zip(archive: &Path, target: &TempExtraction) -> Result<usize, ExtractionError> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    let mut written = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ExtractionError::PathTraversal {
                attempted: entry.name().to_string(),
            })?;
        let outpath = target.safe_child(&relative)?;

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;
        written += 1;
    }

    Ok(written)
}

/// Names of the entries directly inside `dir`, sorted.
pub fn top_level_entries(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    Ok(names)
}
