use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::Error;
use crate::grouping::{FileHandle, Grouping};

/// Files found directly inside the target directory, grouped by size.
#[derive(Debug)]
pub struct ScanOutcome {
    pub sizes: Grouping<u64>,
    pub scanned_files: usize,
    pub total_bytes: u64,
}

/// Rejects paths that do not exist or are not directories.
pub fn validate_directory(path: &Path) -> Result<(), Error> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Lists the direct children of `dir`, skipping hidden entries and
/// directories, and groups the remaining files by byte length.
///
/// Entries are visited in file-name order so that repeated runs feed the
/// resolver the same input order. Symlinks are followed when deciding
/// whether an entry is a directory and when reading its size.
pub fn scan_directory(dir: &Path) -> Result<ScanOutcome, Error> {
    let mut sizes = Grouping::new();
    let mut scanned_files = 0usize;
    let mut total_bytes = 0u64;

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| Error::Scan {
            path: dir.to_path_buf(),
            source,
        })?;
        if is_hidden(entry.file_name()) {
            log::trace!("skipping hidden entry {}", entry.path().display());
            continue;
        }
        let metadata = fs::metadata(entry.path()).map_err(|source| Error::Metadata {
            path: entry.path().to_path_buf(),
            source,
        })?;
        if metadata.is_dir() {
            log::trace!("skipping directory {}", entry.path().display());
            continue;
        }
        scanned_files += 1;
        total_bytes += metadata.len();
        sizes.insert(metadata.len(), FileHandle::new(entry.into_path()));
    }

    log::info!(
        "Scan complete - found {} files in {} size classes.",
        scanned_files,
        sizes.len()
    );
    Ok(ScanOutcome {
        sizes,
        scanned_files,
        total_bytes,
    })
}
