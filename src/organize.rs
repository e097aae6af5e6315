use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::grouping::FileHandle;
use crate::resolver::Classification;

#[derive(Clone, Debug, Serialize)]
pub struct MoveFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of moving classified files into their label directories.
#[derive(Clone, Debug, Serialize)]
pub struct OrganizeReport {
    pub total_candidates: usize,
    pub successes: usize,
    pub failures: Vec<MoveFailure>,
}

impl OrganizeReport {
    fn new(total_candidates: usize) -> Self {
        Self {
            total_candidates,
            successes: 0,
            failures: Vec::new(),
        }
    }

    fn record_success(&mut self) {
        self.successes += 1;
    }

    fn record_failure(&mut self, path: &Path, err: impl ToString) {
        self.failures.push(MoveFailure {
            path: path.to_path_buf(),
            error: err.to_string(),
        });
    }
}

/// Returns a free destination path for `file_name` inside `dest`, appending
/// `(1)`, `(2)`, ... to the stem while the name is taken.
fn get_unique_destination(dest: &Path, file_name: &OsStr) -> PathBuf {
    let initial_dest = dest.join(file_name);
    if !initial_dest.exists() {
        return initial_dest;
    }
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .unwrap_or(file_name)
        .to_string_lossy()
        .into_owned();
    let ext = name.extension().and_then(|s| s.to_str()).unwrap_or("");
    let mut counter = 1;
    loop {
        let new_name = if ext.is_empty() {
            format!("{}({})", stem, counter)
        } else {
            format!("{}({}).{}", stem, counter, ext)
        };
        let new_dest = dest.join(new_name);
        if !new_dest.exists() {
            return new_dest;
        }
        counter += 1;
    }
}

fn relocate_file(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(src, dest)
}

fn move_into(handle: &FileHandle, target_dir: &Path) -> io::Result<PathBuf> {
    let file_name = handle
        .path()
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid file name"))?;
    let dest_path = get_unique_destination(target_dir, file_name);
    relocate_file(handle.path(), &dest_path)?;
    Ok(dest_path)
}

/// Moves every classified file into `<dir>/<label>/`. A failed move is
/// recorded and the remaining files are still processed.
pub fn organize(dir: &Path, classification: &Classification) -> OrganizeReport {
    let mut report = OrganizeReport::new(classification.len());

    for (label, files) in classification.iter() {
        let target_dir = dir.join(label.to_string());
        for handle in files {
            match move_into(handle, &target_dir) {
                Ok(dest_path) => {
                    log::info!("Moved {} to {}", handle, dest_path.display());
                    report.record_success();
                }
                Err(err) => {
                    log::error!("Error moving {}: {}", handle, err);
                    report.record_failure(handle.path(), err);
                }
            }
        }
    }
    report
}
