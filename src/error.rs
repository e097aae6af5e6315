use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a run before any file is moved.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("unable to list {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("unable to obtain the size of {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file could not be opened or read while computing a digest.
    #[error("unable to read {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}


impl Error {
    /// True when the target path was rejected before scanning began.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::NotADirectory(_))
    }
}
