use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A file in the scanned directory, identified by its path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(PathBuf);

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// The final path component, lossily converted for display.
    pub fn name(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Files bucketed by a shared key. Each bucket keeps insertion order, so the
/// first handle pushed under a key stays first.
#[derive(Clone, Debug)]
pub struct Grouping<K> {
    groups: BTreeMap<K, Vec<FileHandle>>,
}

impl<K: Ord> Grouping<K> {
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, handle: FileHandle) {
        self.groups.entry(key).or_default().push(handle);
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of handles across every group.
    pub fn file_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn get(&self, key: &K) -> Option<&[FileHandle]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn into_groups(self) -> impl Iterator<Item = Vec<FileHandle>> {
        self.groups.into_values()
    }
}

impl<K: Ord> Default for Grouping<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Buckets `handles` by `key`, keeping input order inside every bucket.
///
/// The first error returned by `key` stops the grouping and is handed back
/// unchanged; no handle is dropped otherwise.
pub fn group_by<K, E, I, F>(handles: I, mut key: F) -> Result<Grouping<K>, E>
where
    K: Ord,
    I: IntoIterator<Item = FileHandle>,
    F: FnMut(&FileHandle) -> Result<K, E>,
{
    let mut grouping = Grouping::new();
    for handle in handles {
        let k = key(&handle)?;
        grouping.insert(k, handle);
    }
    Ok(grouping)
}
