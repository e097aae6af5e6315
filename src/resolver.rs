//! Progressive duplicate resolution.
//!
//! Files arrive grouped by size. Every group with more than one member is
//! regrouped by a partial digest, and what is still ambiguous after that is
//! regrouped by a full digest. Singleton groups leave the loop as soon as they
//! appear, so a file is never hashed more than its ambiguity requires. After
//! the full-digest pass the first member of each group is kept and the rest
//! are duplicates.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::digest::{Digester, DigestScope};
use crate::error::Error;
use crate::grouping::{group_by, FileHandle, Grouping};

/// Refinement passes applied after the size grouping, cheapest first.
const REFINEMENT_PASSES: [DigestScope; 2] = [DigestScope::Partial, DigestScope::Full];

/// Destination bucket of a classified file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Extension(String),
    NoExtension,
    Duplicate,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Extension(ext) => write!(f, "{}-files", ext),
            Label::NoExtension => write!(f, "no-extension-files"),
            Label::Duplicate => write!(f, "duplicate-files"),
        }
    }
}

/// Label for a unique file: the text after its final dot, or the
/// no-extension sentinel when there is none (`README`, `.profile`). A trailing
/// dot yields an empty extension (`-files`).
pub fn label_for(handle: &FileHandle) -> Label {
    match handle.path().extension() {
        Some(ext) => Label::Extension(ext.to_string_lossy().into_owned()),
        None => Label::NoExtension,
    }
}

/// Final disposition of every scanned file.
#[derive(Clone, Debug, Default)]
pub struct Classification {
    buckets: BTreeMap<Label, Vec<FileHandle>>,
}

impl Classification {
    pub fn insert_unique(&mut self, handle: FileHandle) {
        self.buckets.entry(label_for(&handle)).or_default().push(handle);
    }

    pub fn insert_duplicate(&mut self, handle: FileHandle) {
        self.buckets.entry(Label::Duplicate).or_default().push(handle);
    }

    pub fn get(&self, label: &Label) -> Option<&[FileHandle]> {
        self.buckets.get(label).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, &[FileHandle])> {
        self.buckets
            .iter()
            .map(|(label, files)| (label, files.as_slice()))
    }

    /// Total number of classified files, duplicates included.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn duplicate_count(&self) -> usize {
        self.get(&Label::Duplicate).map_or(0, <[FileHandle]>::len)
    }

    pub fn unique_count(&self) -> usize {
        self.len() - self.duplicate_count()
    }

    /// Label name mapped to the sorted file names it holds.
    pub fn to_name_map(&self) -> BTreeMap<String, Vec<String>> {
        self.buckets
            .iter()
            .map(|(label, files)| {
                let mut names: Vec<String> = files.iter().map(FileHandle::name).collect();
                names.sort();
                (label.to_string(), names)
            })
            .collect()
    }
}

/// Counters describing how much work each level did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RefinementStats {
    pub partial_digests: usize,
    pub full_digests: usize,
    pub resolved_by_size: usize,
    pub resolved_by_partial: usize,
    pub resolved_by_full: usize,
}

impl RefinementStats {
    fn record_digest(&mut self, scope: DigestScope) {
        match scope {
            DigestScope::Partial => self.partial_digests += 1,
            DigestScope::Full => self.full_digests += 1,
        }
    }

    fn record_resolved(&mut self, level: Option<DigestScope>) {
        match level {
            None => self.resolved_by_size += 1,
            Some(DigestScope::Partial) => self.resolved_by_partial += 1,
            Some(DigestScope::Full) => self.resolved_by_full += 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Resolution {
    pub classification: Classification,
    pub stats: RefinementStats,
}

/// Moves singleton groups into `classification` and returns the groups that
/// still need a more expensive key.
fn promote_singletons<I>(
    groups: I,
    level: Option<DigestScope>,
    classification: &mut Classification,
    stats: &mut RefinementStats,
) -> Vec<Vec<FileHandle>>
where
    I: IntoIterator<Item = Vec<FileHandle>>,
{
    let mut ambiguous = Vec::new();
    for mut group in groups {
        if group.len() == 1 {
            if let Some(handle) = group.pop() {
                stats.record_resolved(level);
                classification.insert_unique(handle);
            }
        } else if !group.is_empty() {
            ambiguous.push(group);
        }
    }
    ambiguous
}

/// Resolves every file in `sizes` to unique or duplicate.
///
/// An unreadable file aborts the whole run; no classification is returned in
/// that case.
pub fn resolve<D: Digester>(sizes: Grouping<u64>, digester: &mut D) -> Result<Resolution, Error> {
    let mut classification = Classification::default();
    let mut stats = RefinementStats::default();

    let mut ambiguous =
        promote_singletons(sizes.into_groups(), None, &mut classification, &mut stats);
    log::debug!(
        "size pass left {} ambiguous groups ({} files)",
        ambiguous.len(),
        ambiguous.iter().map(Vec::len).sum::<usize>()
    );

    for scope in REFINEMENT_PASSES {
        if ambiguous.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for group in ambiguous {
            let regrouped = group_by(group, |handle| {
                stats.record_digest(scope);
                digester
                    .digest(handle, scope)
                    .map_err(|source| Error::UnreadableFile {
                        path: handle.path().to_path_buf(),
                        source,
                    })
            })?;
            if scope == DigestScope::Full {
                next.extend(regrouped.into_groups());
            } else {
                next.extend(promote_singletons(
                    regrouped.into_groups(),
                    Some(scope),
                    &mut classification,
                    &mut stats,
                ));
            }
        }
        ambiguous = next;
        log::debug!(
            "{} digest pass left {} groups ({} files)",
            scope,
            ambiguous.len(),
            ambiguous.iter().map(Vec::len).sum::<usize>()
        );
    }

    // Whatever survives the full pass is terminal: first member kept.
    for group in ambiguous {
        let mut members = group.into_iter();
        if let Some(survivor) = members.next() {
            stats.record_resolved(Some(DigestScope::Full));
            classification.insert_unique(survivor);
        }
        for duplicate in members {
            log::debug!("duplicate: {}", duplicate);
            classification.insert_duplicate(duplicate);
        }
    }

    Ok(Resolution {
        classification,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{hash_reader, ContentDigest, PARTIAL_DIGEST_BYTES};
    use std::collections::HashMap;
    use std::io;

    /// Digester over in-memory contents that records every call.
    #[derive(Default)]
    struct FakeDigester {
        contents: HashMap<FileHandle, Vec<u8>>,
        calls: Vec<(String, DigestScope)>,
    }

    impl FakeDigester {
        fn add(&mut self, sizes: &mut Grouping<u64>, name: &str, content: &[u8]) -> FileHandle {
            let handle = FileHandle::new(name);
            self.contents.insert(handle.clone(), content.to_vec());
            sizes.insert(content.len() as u64, handle.clone());
            handle
        }

        fn calls_for(&self, name: &str) -> Vec<DigestScope> {
            self.calls
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, scope)| *scope)
                .collect()
        }
    }

    impl Digester for FakeDigester {
        fn digest(&mut self, handle: &FileHandle, scope: DigestScope) -> io::Result<ContentDigest> {
            self.calls.push((handle.name(), scope));
            let bytes = self.contents.get(handle).ok_or_else(|| {
                io::Error::new(io::ErrorKind::PermissionDenied, "permission denied")
            })?;
            let covered = match scope {
                DigestScope::Partial => &bytes[..bytes.len().min(PARTIAL_DIGEST_BYTES as usize)],
                DigestScope::Full => &bytes[..],
            };
            hash_reader(covered)
        }
    }

    fn names(classification: &Classification, label: &Label) -> Vec<String> {
        classification
            .get(label)
            .unwrap_or_default()
            .iter()
            .map(FileHandle::name)
            .collect()
    }

    /// Bucket contents sorted by name; order within a unique bucket depends on
    /// the pass that settled each file.
    fn sorted_names(classification: &Classification, label: &Label) -> Vec<String> {
        let mut names = names(classification, label);
        names.sort();
        names
    }

    fn txt() -> Label {
        Label::Extension("txt".into())
    }

    #[test]
    fn test_label_for_extensions() {
        assert_eq!(label_for(&FileHandle::new("a.txt")), txt());
        assert_eq!(
            label_for(&FileHandle::new("archive.tar.gz")),
            Label::Extension("gz".into())
        );
        assert_eq!(label_for(&FileHandle::new("README")), Label::NoExtension);
        assert_eq!(label_for(&FileHandle::new(".profile")), Label::NoExtension);
        assert_eq!(txt().to_string(), "txt-files");
        assert_eq!(Label::NoExtension.to_string(), "no-extension-files");
        assert_eq!(Label::Duplicate.to_string(), "duplicate-files");
    }

    #[test]
    fn test_trailing_dot_labels_with_empty_extension() {
        let label = label_for(&FileHandle::new("/d/notes."));
        assert_eq!(label, Label::Extension(String::new()));
        assert_eq!(label.to_string(), "-files");

        let mut classification = Classification::default();
        classification.insert_unique(FileHandle::new("/d/notes."));
        assert!(classification.get(&Label::NoExtension).is_none());
        assert_eq!(classification.to_name_map()["-files"], ["notes."]);
    }

    #[test]
    fn test_resolve_mixed_scenario() {
        let mut sizes = Grouping::new();
        let mut digester = FakeDigester::default();
        digester.add(&mut sizes, "a.txt", b"xxxxxxxxxx");
        digester.add(&mut sizes, "b.txt", b"xxxxxxxxxx");
        digester.add(&mut sizes, "c.txt", b"yyyyyyyyyy");
        digester.add(&mut sizes, "d.log", b"zzzzzzzzzzzzzzzzzzzz");

        let resolution = resolve(sizes, &mut digester).expect("resolution failed");
        let classification = &resolution.classification;

        assert_eq!(sorted_names(classification, &txt()), ["a.txt", "c.txt"]);
        assert_eq!(
            names(classification, &Label::Extension("log".into())),
            ["d.log"]
        );
        assert_eq!(names(classification, &Label::Duplicate), ["b.txt"]);
        assert_eq!(classification.len(), 4);
        assert_eq!(classification.unique_count(), 3);
        assert_eq!(classification.duplicate_count(), 1);

        // d.log has a unique size and is never read.
        assert!(digester.calls_for("d.log").is_empty());
        // c.txt is settled by its partial digest.
        assert_eq!(digester.calls_for("c.txt"), [DigestScope::Partial]);
        assert_eq!(
            digester.calls_for("a.txt"),
            [DigestScope::Partial, DigestScope::Full]
        );
        assert_eq!(
            resolution.stats,
            RefinementStats {
                partial_digests: 3,
                full_digests: 2,
                resolved_by_size: 1,
                resolved_by_partial: 1,
                resolved_by_full: 1,
            }
        );
    }

    #[test]
    fn test_unique_sizes_are_never_hashed() {
        let mut sizes = Grouping::new();
        let mut digester = FakeDigester::default();
        digester.add(&mut sizes, "empty.dat", b"");
        digester.add(&mut sizes, "five.dat", b"12345");

        let resolution = resolve(sizes, &mut digester).expect("resolution failed");
        assert!(digester.calls.is_empty());
        assert_eq!(
            names(&resolution.classification, &Label::Extension("dat".into())),
            ["empty.dat", "five.dat"]
        );
        assert_eq!(resolution.classification.duplicate_count(), 0);
    }

    #[test]
    fn test_partial_singletons_skip_full_pass() {
        let mut sizes = Grouping::new();
        let mut digester = FakeDigester::default();
        digester.add(&mut sizes, "one.bin", b"AAAA");
        digester.add(&mut sizes, "two.bin", b"BBBB");
        digester.add(&mut sizes, "three.bin", b"CCCC");

        let resolution = resolve(sizes, &mut digester).expect("resolution failed");
        assert_eq!(resolution.stats.partial_digests, 3);
        assert_eq!(resolution.stats.full_digests, 0);
        assert_eq!(resolution.classification.unique_count(), 3);
    }

    #[test]
    fn test_same_prefix_different_tail_is_not_duplicate() {
        let mut prefix = vec![b'p'; PARTIAL_DIGEST_BYTES as usize];
        let mut left = prefix.clone();
        left.extend_from_slice(b"left");
        prefix.extend_from_slice(b"rght");

        let mut sizes = Grouping::new();
        let mut digester = FakeDigester::default();
        digester.add(&mut sizes, "left.img", &left);
        digester.add(&mut sizes, "right.img", &prefix);

        let resolution = resolve(sizes, &mut digester).expect("resolution failed");
        assert_eq!(resolution.stats.full_digests, 2);
        assert_eq!(resolution.classification.duplicate_count(), 0);
        assert_eq!(
            sorted_names(&resolution.classification, &Label::Extension("img".into())),
            ["left.img", "right.img"]
        );
    }

    #[test]
    fn test_every_copy_after_the_first_is_duplicate() {
        let mut sizes = Grouping::new();
        let mut digester = FakeDigester::default();
        for name in ["photo.jpg", "photo copy.jpg", "photo (2).jpeg", "photo-3"] {
            digester.add(&mut sizes, name, b"same bytes");
        }

        let resolution = resolve(sizes, &mut digester).expect("resolution failed");
        let classification = &resolution.classification;
        assert_eq!(
            names(classification, &Label::Extension("jpg".into())),
            ["photo.jpg"]
        );
        assert_eq!(
            names(classification, &Label::Duplicate),
            ["photo copy.jpg", "photo (2).jpeg", "photo-3"]
        );
        assert_eq!(classification.len(), 4);
    }

    #[test]
    fn test_survivor_follows_input_order() {
        for _ in 0..3 {
            let mut sizes = Grouping::new();
            let mut digester = FakeDigester::default();
            digester.add(&mut sizes, "second.txt", b"twin");
            digester.add(&mut sizes, "first.txt", b"twin");

            let resolution = resolve(sizes, &mut digester).expect("resolution failed");
            assert_eq!(names(&resolution.classification, &txt()), ["second.txt"]);
            assert_eq!(
                names(&resolution.classification, &Label::Duplicate),
                ["first.txt"]
            );
        }
    }

    #[test]
    fn test_unreadable_file_aborts_resolution() {
        let mut sizes = Grouping::new();
        let mut digester = FakeDigester::default();
        digester.add(&mut sizes, "fine.txt", b"1234");
        // Same size as fine.txt but unknown to the digester.
        sizes.insert(4, FileHandle::new("locked.txt"));

        let err = resolve(sizes, &mut digester).expect_err("expected unreadable file error");
        match err {
            Error::UnreadableFile { path, source } => {
                assert_eq!(path, std::path::PathBuf::from("locked.txt"));
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conservation_over_many_groups() {
        let mut sizes = Grouping::new();
        let mut digester = FakeDigester::default();
        let mut total = 0;
        for size in 0..12usize {
            for copy in 0..(size % 4 + 1) {
                let content = if copy % 2 == 0 {
                    vec![b'e'; size]
                } else {
                    vec![b'o'; size]
                };
                let name = format!("f{size}_{copy}.{}", if size % 3 == 0 { "a" } else { "b" });
                digester.add(&mut sizes, &name, &content);
                total += 1;
            }
        }

        let resolution = resolve(sizes, &mut digester).expect("resolution failed");
        let classification = &resolution.classification;
        assert_eq!(classification.len(), total);
        let stats = resolution.stats;
        assert_eq!(
            stats.resolved_by_size + stats.resolved_by_partial + stats.resolved_by_full,
            classification.unique_count()
        );
        // Every handle lands in exactly one bucket.
        let mut seen: Vec<FileHandle> = classification
            .iter()
            .flat_map(|(_, files)| files.iter().cloned())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn test_to_name_map_sorts_names() {
        let mut classification = Classification::default();
        classification.insert_unique(FileHandle::new("/d/zeta.md"));
        classification.insert_unique(FileHandle::new("/d/alpha.md"));
        classification.insert_duplicate(FileHandle::new("/d/alpha copy.md"));

        let map = classification.to_name_map();
        assert_eq!(map["md-files"], ["alpha.md", "zeta.md"]);
        assert_eq!(map["duplicate-files"], ["alpha copy.md"]);
        assert!(!classification.is_empty());
    }
}
