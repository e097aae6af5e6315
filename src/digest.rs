use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, BufReader, Read};

use crate::grouping::FileHandle;

/// Number of leading bytes covered by a partial digest.
pub const PARTIAL_DIGEST_BYTES: u64 = 1024;

const READ_BUFFER_BYTES: usize = 16 * 1024;

/// How much of a file a digest covers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DigestScope {
    /// The first [`PARTIAL_DIGEST_BYTES`] bytes.
    Partial,
    /// The entire contents.
    Full,
}

impl fmt::Display for DigestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestScope::Partial => write!(f, "partial"),
            DigestScope::Full => write!(f, "full"),
        }
    }
}

/// A SHA‑256 digest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Computes content digests for file handles.
pub trait Digester {
    fn digest(&mut self, handle: &FileHandle, scope: DigestScope) -> io::Result<ContentDigest>;
}

/// Reads files from disk and hashes them with SHA‑256.
#[derive(Debug, Default)]
pub struct Sha256Digester;

impl Digester for Sha256Digester {
    fn digest(&mut self, handle: &FileHandle, scope: DigestScope) -> io::Result<ContentDigest> {
        let file = fs::File::open(handle.path())?;
        let reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
        match scope {
            DigestScope::Partial => hash_reader(reader.take(PARTIAL_DIGEST_BYTES)),
            DigestScope::Full => hash_reader(reader),
        }
    }
}

/// Hashes everything `reader` yields, in 16‑KB chunks.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_BYTES];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(ContentDigest(hasher.finalize().into()))
}
