//! Source tree fingerprints.
//!
//! A [`FingerprintToken`] summarizes the state of a module's source
//! directory. Tokens only support equality: two tokens are equal exactly
//! when the tree is considered unchanged.

use std::fmt;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{MmakeError, Result};
use crate::hashing::{hash_file, mtime_nanos};

/// VCS metadata, skipped whether directory or file (a submodule checkout
/// has a `.git` file).
const IGNORED_NAMES: &[&str] = &[".git", ".hg", ".svn"];

/// Opaque fingerprint of a directory tree.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FingerprintToken {
    digest: [u8; 32],
    entries: u64,
}

impl FingerprintToken {
    /// Number of files, directories and links that went into the token.
    pub fn entries(&self) -> u64 {
        self.entries
    }
}

impl fmt::Display for FingerprintToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", blake3::Hash::from_bytes(self.digest).to_hex())
    }
}

/// What a fingerprint looks at for regular files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// Path, size and BLAKE3 hash of every file.
    #[default]
    Content,
    /// Path, size and modification time; touching a file counts as a change.
    Metadata,
}

/// Produces fingerprints for source directories.
pub trait Fingerprinter {
    /// Fingerprints the tree rooted at `dir`.
    fn fingerprint(&self, dir: &Path) -> Result<FingerprintToken>;
}

/// Walks the directory tree and fingerprints every entry below it.
///
/// The walk is sorted by file name, skips VCS metadata and does
/// not follow symbolic links; a link contributes its target path instead.
/// Regular files are described on the rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeFingerprinter {
    mode: FingerprintMode,
}

impl TreeFingerprinter {
    pub fn new(mode: FingerprintMode) -> Self {
        Self { mode }
    }
}

enum EntryKind {
    Dir,
    File,
    Symlink,
}

struct Entry {
    relative: PathBuf,
    kind: EntryKind,
}

impl Fingerprinter for TreeFingerprinter {
    fn fingerprint(&self, dir: &Path) -> Result<FingerprintToken> {
        let entries = collect_entries(dir)?;

        let records: Vec<Result<Vec<u8>>> = entries
            .par_iter()
            .map(|entry| describe(dir, entry, self.mode))
            .collect();

        let mut hasher = Hasher::new();
        let domain: &[u8] = match self.mode {
            FingerprintMode::Content => b"mmake-tree-v1:content",
            FingerprintMode::Metadata => b"mmake-tree-v1:metadata",
        };
        hasher.update(domain);
        for record in records {
            let record = record?;
            hasher.update(&(record.len() as u64).to_le_bytes());
            hasher.update(&record);
        }

        Ok(FingerprintToken {
            digest: *hasher.finalize().as_bytes(),
            entries: entries.len() as u64,
        })
    }
}

fn collect_entries(dir: &Path) -> Result<Vec<Entry>> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !e.file_name()
                .to_str()
                .is_some_and(|name| IGNORED_NAMES.contains(&name))
        });

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| MmakeError::IoError {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;

        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            // Sockets, fifos and devices carry no build input
            continue;
        };

        let relative = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_path_buf();
        entries.push(Entry { relative, kind });
    }

    Ok(entries)
}

/// Serializes one entry: kind tag, relative path, then kind-specific state.
fn describe(root: &Path, entry: &Entry, mode: FingerprintMode) -> Result<Vec<u8>> {
    let path = root.join(&entry.relative);
    let mut record = Vec::with_capacity(64);

    let tag = match entry.kind {
        EntryKind::Dir => b'd',
        EntryKind::File => b'f',
        EntryKind::Symlink => b'l',
    };
    record.push(tag);
    record.extend_from_slice(entry.relative.as_os_str().as_encoded_bytes());
    record.push(0);

    match entry.kind {
        EntryKind::Dir => {}
        EntryKind::Symlink => {
            let target = std::fs::read_link(&path).map_err(|source| MmakeError::IoError {
                path: path.clone(),
                source,
            })?;
            record.extend_from_slice(target.as_os_str().as_encoded_bytes());
        }
        EntryKind::File => {
            let metadata =
                std::fs::symlink_metadata(&path).map_err(|source| MmakeError::IoError {
                    path: path.clone(),
                    source,
                })?;
            record.extend_from_slice(&metadata.len().to_le_bytes());
            match mode {
                FingerprintMode::Content => {
                    record.extend_from_slice(hash_file(&path)?.as_bytes());
                }
                FingerprintMode::Metadata => {
                    record.extend_from_slice(&mtime_nanos(&path, &metadata)?.to_le_bytes());
                }
            }
        }
    }

    Ok(record)
}
