use std::fs::{File, Metadata};
use std::path::Path;
use std::time::UNIX_EPOCH;

use blake3::{Hash, Hasher};
use memmap2::Mmap;

use crate::error::MmakeError;

/// Computes the BLAKE3 hash of a file using memory mapping and parallel
/// processing.
///
/// Symbolic links and directories are rejected; the fingerprinter records
/// those itself without reading file content.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The path is not a regular file
/// - Memory mapping fails
pub fn hash_file(path: &Path) -> Result<Hash, MmakeError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|source| MmakeError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_file() {
        return Err(MmakeError::InvalidFileType {
            path: path.to_path_buf(),
            message: "only regular files can be hashed".to_string(),
        });
    }

    // Empty files cannot be memory mapped on every platform
    if metadata.len() == 0 {
        return Ok(Hasher::new().finalize());
    }

    let file = File::open(path).map_err(|source| MmakeError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    // SAFETY: the map is read-only and dropped before returning. A recipe
    // writing the file concurrently can only produce a stale hash, which the
    // next fingerprint corrects.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| MmakeError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Hasher::new();
    hasher.update_rayon(&mmap);

    Ok(hasher.finalize())
}

/// Modification time of `metadata` in nanoseconds since the UNIX epoch.
///
/// Times before the epoch collapse to zero.
pub fn mtime_nanos(path: &Path, metadata: &Metadata) -> Result<u128, MmakeError> {
    let modified = metadata.modified().map_err(|source| MmakeError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0))
}
