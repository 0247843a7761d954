//! Per-module stamp persistence.
//!
//! Each module's stamp lives in its own file, named after the module, in the
//! stamps directory. The file holds an rkyv archive of a [`StampRecord`].
//! Nothing outside this module looks inside it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rkyv::rancor::BoxedError;
use rkyv::util::AlignedVec;

use crate::error::{MmakeError, Result};
use crate::fingerprint::FingerprintToken;
use crate::logging::Logger;

/// Current version of the stamp file format.
///
/// Stamps with a higher version are refused; anything that fails to decode
/// is treated as if the module had never been built.
pub const STAMP_VERSION: u32 = 1;

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
struct StampRecord {
    version: u32,
    token: FingerprintToken,
}

/// Reads and writes module stamps in a single directory.
#[derive(Debug, Clone)]
pub struct StampStore {
    dir: PathBuf,
    log: Logger,
}

impl StampStore {
    pub fn new(dir: impl Into<PathBuf>, log: Logger) -> Self {
        Self {
            dir: dir.into(),
            log,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the stamp file for `module`.
    pub fn stamp_path(&self, module: &str) -> PathBuf {
        self.dir.join(module)
    }

    /// Creates the stamps directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| MmakeError::IoError {
            path: self.dir.clone(),
            source,
        })
    }

    /// Returns the stamp recorded for `module`, or `None` if it has never
    /// been built.
    ///
    /// A stamp that cannot be decoded is discarded with a warning, so the
    /// module is rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an error if the stamp exists but cannot be read, or was
    /// written by a newer mmake.
    pub fn read(&self, module: &str) -> Result<Option<FingerprintToken>> {
        let path = self.stamp_path(module);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(MmakeError::IoError { path, source }),
        };

        if bytes.is_empty() {
            return Ok(None);
        }

        match decode(module, &bytes) {
            Ok(record) if record.version > STAMP_VERSION => Err(MmakeError::ConfigError(format!(
                "Stamp for module '{module}' has version {} but this mmake supports up to {}. \
                 Please update mmake.",
                record.version, STAMP_VERSION
            ))),
            Ok(record) => Ok(Some(record.token)),
            Err(MmakeError::DeserializationError { .. }) => {
                self.log.warn(format!(
                    "unreadable stamp for module '{module}' at {}, rebuilding",
                    path.display()
                ));
                if let Err(e) = fs::remove_file(&path) {
                    self.log.warn(format!("could not remove {}: {e}", path.display()));
                }
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Records `token` as the stamp for `module`, replacing any previous one.
    ///
    /// The stamp is written to a temporary file and renamed into place, so a
    /// crash never leaves a half-written stamp.
    pub fn write(&self, module: &str, token: &FingerprintToken) -> Result<()> {
        self.ensure_dir()?;

        let record = StampRecord {
            version: STAMP_VERSION,
            token: token.clone(),
        };
        let bytes = rkyv::to_bytes::<BoxedError>(&record).map_err(|source| {
            MmakeError::SerializationError {
                module: module.to_string(),
                source,
            }
        })?;

        let path = self.stamp_path(module);
        let temp_path = self.dir.join(format!(".{module}.tmp"));

        let mut temp_file = File::create(&temp_path).map_err(|source| MmakeError::IoError {
            path: temp_path.clone(),
            source,
        })?;
        temp_file
            .write_all(&bytes)
            .and_then(|()| temp_file.sync_all())
            .map_err(|source| MmakeError::IoError {
                path: temp_path.clone(),
                source,
            })?;

        fs::rename(&temp_path, &path).map_err(|source| MmakeError::IoError { path, source })
    }

    /// Deletes the stamp for `module`. Succeeds if there is none.
    pub fn remove(&self, module: &str) -> Result<()> {
        let path = self.stamp_path(module);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MmakeError::IoError { path, source }),
        }
    }
}

fn decode(module: &str, bytes: &[u8]) -> Result<StampRecord> {
    // Archived fields must be aligned; a plain read gives no such guarantee
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);

    rkyv::from_bytes::<StampRecord, BoxedError>(&aligned).map_err(|source| {
        MmakeError::DeserializationError {
            module: module.to_string(),
            source,
        }
    })
}
