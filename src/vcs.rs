//! Git operations on the base repository and module checkouts.
//!
//! Each module lives in a git submodule of the base repository at
//! `<base>/<module-name>`.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository, Status, StatusOptions};

use crate::error::{MmakeError, Result};
use crate::logging::Logger;
use crate::manifest::ModuleGraph;

/// Initializes and updates the submodule of every module, in manifest order.
///
/// # Errors
///
/// Returns [`MmakeError::RepoNotFound`] if `base_dir` is not a git
/// repository and [`MmakeError::SubmoduleNotFound`] for a module without a
/// submodule. Nothing after the failing module is pulled.
pub fn pull(base_dir: &Path, graph: &ModuleGraph, log: Logger) -> Result<()> {
    let repo = open(base_dir)?;

    for module in graph.iter() {
        let mut submodule = repo.find_submodule(&module.name).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                MmakeError::SubmoduleNotFound(module.name.clone())
            } else {
                MmakeError::Git(e)
            }
        })?;

        log.info(format!("Pulling {}", module.name));
        submodule.update(true, None)?;
    }

    Ok(())
}

/// Removes untracked and ignored files from the base repository and from
/// every module directory that is a repository of its own.
///
/// Untracked directories holding a nested repository are left alone, as
/// `git clean -fdx` does. Returns the number of removed entries.
pub fn clean(base_dir: &Path, graph: &ModuleGraph, log: Logger) -> Result<usize> {
    let repo = open(base_dir)?;
    let mut removed = clean_repository(&repo, log)?;

    for module in graph.iter() {
        let module_dir = base_dir.join(&module.name);
        let Ok(module_repo) = Repository::open(&module_dir) else {
            log.verbose(1, format!("{}: not a repository, skipping", module.name));
            continue;
        };
        removed += clean_repository(&module_repo, log)?;
    }

    Ok(removed)
}

fn open(base_dir: &Path) -> Result<Repository> {
    Repository::open(base_dir).map_err(|_| MmakeError::RepoNotFound(base_dir.to_path_buf()))
}

fn clean_repository(repo: &Repository, log: Logger) -> Result<usize> {
    let Some(workdir) = repo.workdir() else {
        return Ok(0);
    };

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .include_ignored(true)
        .recurse_untracked_dirs(false)
        .recurse_ignored_dirs(false)
        .exclude_submodules(true);

    let doomed: Vec<PathBuf> = repo
        .statuses(Some(&mut options))?
        .iter()
        .filter(|entry| entry.status().intersects(Status::WT_NEW | Status::IGNORED))
        .filter_map(|entry| match entry.path() {
            Some(path) => Some(workdir.join(path)),
            None => {
                log.warn(format!(
                    "skipping non UTF-8 path {}",
                    String::from_utf8_lossy(entry.path_bytes())
                ));
                None
            }
        })
        .collect();

    let mut removed = 0;
    for path in doomed {
        if remove_entry(&path, log)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Deletes a file, symlink or directory tree. Returns `false` for nested
/// repositories, which are kept.
fn remove_entry(path: &Path, log: Logger) -> Result<bool> {
    let io_error = |source| MmakeError::IoError {
        path: path.to_path_buf(),
        source,
    };

    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(io_error(e)),
    };

    if metadata.is_dir() {
        if path.join(".git").exists() {
            log.verbose(1, format!("Keeping nested repository {}", path.display()));
            return Ok(false);
        }
        log.verbose(1, format!("Removing {}", path.display()));
        fs::remove_dir_all(path).map_err(io_error)?;
    } else {
        log.verbose(1, format!("Removing {}", path.display()));
        fs::remove_file(path).map_err(io_error)?;
    }
    Ok(true)
}
