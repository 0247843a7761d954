use std::path::Path;

use crate::error::Result;
use crate::logging::Logger;
use crate::manifest::{Manifest, format_manifest};
use crate::vcs;

/// Executes the pull command: checks out every module's submodule.
pub fn pull(base_dir: &Path, manifest_path: &Path, log: Logger) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    vcs::pull(base_dir, &manifest.graph, log)?;
    log.info(format!("Pulled {} modules", manifest.graph.len()));
    Ok(())
}

/// Executes the clean command.
pub fn clean(base_dir: &Path, manifest_path: &Path, log: Logger) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let removed = vcs::clean(base_dir, &manifest.graph, log)?;
    log.info(format!("Removed {removed} untracked entries"));
    Ok(())
}

/// Executes the format command.
///
/// The manifest must parse before it is rewritten, so a broken manifest is
/// reported instead of being reformatted.
pub fn format(manifest_path: &Path, log: Logger) -> Result<()> {
    Manifest::load(manifest_path)?;
    if format_manifest(manifest_path)? {
        log.info(format!("Formatted {}", manifest_path.display()));
    } else {
        log.verbose(1, format!("{} already formatted", manifest_path.display()));
    }
    Ok(())
}
