use std::path::Path;

use crate::context::BuildLayout;
use crate::error::Result;
use crate::fingerprint::TreeFingerprinter;
use crate::logging::Logger;
use crate::manifest::Manifest;
use crate::orchestrator::{BuildReport, Orchestrator, StampPolicy};
use crate::resolver::{BuildOrder, resolve};
use crate::runner::ShellRunner;

/// Executes the build command.
///
/// Loads the manifest, then builds every stale module with `sh <recipe>`.
/// `policy` overrides the manifest's `stamp_policy` setting when given.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded, the modules contain a
/// cycle, a recipe is missing, or a recipe fails.
pub fn build(
    base_dir: &Path,
    manifest_path: &Path,
    policy: Option<StampPolicy>,
    log: Logger,
) -> Result<BuildReport> {
    let manifest = Manifest::load(manifest_path)?;
    let settings = &manifest.settings;
    let policy = policy.unwrap_or(settings.stamp_policy);
    log.verbose(
        1,
        format!(
            "Fingerprint mode: {:?}, stamp policy: {policy:?}",
            settings.fingerprint
        ),
    );

    let layout = BuildLayout::new(base_dir, settings);
    let mut orchestrator = Orchestrator::new(
        layout,
        TreeFingerprinter::new(settings.fingerprint),
        ShellRunner::new(),
    )
    .stamp_policy(policy)
    .logger(log);

    let report = orchestrator.build(&manifest.graph)?;

    let rebuilt = report.rebuilt().len();
    let skipped = report.skipped().len();
    if rebuilt == 0 {
        log.info(format!("All {skipped} modules up to date"));
    } else {
        log.info(format!("Built {rebuilt} modules, {skipped} up to date"));
    }

    Ok(report)
}

/// Resolves the build order of the manifest at `manifest_path` without
/// running anything.
pub fn order(manifest_path: &Path) -> Result<BuildOrder> {
    let manifest = Manifest::load(manifest_path)?;
    resolve(&manifest.graph)
}
