//! The build loop.
//!
//! [`Orchestrator::build`] resolves the build order once, then visits each
//! module in turn:
//!
//! 1. compute its paths and create its build directory
//! 2. read its stamp and fingerprint its source tree
//! 3. if the stamp is missing or differs, run the recipe
//! 4. store the fingerprint as the new stamp
//!
//! Modules are processed strictly one after another: a recipe can rely on
//! everything installed by the modules before it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::{BuildContext, BuildLayout, ModulePaths};
use crate::error::{MmakeError, Result};
use crate::fingerprint::Fingerprinter;
use crate::logging::Logger;
use crate::manifest::{Module, ModuleGraph};
use crate::resolver::{BuildOrder, resolve_modules};
use crate::runner::{Invocation, RecipeStatus, Runner};
use crate::stamps::StampStore;

#[cfg(test)]
mod tests;

/// What happens to a module's stamp when its recipe fails.
///
/// A recipe that could not be started at all never updates the stamp,
/// whichever policy is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StampPolicy {
    /// Record the source state even after a failed recipe. An unchanged
    /// module is not retried on the next run.
    #[default]
    Always,
    /// Keep the previous stamp when the recipe fails, so the next run tries
    /// the module again.
    OnSuccess,
}

/// Result of considering one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOutcome {
    /// The recipe ran and succeeded.
    Rebuilt,
    /// The source tree matched the stamp; the recipe did not run.
    Skipped,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// The resolved build order.
    pub order: BuildOrder,
    /// Every module in `order` with what happened to it.
    pub outcomes: Vec<(String, ModuleOutcome)>,
}

impl BuildReport {
    pub fn rebuilt(&self) -> Vec<&str> {
        self.with_outcome(ModuleOutcome::Rebuilt)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.with_outcome(ModuleOutcome::Skipped)
    }

    fn with_outcome(&self, wanted: ModuleOutcome) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == wanted)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Drives one build run over a module graph.
pub struct Orchestrator<F, R> {
    layout: BuildLayout,
    fingerprinter: F,
    runner: R,
    policy: StampPolicy,
    context: Option<BuildContext>,
    log: Logger,
}

impl<F: Fingerprinter, R: Runner> Orchestrator<F, R> {
    pub fn new(layout: BuildLayout, fingerprinter: F, runner: R) -> Self {
        Self {
            layout,
            fingerprinter,
            runner,
            policy: StampPolicy::default(),
            context: None,
            log: Logger::default(),
        }
    }

    pub fn stamp_policy(mut self, policy: StampPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses `context` instead of deriving one from this process's `PATH`.
    pub fn context(mut self, context: BuildContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    /// Builds every stale module of `graph` in dependency order.
    ///
    /// # Errors
    ///
    /// - [`MmakeError::CyclicDependency`] before anything runs
    /// - [`MmakeError::MissingRecipe`] before anything runs
    /// - [`MmakeError::RecipeFailed`] at the first failing recipe; modules
    ///   after it are not attempted
    /// - [`MmakeError::SourceDirMissing`] or I/O errors while visiting a
    ///   module
    pub fn build(&mut self, graph: &ModuleGraph) -> Result<BuildReport> {
        let modules = resolve_modules(graph)?;
        let order: BuildOrder = modules.iter().map(|m| m.name.clone()).collect();
        self.log.verbose(1, format!("Build order: {}", order.join(" -> ")));

        for module in &modules {
            let paths = self.layout.module_paths(module);
            if !paths.recipe.is_file() {
                return Err(MmakeError::MissingRecipe {
                    module: module.name.clone(),
                    path: paths.recipe,
                });
            }
        }

        let stamps = StampStore::new(&self.layout.stamps_dir, self.log);
        stamps.ensure_dir()?;
        create_dir(&self.layout.install_dir)?;

        let context = match &self.context {
            Some(context) => context.clone(),
            None => BuildContext::from_env(&self.layout.install_dir)?,
        };

        let mut report = BuildReport {
            order,
            outcomes: Vec::with_capacity(modules.len()),
        };
        for module in modules {
            let outcome = self.visit(module, &stamps, &context)?;
            report.outcomes.push((module.name.clone(), outcome));
        }

        Ok(report)
    }

    fn visit(
        &mut self,
        module: &Module,
        stamps: &StampStore,
        context: &BuildContext,
    ) -> Result<ModuleOutcome> {
        let name = module.name.as_str();
        let paths = self.layout.module_paths(module);
        create_dir(&paths.build_dir)?;

        if !paths.source_dir.is_dir() {
            return Err(MmakeError::SourceDirMissing {
                module: name.to_string(),
                path: paths.source_dir,
            });
        }

        let previous = stamps.read(name)?;
        let current = self.fingerprinter.fingerprint(&paths.source_dir)?;

        if previous.as_ref() == Some(&current) {
            self.log.verbose(1, format!("{name}: up to date"));
            stamps.write(name, &current)?;
            return Ok(ModuleOutcome::Skipped);
        }

        match previous {
            None => self.log.info(format!("Building {name} (never built)")),
            Some(_) => self.log.info(format!("Building {name} (sources changed)")),
        }

        let status = self.invoke(module, &paths, context)?;
        match status {
            RecipeStatus::Success => {
                let after = self.fingerprinter.fingerprint(&paths.source_dir)?;
                stamps.write(name, &after)?;
                Ok(ModuleOutcome::Rebuilt)
            }
            RecipeStatus::Failed { code } => {
                if self.policy == StampPolicy::Always {
                    self.record_after_failure(name, &paths.source_dir, stamps);
                }
                Err(MmakeError::RecipeFailed {
                    module: name.to_string(),
                    recipe: paths.recipe,
                    code,
                })
            }
        }
    }

    fn invoke(
        &mut self,
        module: &Module,
        paths: &ModulePaths,
        context: &BuildContext,
    ) -> Result<RecipeStatus> {
        let env = context.recipe_env(paths);
        for (key, value) in env.iter() {
            self.log.verbose(2, format!("  {key}={}", value.to_string_lossy()));
        }

        self.runner.invoke(&Invocation {
            module: &module.name,
            recipe: &paths.recipe,
            working_dir: &paths.source_dir,
            env: &env,
        })
    }

    /// Stamps a module whose recipe failed. Problems here are only logged:
    /// the recipe failure is the error the caller needs to see.
    fn record_after_failure(&self, name: &str, source_dir: &Path, stamps: &StampStore) {
        let stamped = self
            .fingerprinter
            .fingerprint(source_dir)
            .and_then(|token| stamps.write(name, &token));
        if let Err(e) = stamped {
            self.log.warn(format!("could not record stamp for {name}: {e}"));
        }
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| MmakeError::IoError {
        path: path.to_path_buf(),
        source,
    })
}
