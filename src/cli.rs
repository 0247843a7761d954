//! Command-line interface definitions for mmake.
//!
//! This module defines the CLI structure using clap, including all subcommands
//! and their arguments. The main entry point is the [`Cli`] struct.
//!
//! # Example
//!
//! ```no_run
//! use mmake::cli::{Cli, Commands};
//!
//! let cli = Cli::parse_args();
//!
//! match cli.command() {
//!     Commands::Build { stamp_policy } => println!("building, policy {stamp_policy:?}"),
//!     Commands::Order => println!("printing the build order"),
//!     _ => {}
//! }
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::error::{MmakeError, Result};
use crate::manifest::MANIFEST_FILE;
use crate::orchestrator::StampPolicy;


/// Main command-line interface for mmake.
#[derive(Parser)]
#[command(
    name = "mmake",
    bin_name = "mmake",
    author,
    version,
    about = "Builds a tree of interdependent modules in dependency order, skipping unchanged ones",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Global options that apply to all mmake commands.
#[derive(Parser)]
pub struct GlobalOpts {
    /// Directory holding the manifest and module sources (defaults to .)
    #[arg(long, global = true, default_value = ".", env = "MMAKE_BASE_DIR")]
    base_dir: PathBuf,

    /// Path to the manifest (defaults to `<base-dir>/manifest.json`)
    #[arg(long, global = true, env = "MMAKE_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, env = "MMAKE_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        env = "MMAKE_QUIET"
    )]
    quiet: bool,
}

impl GlobalOpts {
    /// Create a new builder for constructing `GlobalOpts` programmatically.
    pub fn builder() -> GlobalOptsBuilder {
        GlobalOptsBuilder::default()
    }

    /// Get the absolute base directory
    pub fn get_base_dir(&self) -> PathBuf {
        normalize_path(self.base_dir())
    }

    /// Get the effective manifest path
    pub fn get_manifest_path(&self) -> PathBuf {
        match self.manifest() {
            Some(path) => normalize_path(path),
            None => self.get_base_dir().join(MANIFEST_FILE),
        }
    }

    /// Like [`GlobalOpts::get_base_dir`], resolving relative paths against
    /// `working_dir` instead of the current directory.
    pub fn base_dir_from(&self, working_dir: &Path) -> PathBuf {
        normalize_path(working_dir.join(self.base_dir()))
    }

    /// Like [`GlobalOpts::get_manifest_path`], resolving relative paths
    /// against `working_dir`.
    pub fn manifest_path_from(&self, working_dir: &Path) -> PathBuf {
        match self.manifest() {
            Some(path) => normalize_path(working_dir.join(path)),
            None => self.base_dir_from(working_dir).join(MANIFEST_FILE),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn manifest(&self) -> Option<&Path> {
        self.manifest.as_deref()
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builder for constructing `GlobalOpts` without going through argument
/// parsing.
#[derive(Default)]
pub struct GlobalOptsBuilder {
    base_dir: Option<PathBuf>,
    manifest: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
}

impl GlobalOptsBuilder {
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn manifest(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.manifest = path.map(|p| p.into());
        self
    }

    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(self) -> GlobalOpts {
        GlobalOpts {
            base_dir: self.base_dir.unwrap_or_else(|| PathBuf::from(".")),
            manifest: self.manifest,
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    pub fn command(&self) -> &Commands {
        &self.command
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }

    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    base_dir: Option<PathBuf>,
    manifest: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
    command: Option<Commands>,
}

impl CliBuilder {
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest = Some(path.into());
        self
    }

    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    pub fn quiet(mut self, enabled: bool) -> Self {
        self.quiet = enabled;
        self
    }

    pub fn command(mut self, command: Commands) -> Self {
        self.command = Some(command);
        self
    }

    /// Build the Cli instance
    pub fn build(self) -> Result<Cli> {
        let command = self
            .command
            .ok_or_else(|| MmakeError::ConfigError("Command is required".to_string()))?;

        Ok(Cli {
            global_opts: GlobalOpts::builder()
                .base_dir(self.base_dir.unwrap_or_else(|| PathBuf::from(".")))
                .manifest(self.manifest)
                .verbose(self.verbose)
                .quiet(self.quiet)
                .build(),
            command,
        })
    }
}

/// Normalize a path to be absolute and clean, without requiring it to exist.
///
/// Relative paths are joined onto the current directory, `.` components are
/// dropped and `..` pops the previous component. Symlinks are not resolved.
pub(crate) fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    use std::path::Component;

    let path = path.as_ref();
    let absolute = if path.is_relative() {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                if let Some(last) = components.last()
                    && !matches!(last, Component::ParentDir | Component::RootDir)
                {
                    components.pop();
                    continue;
                }
                if matches!(components.last(), Some(Component::RootDir)) {
                    continue;
                }
                components.push(component);
            }
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    components.into_iter().collect()
}

/// Available mmake subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Build every module whose sources changed since its last build
    ///
    /// Modules are built one at a time in dependency order. Each recipe runs
    /// with SOURCE_DIR, BUILD_DIR and INSTALL_DIR set, and with PATH and the
    /// library search paths pointing into the shared install prefix. The run
    /// stops at the first failing recipe.
    Build {
        /// What to do with a module's stamp when its recipe fails
        /// (overrides the manifest setting)
        #[arg(long, value_enum, env = "MMAKE_STAMP_POLICY")]
        stamp_policy: Option<StampPolicy>,
    },

    /// Check out every module's git submodule
    ///
    /// Initializes and updates the submodule at `<base-dir>/<module>` for
    /// each module in the manifest.
    Pull,

    /// Remove untracked and ignored files
    ///
    /// Cleans the base repository, including the build directory, and every
    /// module checkout.
    Clean,

    /// Print the resolved build order without running anything
    Order,

    /// Rewrite the manifest with consistent formatting
    ///
    /// Indents with four spaces and keeps modules in their declared order.
    Format,
}
