//! Implementation of mmake subcommands.
//!
//! `mod.rs` is a thin dispatcher; command logic lives in `build` (building
//! and ordering) and `maintenance` (source control and manifest upkeep).

use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands};
use crate::error::{MmakeError, Result};
use crate::logging::Logger;

pub(crate) mod build;
pub(crate) mod maintenance;

pub use build::{build, order};
pub use maintenance::{clean, format, pull};


/// Execute commands based on the parsed CLI arguments.
pub fn execute(cli: &Cli) -> Result<()> {
    execute_with_dir(cli, None)
}

/// Execute commands with an explicit working directory.
///
/// A relative `--base-dir` or `--manifest` is resolved against
/// `working_dir` when given, otherwise against the current directory.
pub fn execute_with_dir(cli: &Cli, working_dir: Option<&Path>) -> Result<()> {
    let opts = cli.global_opts();
    let log = Logger::new(opts.verbose(), opts.quiet());

    let current_dir = if let Some(dir) = working_dir {
        dir.to_path_buf()
    } else {
        std::env::current_dir().map_err(|source| MmakeError::IoError {
            path: PathBuf::from("."),
            source,
        })?
    };

    let base_dir = opts.base_dir_from(&current_dir);
    let manifest_path = opts.manifest_path_from(&current_dir);
    log.verbose(1, format!("Base directory: {}", base_dir.display()));
    log.verbose(1, format!("Manifest: {}", manifest_path.display()));

    match cli.command() {
        Commands::Build { stamp_policy } => {
            build(&base_dir, &manifest_path, *stamp_policy, log).map(|_| ())
        }
        Commands::Pull => pull(&base_dir, &manifest_path, log),
        Commands::Clean => clean(&base_dir, &manifest_path, log),
        Commands::Order => {
            for name in order(&manifest_path)? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Format => format(&manifest_path, log),
    }
}
