//! # mmake
//!
//! A build orchestrator for trees of interdependent modules.
//!
//! ## Overview
//!
//! A project is a base directory holding `manifest.json`, one source
//! directory per module and a shell recipe for each. mmake orders the
//! modules so that every module is built after its dependencies, then runs
//! each stale module's recipe against a shared install prefix. A module is
//! stale when the fingerprint of its source tree differs from the stamp
//! recorded after its last build.
//!
//! ## Key Features
//!
//! - **Dependency ordering**: declaration order breaks ties, cycles are
//!   reported before anything runs
//! - **Content fingerprints**: BLAKE3 over every file of a source tree, with
//!   an optional cheaper mtime mode
//! - **Atomic stamps**: rkyv-encoded, written with a temp file and rename
//! - **Shared prefix**: `PATH`, `LD_LIBRARY_PATH`, `PKG_CONFIG_PATH` and
//!   `ACLOCAL_FLAGS` point recipes at what earlier modules installed
//! - **Source control**: submodule checkout and `git clean` through libgit2
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line interface definitions using clap
//! - [`commands`]: Implementation of all mmake subcommands
//! - [`error`]: Error types and handling with thiserror + miette
//! - [`manifest`]: Manifest parsing and the module graph
//! - [`resolver`]: Build order resolution
//! - [`fingerprint`]: Source tree fingerprints
//! - [`stamps`]: Persisted fingerprints of the last build
//! - [`context`]: Directory layout and recipe environments
//! - [`runner`]: Recipe execution
//! - [`orchestrator`]: The build loop
//! - [`vcs`]: Git submodule checkout and cleaning
//!
//! ## Library Usage
//!
//! ```no_run
//! use mmake::cli::{Cli, Commands};
//! use mmake::commands;
//!
//! let cli = Cli::builder()
//!     .base_dir("/srv/sugar")
//!     .verbose(1)
//!     .command(Commands::Build { stamp_policy: None })
//!     .build()?;
//!
//! commands::execute(&cli)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! The crate uses `thiserror` for strongly-typed errors and `miette` for
//! diagnostic output in the CLI. Every error aborts the run; artifacts and
//! stamps written before it stay on disk.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod orchestrator;
pub mod resolver;
pub mod runner;
pub mod stamps;
pub mod vcs;

// Internal modules
mod hashing;
mod logging;

pub use logging::Logger;
