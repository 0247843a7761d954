//! Error types for mmake.
//!
//! This module defines all error types used throughout mmake, using a
//! combination of `thiserror` for ergonomic error definitions and `miette`
//! for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors derive from [`MmakeError`]
//! - Each variant includes a helpful message and a diagnostic code
//! - Nothing is retried: every error aborts the run
//! - Errors are converted to `miette::Result` by the binary for CLI output
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use mmake::error::{MmakeError, Result};
//!
//! fn check_recipe(module: &str, recipe: &Path) -> Result<()> {
//!     if !recipe.is_file() {
//!         return Err(MmakeError::MissingRecipe {
//!             module: module.to_string(),
//!             path: recipe.to_path_buf(),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur in mmake operations
#[derive(Error, Debug, Diagnostic)]
pub enum MmakeError {
    /// The module graph contains a dependency cycle.
    ///
    /// Raised by the resolver before any recipe runs. `modules` lists every
    /// module that could not be ordered, in manifest declaration order; the
    /// cycle is among them.
    #[error("Cyclic dependency between modules: {}", .modules.join(", "))]
    #[diagnostic(
        code(mmake::resolve::cyclic_dependency),
        help("Remove one of the dependencies between the listed modules.")
    )]
    CyclicDependency {
        /// Modules left unresolved when no further progress was possible
        modules: Vec<String>,
    },

    /// A recipe exited with a non-zero status.
    ///
    /// The run stops at this module; later modules are not attempted.
    #[error("Recipe for module '{module}' failed ({})", describe_exit(.code))]
    #[diagnostic(
        code(mmake::build::recipe_failed),
        help("Fix the failing recipe and run 'mmake build' again.")
    )]
    RecipeFailed {
        /// Module whose recipe failed
        module: String,
        /// Path to the recipe that was run
        recipe: PathBuf,
        /// Exit code, or `None` if the process was killed by a signal
        code: Option<i32>,
    },

    /// The manifest could not be read.
    #[error("Cannot read manifest '{path}'")]
    #[diagnostic(
        code(mmake::config::missing),
        help("Run mmake from the directory containing manifest.json, or pass --manifest.")
    )]
    MissingConfiguration {
        /// Manifest path that was tried
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A module's recipe path does not point to a file.
    ///
    /// Checked for every module before the first recipe runs.
    #[error("Recipe for module '{module}' not found at '{path}'")]
    #[diagnostic(
        code(mmake::config::missing_recipe),
        help("Recipe paths in manifest.json are relative to the base directory.")
    )]
    MissingRecipe {
        /// Module declaring the recipe
        module: String,
        /// Resolved recipe path
        path: PathBuf,
    },

    /// The manifest is not valid JSON or does not have the expected shape.
    #[error("Invalid manifest '{path}': {message}")]
    #[diagnostic(code(mmake::config::invalid_manifest))]
    InvalidManifest {
        /// Manifest path
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// Two modules share a name.
    #[error("Module '{0}' is declared more than once")]
    #[diagnostic(code(mmake::config::duplicate_module))]
    DuplicateModule(
        /// The duplicated module name
        String,
    ),

    /// A module's source directory does not exist.
    #[error("Source directory for module '{module}' not found at '{path}'")]
    #[diagnostic(
        code(mmake::fingerprint::source_missing),
        help("Run 'mmake pull' to check out module sources.")
    )]
    SourceDirMissing {
        /// Module name
        module: String,
        /// Expected source directory
        path: PathBuf,
    },

    /// File system I/O error.
    ///
    /// Common causes: permission denied, disk full, or a recipe that
    /// cannot be spawned.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(mmake::io_error))]
    IoError {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A path expected to be a regular file is something else.
    #[error("Invalid file type for '{path}': {message}")]
    #[diagnostic(code(mmake::file::invalid_type))]
    InvalidFileType {
        /// The offending path
        path: PathBuf,
        /// Description of the file type issue
        message: String,
    },

    /// Git repository not found at the base directory.
    #[error("Git repository not found at '{0}'")]
    #[diagnostic(
        code(mmake::git::repo_not_found),
        help("'pull' and 'clean' operate on the git repository holding manifest.json.")
    )]
    RepoNotFound(
        /// The path where the repository was expected
        PathBuf,
    ),

    /// A module has no matching submodule in the base repository.
    #[error("No git submodule for module '{0}'")]
    #[diagnostic(
        code(mmake::git::submodule_not_found),
        help("Add the module with 'git submodule add <url> <module-name>'.")
    )]
    SubmoduleNotFound(
        /// Module name
        String,
    ),

    /// Any other libgit2 failure.
    #[error("Git operation failed")]
    #[diagnostic(code(mmake::git::error))]
    Git(#[from] git2::Error),

    /// Failed to serialize a stamp.
    #[error("Failed to serialize stamp for module '{module}'")]
    #[diagnostic(
        code(mmake::stamps::serialization_error),
        help("Delete the stamps directory to force a full rebuild.")
    )]
    SerializationError {
        /// Module whose stamp was being written
        module: String,
        /// The underlying rkyv error
        #[source]
        source: rkyv::rancor::BoxedError,
    },

    /// A stamp file could not be decoded.
    ///
    /// The stamp store treats this as "never built" and recovers on its own;
    /// it only escapes when decoding is requested directly.
    #[error("Failed to deserialize stamp for module '{module}'")]
    #[diagnostic(code(mmake::stamps::deserialization_error))]
    DeserializationError {
        /// Module whose stamp was being read
        module: String,
        /// The underlying rkyv error
        #[source]
        source: rkyv::rancor::BoxedError,
    },

    /// Invalid configuration or a stamp from a newer mmake.
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(mmake::config::error),
        help("Check the command line and the settings block of manifest.json.")
    )]
    ConfigError(
        /// Description of the configuration error
        String,
    ),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, MmakeError>;
