//! Directory layout and recipe environments.
//!
//! Recipes learn everything from environment variables. The run-wide part
//! (search paths into the shared install prefix) is computed once into a
//! [`BuildContext`]; each invocation adds its module's directories on top,
//! yielding a [`RecipeEnv`]. mmake never changes its own environment.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::error::{MmakeError, Result};
use crate::manifest::{Module, Settings};

pub const SOURCE_DIR: &str = "SOURCE_DIR";
pub const BUILD_DIR: &str = "BUILD_DIR";
pub const INSTALL_DIR: &str = "INSTALL_DIR";

/// Absolute locations of everything a run reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    /// Directory holding the manifest and the module source trees.
    pub base_dir: PathBuf,
    /// Root of all build output.
    pub build_dir: PathBuf,
    /// Shared installation prefix.
    pub install_dir: PathBuf,
    /// Where stamps are kept.
    pub stamps_dir: PathBuf,
    /// Parent of the per-module scratch directories.
    pub work_dir: PathBuf,
}

impl BuildLayout {
    /// Derives the layout from an absolute base directory and the manifest
    /// settings.
    pub fn new(base_dir: &Path, settings: &Settings) -> Self {
        let build_dir = base_dir.join(&settings.build_dir);
        Self {
            base_dir: base_dir.to_path_buf(),
            install_dir: build_dir.join(&settings.install_dir),
            stamps_dir: build_dir.join(&settings.stamps_dir),
            work_dir: build_dir.join(&settings.work_dir),
            build_dir,
        }
    }

    pub fn module_paths(&self, module: &Module) -> ModulePaths {
        ModulePaths {
            source_dir: self.base_dir.join(&module.name),
            build_dir: self.work_dir.join(&module.name),
            install_dir: self.install_dir.clone(),
            recipe: self.base_dir.join(&module.recipe),
        }
    }
}

/// Paths computed for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePaths {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub recipe: PathBuf,
}

/// Run-wide recipe environment, fixed before the first module builds.
///
/// Later modules find earlier modules' artifacts through these search paths,
/// which all point into the shared install prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    install_dir: PathBuf,
    vars: Vec<(String, OsString)>,
}

impl BuildContext {
    /// Builds the context for `install_dir`, prepending its `bin` directory
    /// to `inherited_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the install prefix contains the platform's path
    /// list separator.
    pub fn new(install_dir: &Path, inherited_path: Option<&OsStr>) -> Result<Self> {
        let join = |paths: Vec<PathBuf>| {
            std::env::join_paths(paths).map_err(|e| {
                MmakeError::ConfigError(format!(
                    "install directory '{}' cannot be used in a search path: {e}",
                    install_dir.display()
                ))
            })
        };

        let mut path = vec![install_dir.join("bin")];
        if let Some(inherited) = inherited_path {
            path.extend(std::env::split_paths(inherited));
        }

        let mut aclocal_flags = OsString::from("-I ");
        aclocal_flags.push(install_dir.join("share").join("aclocal"));

        let vars = vec![
            ("PATH".to_string(), join(path)?),
            (
                "LD_LIBRARY_PATH".to_string(),
                join(vec![install_dir.join("lib")])?,
            ),
            (
                "PKG_CONFIG_PATH".to_string(),
                join(vec![
                    install_dir.join("share").join("pkgconfig"),
                    install_dir.join("lib").join("pkgconfig"),
                ])?,
            ),
            ("ACLOCAL_FLAGS".to_string(), aclocal_flags),
        ];

        Ok(Self {
            install_dir: install_dir.to_path_buf(),
            vars,
        })
    }

    /// Same as [`BuildContext::new`], inheriting this process's `PATH`.
    pub fn from_env(install_dir: &Path) -> Result<Self> {
        Self::new(install_dir, std::env::var_os("PATH").as_deref())
    }

    /// Run-wide variables, identical for every module.
    pub fn vars(&self) -> &[(String, OsString)] {
        &self.vars
    }

    /// The complete environment for one module's recipe.
    pub fn recipe_env(&self, paths: &ModulePaths) -> RecipeEnv {
        let mut vars = self.vars.clone();
        vars.push((SOURCE_DIR.to_string(), paths.source_dir.clone().into()));
        vars.push((BUILD_DIR.to_string(), paths.build_dir.clone().into()));
        vars.push((INSTALL_DIR.to_string(), self.install_dir.clone().into()));
        RecipeEnv { vars }
    }
}

/// Variables set for a single recipe invocation, on top of the inherited
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeEnv {
    vars: Vec<(String, OsString)>,
}

impl RecipeEnv {
    pub fn get(&self, name: &str) -> Option<&OsStr> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_os_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OsStr)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_os_str()))
    }
}
