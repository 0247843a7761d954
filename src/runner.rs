//! Recipe execution.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::context::RecipeEnv;
use crate::error::{MmakeError, Result};

/// Everything needed to run one module's recipe.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub module: &'a str,
    pub recipe: &'a Path,
    /// Working directory for the recipe (the module's source tree).
    pub working_dir: &'a Path,
    pub env: &'a RecipeEnv,
}

/// How a recipe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeStatus {
    Success,
    /// Non-zero exit; `code` is `None` when the process was killed by a
    /// signal.
    Failed { code: Option<i32> },
}

impl From<ExitStatus> for RecipeStatus {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            RecipeStatus::Success
        } else {
            RecipeStatus::Failed {
                code: status.code(),
            }
        }
    }
}

/// Runs recipes. Blocks until the recipe has finished.
pub trait Runner {
    /// Runs the recipe described by `invocation`.
    ///
    /// A recipe that runs and fails is reported through the returned
    /// status; `Err` is reserved for failing to run it at all. The build
    /// stops on `Err` without touching the module's stamp.
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<RecipeStatus>;
}

impl<R: Runner + ?Sized> Runner for &mut R {
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<RecipeStatus> {
        (**self).invoke(invocation)
    }
}

/// Runs each recipe as `sh <recipe>` with no arguments.
///
/// The recipe inherits mmake's environment and standard streams, plus the
/// variables from its [`RecipeEnv`].
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner for ShellRunner {
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<RecipeStatus> {
        let status = Command::new(&self.shell)
            .arg(invocation.recipe)
            .current_dir(invocation.working_dir)
            .envs(invocation.env.iter())
            .status()
            .map_err(|source| MmakeError::IoError {
                path: invocation.recipe.to_path_buf(),
                source,
            })?;

        Ok(status.into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::context::{BuildContext, BuildLayout, ModulePaths};
    use crate::manifest::{Module, Settings};

    struct Fixture {
        _dir: TempDir,
        paths: ModulePaths,
        env: RecipeEnv,
    }

    fn fixture(script: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let layout = BuildLayout::new(dir.path(), &Settings::default());
        let module = Module::new("glib", Vec::<String>::new(), "glib.sh");
        let paths = layout.module_paths(&module);
        fs::create_dir_all(&paths.source_dir).unwrap();
        fs::create_dir_all(&paths.build_dir).unwrap();
        fs::write(&paths.recipe, script).unwrap();
        let env = BuildContext::from_env(&layout.install_dir)
            .unwrap()
            .recipe_env(&paths);
        Fixture {
            _dir: dir,
            paths,
            env,
        }
    }

    fn run(fixture: &Fixture) -> Result<RecipeStatus> {
        ShellRunner::new().invoke(&Invocation {
            module: "glib",
            recipe: &fixture.paths.recipe,
            working_dir: &fixture.paths.source_dir,
            env: &fixture.env,
        })
    }

    #[test]
    fn test_recipe_sees_environment_and_working_dir() {
        let fixture = fixture(
            "echo \"$SOURCE_DIR|$BUILD_DIR|$INSTALL_DIR\" > \"$BUILD_DIR/env.txt\"\npwd > \
             \"$BUILD_DIR/pwd.txt\"\n",
        );

        assert_eq!(run(&fixture).unwrap(), RecipeStatus::Success);

        let env = fs::read_to_string(fixture.paths.build_dir.join("env.txt")).unwrap();
        assert_eq!(
            env.trim(),
            format!(
                "{}|{}|{}",
                fixture.paths.source_dir.display(),
                fixture.paths.build_dir.display(),
                fixture.paths.install_dir.display()
            )
        );
        let pwd = fs::read_to_string(fixture.paths.build_dir.join("pwd.txt")).unwrap();
        assert_eq!(
            fs::canonicalize(pwd.trim()).unwrap(),
            fs::canonicalize(&fixture.paths.source_dir).unwrap()
        );
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let fixture = fixture("exit 3\n");
        assert_eq!(
            run(&fixture).unwrap(),
            RecipeStatus::Failed { code: Some(3) }
        );
    }

    #[test]
    fn test_missing_shell_is_an_io_error() {
        let fixture = fixture("exit 0\n");
        let result = ShellRunner::with_shell("/nonexistent/shell").invoke(&Invocation {
            module: "glib",
            recipe: &fixture.paths.recipe,
            working_dir: &fixture.paths.source_dir,
            env: &fixture.env,
        });
        assert!(matches!(result, Err(MmakeError::IoError { .. })));
    }
}
