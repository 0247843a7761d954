#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use mmake::cli::{Cli, Commands};
use mmake::commands::execute_with_dir;
use mmake::error::Result;

/// A base directory with a manifest, module sources and recipes.
pub struct TestProject {
    dir: TempDir,
    modules: Vec<(String, Vec<String>)>,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            modules: Vec::new(),
        }
    }

    /// Adds a module with one source file and a recipe that appends the
    /// module name to `build/runs.log`, then runs `script`.
    pub fn module(mut self, name: &str, deps: &[&str], script: &str) -> Self {
        self.child(name)
            .child("main.c")
            .write_str(&format!("/* {name} */\n"))
            .unwrap();
        self.child(format!("recipes/{name}.sh"))
            .write_str(&format!(
                "echo {name} >> \"$BUILD_DIR/../../runs.log\"\n{script}\n"
            ))
            .unwrap();
        self.modules.push((
            name.to_string(),
            deps.iter().map(|d| d.to_string()).collect(),
        ));
        self.write_manifest();
        self
    }

    fn write_manifest(&self) {
        let entries: Vec<String> = self
            .modules
            .iter()
            .map(|(name, deps)| {
                let deps: Vec<String> = deps.iter().map(|d| format!("\"{d}\"")).collect();
                format!(
                    "        \"{name}\": {{ \"dependencies\": [{}], \"recipe\": \"recipes/{name}.sh\" }}",
                    deps.join(", ")
                )
            })
            .collect();
        self.child("manifest.json")
            .write_str(&format!(
                "{{\n    \"modules\": {{\n{}\n    }}\n}}\n",
                entries.join(",\n")
            ))
            .unwrap();
    }

    /// Module names in the order their recipes ran, across all runs.
    pub fn runs(&self) -> Vec<String> {
        fs::read_to_string(self.path().join("build/runs.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn edit(&self, module: &str, content: &str) {
        self.child(module).child("main.c").write_str(content).unwrap();
    }

    pub fn run(&self, command: Commands) -> Result<()> {
        run_in(self.path(), command)
    }
}

impl std::ops::Deref for TestProject {
    type Target = TempDir;

    fn deref(&self) -> &Self::Target {
        &self.dir
    }
}

/// Executes `command` with `base_dir` as the base directory.
pub fn run_in(base_dir: &Path, command: Commands) -> Result<()> {
    let cli = Cli::builder()
        .base_dir(base_dir)
        .quiet(true)
        .command(command)
        .build()?;
    execute_with_dir(&cli, Some(base_dir))
}

pub fn build() -> Commands {
    Commands::Build { stamp_policy: None }
}
