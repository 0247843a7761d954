use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::context::{BuildContext, BuildLayout, RecipeEnv};
use crate::error::{MmakeError, Result};
use crate::fingerprint::{FingerprintMode, Fingerprinter, TreeFingerprinter};
use crate::logging::Logger;
use crate::manifest::{Module, ModuleGraph, Settings};
use crate::orchestrator::{BuildReport, ModuleOutcome, Orchestrator, StampPolicy};
use crate::runner::{Invocation, RecipeStatus, Runner};
use crate::stamps::StampStore;

/// Records invocations instead of running anything.
#[derive(Default)]
struct FakeRunner {
    calls: Vec<String>,
    envs: Vec<RecipeEnv>,
    /// Modules whose recipe exits with the given code.
    failures: HashMap<String, i32>,
    /// Modules whose recipe writes a file into its own source tree.
    dirty_sources: HashSet<String>,
    /// Modules whose recipe cannot be started.
    unstartable: HashSet<String>,
}

impl FakeRunner {
    fn failing(module: &str, code: i32) -> Self {
        Self {
            failures: HashMap::from([(module.to_string(), code)]),
            ..Self::default()
        }
    }
}

impl Runner for FakeRunner {
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<RecipeStatus> {
        self.calls.push(invocation.module.to_string());
        self.envs.push(invocation.env.clone());
        if self.unstartable.contains(invocation.module) {
            return Err(MmakeError::IoError {
                path: invocation.recipe.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        if self.dirty_sources.contains(invocation.module) {
            fs::write(invocation.working_dir.join("generated.h"), "#define BUILT 1").unwrap();
        }
        Ok(match self.failures.get(invocation.module) {
            Some(&code) => RecipeStatus::Failed { code: Some(code) },
            None => RecipeStatus::Success,
        })
    }
}

/// A base directory with one source tree and recipe per module.
struct Workspace {
    dir: TempDir,
    graph: ModuleGraph,
}

impl Workspace {
    fn new(modules: &[(&str, &[&str])]) -> Self {
        let dir = TempDir::new().unwrap();
        let graph = ModuleGraph::from_modules(modules.iter().map(|(name, deps)| {
            Module::new(*name, deps.iter().copied(), format!("recipes/{name}.sh"))
        }))
        .unwrap();

        fs::create_dir_all(dir.path().join("recipes")).unwrap();
        for module in graph.iter() {
            let source = dir.path().join(&module.name);
            fs::create_dir_all(&source).unwrap();
            fs::write(source.join("main.c"), format!("/* {} */", module.name)).unwrap();
            fs::write(dir.path().join(&module.recipe), "exit 0\n").unwrap();
        }

        Self { dir, graph }
    }

    fn base(&self) -> &Path {
        self.dir.path()
    }

    fn layout(&self) -> BuildLayout {
        BuildLayout::new(self.base(), &Settings::default())
    }

    fn stamps(&self) -> StampStore {
        StampStore::new(self.layout().stamps_dir, Logger::new(0, true))
    }

    fn build(&self, runner: &mut FakeRunner) -> Result<BuildReport> {
        self.build_with(runner, StampPolicy::Always)
    }

    fn build_with(&self, runner: &mut FakeRunner, policy: StampPolicy) -> Result<BuildReport> {
        let layout = self.layout();
        let context = BuildContext::new(&layout.install_dir, None).unwrap();
        Orchestrator::new(layout, TreeFingerprinter::new(FingerprintMode::Content), runner)
            .stamp_policy(policy)
            .context(context)
            .logger(Logger::new(0, true))
            .build(&self.graph)
    }

    fn edit(&self, module: &str, content: &str) {
        fs::write(self.base().join(module).join("main.c"), content).unwrap();
    }
}

#[test]
fn test_first_run_builds_everything_in_order() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    let mut runner = FakeRunner::default();

    let report = ws.build(&mut runner).unwrap();

    assert_eq!(report.order, vec!["A", "B"]);
    assert_eq!(runner.calls, vec!["A", "B"]);
    assert_eq!(report.rebuilt(), vec!["A", "B"]);
    assert!(ws.stamps().read("A").unwrap().is_some());
    assert!(ws.stamps().read("B").unwrap().is_some());
    assert_eq!(fs::read_dir(ws.layout().stamps_dir).unwrap().count(), 2);
}

#[test]
fn test_second_run_with_no_changes_invokes_nothing() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    ws.build(&mut FakeRunner::default()).unwrap();
    let stamp_a = ws.stamps().read("A").unwrap();
    let stamp_b = ws.stamps().read("B").unwrap();

    let mut runner = FakeRunner::default();
    let report = ws.build(&mut runner).unwrap();

    assert_eq!(report.order, vec!["A", "B"]);
    assert!(runner.calls.is_empty());
    assert_eq!(report.skipped(), vec!["A", "B"]);
    assert_eq!(ws.stamps().read("A").unwrap(), stamp_a);
    assert_eq!(ws.stamps().read("B").unwrap(), stamp_b);
}

#[test]
fn test_cycle_runs_no_recipes() {
    let ws = Workspace::new(&[("A", &["B"]), ("B", &["A"])]);
    let mut runner = FakeRunner::default();

    let err = ws.build(&mut runner).unwrap_err();

    assert!(matches!(err, MmakeError::CyclicDependency { .. }));
    assert!(runner.calls.is_empty());
    assert_eq!(ws.stamps().read("A").unwrap(), None);
    assert_eq!(ws.stamps().read("B").unwrap(), None);
}

#[test]
fn test_failed_recipe_aborts_and_still_stamps() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    let mut runner = FakeRunner::failing("A", 1);

    let err = ws.build(&mut runner).unwrap_err();

    match err {
        MmakeError::RecipeFailed { module, code, .. } => {
            assert_eq!(module, "A");
            assert_eq!(code, Some(1));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(runner.calls, vec!["A"]);
    assert!(ws.stamps().read("A").unwrap().is_some());
    assert_eq!(ws.stamps().read("B").unwrap(), None);

    // With the failure recorded, an unchanged A is not retried
    let mut rerun = FakeRunner::default();
    ws.build(&mut rerun).unwrap();
    assert_eq!(rerun.calls, vec!["B"]);
}

#[test]
fn test_on_success_policy_retries_failed_module() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    let mut runner = FakeRunner::failing("A", 2);

    let err = ws
        .build_with(&mut runner, StampPolicy::OnSuccess)
        .unwrap_err();

    assert!(matches!(err, MmakeError::RecipeFailed { .. }));
    assert_eq!(ws.stamps().read("A").unwrap(), None);

    let mut rerun = FakeRunner::default();
    ws.build_with(&mut rerun, StampPolicy::OnSuccess).unwrap();
    assert_eq!(rerun.calls, vec!["A", "B"]);
}

#[test]
fn test_on_success_policy_keeps_previous_stamp() {
    let ws = Workspace::new(&[("A", &[])]);
    ws.build(&mut FakeRunner::default()).unwrap();
    let before = ws.stamps().read("A").unwrap();

    ws.edit("A", "/* broken */");
    let mut runner = FakeRunner::failing("A", 1);
    assert!(ws.build_with(&mut runner, StampPolicy::OnSuccess).is_err());

    assert_eq!(ws.stamps().read("A").unwrap(), before);
}

#[test]
fn test_absent_stamp_forces_rebuild() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"]), ("C", &[])]);
    ws.build(&mut FakeRunner::default()).unwrap();

    ws.stamps().remove("B").unwrap();
    let mut runner = FakeRunner::default();
    let report = ws.build(&mut runner).unwrap();

    assert_eq!(runner.calls, vec!["B"]);
    assert_eq!(
        report.outcomes,
        vec![
            ("A".to_string(), ModuleOutcome::Skipped),
            ("C".to_string(), ModuleOutcome::Skipped),
            ("B".to_string(), ModuleOutcome::Rebuilt),
        ]
    );
}

#[test]
fn test_only_changed_module_is_rebuilt() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"]), ("C", &["B"])]);
    ws.build(&mut FakeRunner::default()).unwrap();

    ws.edit("B", "/* B, edited */");
    let mut runner = FakeRunner::default();
    ws.build(&mut runner).unwrap();

    assert_eq!(runner.calls, vec!["B"]);
}

#[test]
fn test_manifest_order_does_not_override_dependencies() {
    let ws = Workspace::new(&[("C", &["B"]), ("A", &[]), ("B", &["A"])]);
    let mut runner = FakeRunner::default();

    let report = ws.build(&mut runner).unwrap();

    assert_eq!(report.order, vec!["A", "B", "C"]);
    assert_eq!(runner.calls, vec!["A", "B", "C"]);
}

#[test]
fn test_external_dependency_is_ignored() {
    let ws = Workspace::new(&[("app", &["glibc"])]);
    let mut runner = FakeRunner::default();

    let report = ws.build(&mut runner).unwrap();

    assert_eq!(report.order, vec!["app"]);
    assert_eq!(runner.calls, vec!["app"]);
}

#[test]
fn test_recipe_editing_its_source_stamps_post_build_state() {
    let ws = Workspace::new(&[("A", &[])]);
    let mut runner = FakeRunner {
        dirty_sources: HashSet::from(["A".to_string()]),
        ..FakeRunner::default()
    };

    ws.build(&mut runner).unwrap();

    let fingerprinter = TreeFingerprinter::new(FingerprintMode::Content);
    let now = fingerprinter.fingerprint(&ws.base().join("A")).unwrap();
    assert_eq!(ws.stamps().read("A").unwrap(), Some(now));

    let mut rerun = FakeRunner::default();
    ws.build(&mut rerun).unwrap();
    assert!(rerun.calls.is_empty());
}

#[test]
fn test_missing_recipe_fails_before_any_module() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    fs::remove_file(ws.base().join("recipes/B.sh")).unwrap();
    let mut runner = FakeRunner::default();

    let err = ws.build(&mut runner).unwrap_err();

    assert!(matches!(err, MmakeError::MissingRecipe { ref module, .. } if module == "B"));
    assert!(runner.calls.is_empty());
    assert_eq!(ws.stamps().read("A").unwrap(), None);
}

#[test]
fn test_missing_source_dir() {
    let ws = Workspace::new(&[("A", &[])]);
    fs::remove_dir_all(ws.base().join("A")).unwrap();

    let err = ws.build(&mut FakeRunner::default()).unwrap_err();
    assert!(matches!(err, MmakeError::SourceDirMissing { .. }));
}

#[test]
fn test_build_dirs_exist_for_every_module() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    ws.build(&mut FakeRunner::default()).unwrap();
    fs::remove_dir_all(ws.layout().work_dir).unwrap();

    // Both modules are fresh, their build directories are still recreated
    ws.build(&mut FakeRunner::default()).unwrap();
    assert!(ws.layout().work_dir.join("A").is_dir());
    assert!(ws.layout().work_dir.join("B").is_dir());
    assert!(ws.layout().install_dir.is_dir());
}

#[test]
fn test_recipes_share_run_wide_environment() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    let mut runner = FakeRunner::default();
    ws.build(&mut runner).unwrap();

    let layout = ws.layout();
    let [a, b] = runner.envs.as_slice() else {
        panic!("expected two invocations");
    };
    for name in ["PATH", "LD_LIBRARY_PATH", "PKG_CONFIG_PATH", "ACLOCAL_FLAGS", "INSTALL_DIR"] {
        assert_eq!(a.get(name), b.get(name), "{name} differs between modules");
    }
    assert_eq!(a.get("INSTALL_DIR"), Some(layout.install_dir.as_os_str()));
    assert_eq!(a.get("SOURCE_DIR"), Some(ws.base().join("A").as_os_str()));
    assert_eq!(b.get("BUILD_DIR"), Some(layout.work_dir.join("B").as_os_str()));
}

#[test]
fn test_unstartable_recipe_records_no_stamp() {
    let ws = Workspace::new(&[("A", &[]), ("B", &["A"])]);
    ws.build(&mut FakeRunner::default()).unwrap();
    let stamp_a = ws.stamps().read("A").unwrap();
    fs::remove_file(ws.layout().stamps_dir.join("B")).unwrap();
    ws.edit("A", "/* A, edited */");

    for policy in [StampPolicy::Always, StampPolicy::OnSuccess] {
        let mut runner = FakeRunner {
            unstartable: HashSet::from(["A".to_string(), "B".to_string()]),
            ..FakeRunner::default()
        };

        let err = ws.build_with(&mut runner, policy).unwrap_err();

        assert!(matches!(err, MmakeError::IoError { .. }));
        assert_eq!(runner.calls, vec!["A"]);
        assert_eq!(ws.stamps().read("A").unwrap(), stamp_a);
        assert!(ws.stamps().read("B").unwrap().is_none());
    }
}
