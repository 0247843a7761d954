//! Manifest loading and the module graph.
//!
//! A manifest is a JSON document in the base directory:
//!
//! ```json
//! {
//!     "settings": { "build_dir": "build", "stamp_policy": "always" },
//!     "modules": {
//!         "glib": { "dependencies": [], "recipe": "recipes/glib.sh" },
//!         "gtk": { "dependencies": ["glib"], "recipe": "recipes/gtk.sh" }
//!     }
//! }
//! ```
//!
//! The older flat layout, where the top-level object maps module names
//! directly to `{ "build": ... }` entries, is also accepted. Flat manifests
//! may declare modules named `modules` or `settings`; the layout is told
//! apart by whether every top-level value is a module entry. Module order is
//! the declaration order in the file; the resolver uses it to break ties.
//!
//! No module may be named after the first component of `build_dir`, since
//! that directory holds the build output.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MmakeError, Result};
use crate::fingerprint::FingerprintMode;
use crate::orchestrator::StampPolicy;


/// Default manifest file name inside the base directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A named build unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Unique name; also the source directory name and the stamp key.
    pub name: String,
    /// Names of modules that must be built first. Names missing from the
    /// manifest are treated as provided from outside.
    pub dependencies: Vec<String>,
    /// Recipe path relative to the base directory.
    pub recipe: PathBuf,
}

impl Module {
    pub fn new<I, S>(name: impl Into<String>, dependencies: I, recipe: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            recipe: recipe.into(),
        }
    }
}

/// All modules of one run, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    index: HashMap<String, usize>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from modules in the given order.
    pub fn from_modules(modules: impl IntoIterator<Item = Module>) -> Result<Self> {
        let mut graph = Self::new();
        for module in modules {
            graph.insert(module)?;
        }
        Ok(graph)
    }

    /// Appends a module, rejecting duplicate names.
    pub fn insert(&mut self, module: Module) -> Result<()> {
        if self.index.contains_key(&module.name) {
            return Err(MmakeError::DuplicateModule(module.name));
        }
        self.index.insert(module.name.clone(), self.modules.len());
        self.modules.push(module);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Modules in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Layout and policy settings from the manifest's `settings` block.
///
/// Directory names are relative: `build_dir` to the base directory, the
/// others to `build_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub stamps_dir: PathBuf,
    pub work_dir: PathBuf,
    pub fingerprint: FingerprintMode,
    pub stamp_policy: StampPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            install_dir: PathBuf::from("install"),
            stamps_dir: PathBuf::from("stamps"),
            work_dir: PathBuf::from("work"),
            fingerprint: FingerprintMode::default(),
            stamp_policy: StampPolicy::default(),
        }
    }
}

/// A loaded manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub settings: Settings,
    pub graph: ModuleGraph,
}

#[derive(Deserialize)]
struct ModuleEntry {
    #[serde(default, alias = "deps")]
    dependencies: Vec<String>,
    #[serde(alias = "build")]
    recipe: PathBuf,
}

impl Manifest {
    /// Reads and parses the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| MmakeError::MissingConfiguration {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parses manifest text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let invalid = |message: String| MmakeError::InvalidManifest {
            path: path.to_path_buf(),
            message,
        };

        let value: Value = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(mut root) = value else {
            return Err(invalid("expected a JSON object at the top level".to_string()));
        };

        let (settings, modules) = if is_structured(&root) {
            let settings = match root.remove("settings") {
                Some(value) => serde_json::from_value(value)
                    .map_err(|e| invalid(format!("settings: {e}")))?,
                None => Settings::default(),
            };
            let modules = match root.remove("modules") {
                Some(Value::Object(modules)) => modules,
                Some(_) => return Err(invalid("'modules' must be an object".to_string())),
                None => Map::new(),
            };
            (settings, modules)
        } else {
            (Settings::default(), root)
        };

        let reserved = reserved_name(&settings);
        let mut graph = ModuleGraph::new();
        for (name, entry) in modules {
            validate_module_name(&name).map_err(&invalid)?;
            if reserved.as_deref() == Some(name.as_str()) {
                return Err(invalid(format!(
                    "module '{name}' would use the build directory as its source tree"
                )));
            }
            let entry: ModuleEntry = serde_json::from_value(entry)
                .map_err(|e| invalid(format!("module '{name}': {e}")))?;
            graph.insert(Module {
                name,
                dependencies: entry.dependencies,
                recipe: entry.recipe,
            })?;
        }

        Ok(Self { settings, graph })
    }
}

/// A flat manifest maps every key to a module entry, which always names its
/// recipe with a string. Anything else with a `modules` or `settings` key is
/// the structured layout.
fn is_structured(root: &Map<String, Value>) -> bool {
    let is_module_entry = |value: &Value| {
        value.as_object().is_some_and(|entry| {
            ["recipe", "build"]
                .iter()
                .any(|key| entry.get(*key).is_some_and(Value::is_string))
        })
    };

    (root.contains_key("modules") || root.contains_key("settings"))
        && !root.values().all(is_module_entry)
}

/// The source tree of a module named after the top of the build directory
/// would contain its own stamps.
fn reserved_name(settings: &Settings) -> Option<String> {
    match settings.build_dir.components().next()? {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

fn validate_module_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(format!("module name '{name}' must be a plain directory name"));
    }
    Ok(())
}

/// Rewrites the manifest pretty-printed with four-space indentation and a
/// trailing newline. Key order, and therefore module order, is kept.
///
/// Returns `true` if the file content changed.
pub fn format_manifest(path: &Path) -> Result<bool> {
    let original = fs::read_to_string(path).map_err(|source| MmakeError::MissingConfiguration {
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = serde_json::from_str(&original).map_err(|e| MmakeError::InvalidManifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let formatted = to_pretty_json(&value).map_err(|e| MmakeError::InvalidManifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if formatted == original {
        return Ok(false);
    }

    fs::write(path, formatted).map_err(|source| MmakeError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

fn to_pretty_json(value: &Value) -> serde_json::Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
