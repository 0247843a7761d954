//! Build order resolution.

use std::collections::HashSet;

use crate::error::{MmakeError, Result};
use crate::manifest::{Module, ModuleGraph};

/// Module names in the order they must be built.
pub type BuildOrder = Vec<String>;

/// Orders `graph` so that every module follows the modules it depends on.
///
/// Each pass takes every module whose dependencies are all resolved (or not
/// part of the graph) and appends them in declaration order, so modules
/// that become ready together keep their manifest order. A pass that makes
/// no progress means the remaining modules contain a cycle.
///
/// # Errors
///
/// Returns [`MmakeError::CyclicDependency`] naming the modules that could
/// not be ordered.
pub fn resolve(graph: &ModuleGraph) -> Result<BuildOrder> {
    Ok(resolve_modules(graph)?
        .into_iter()
        .map(|module| module.name.clone())
        .collect())
}

/// Like [`resolve`], but yields the modules themselves.
pub fn resolve_modules(graph: &ModuleGraph) -> Result<Vec<&Module>> {
    let mut pending: Vec<(&Module, Vec<&str>)> = graph
        .iter()
        .map(|module| {
            let deps = module
                .dependencies
                .iter()
                .map(String::as_str)
                .filter(|dep| graph.contains(dep))
                .collect();
            (module, deps)
        })
        .collect();
    let mut remaining: HashSet<&str> = graph.iter().map(|m| m.name.as_str()).collect();
    let mut order = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|(_, deps)| deps.iter().all(|dep| !remaining.contains(dep)));

        if ready.is_empty() {
            return Err(MmakeError::CyclicDependency {
                modules: blocked.iter().map(|(m, _)| m.name.clone()).collect(),
            });
        }

        for (module, _) in ready {
            remaining.remove(module.name.as_str());
            order.push(module);
        }
        pending = blocked;
    }

    Ok(order)
}
