//! Migration levels.
//!
//! Modules are peeled off in rounds: every module with no outstanding
//! dependency forms the next level. When a round finds none (a cycle is
//! blocking progress) one module is forced into the level and its
//! outstanding dependencies are recorded as broken edges.
//!
//! # Deadlock rule
//!
//! The forced module is the one with the fewest outstanding dependencies,
//! ties going to the lexicographically smallest name. An outstanding
//! dependency of the forced module whose own outstanding dependencies all
//! point back at the forced module joins the same level, so a two-module
//! loop lands in one level with a single broken edge.

use crate::dependency_graph::{CycleEdge, DependencyGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPartition {
    /// Level 0 first. Every module appears in exactly one level.
    pub levels: Vec<BTreeSet<String>>,
    /// Edges that had to be ignored to make progress through a cycle.
    pub broken_edges: BTreeSet<CycleEdge>,
}

impl LevelPartition {
    pub fn level_of(&self, module: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(module))
    }

    pub fn is_circular(&self, module: &str) -> bool {
        self.broken_edges.iter().any(|e| e.touches(module))
    }

    pub fn module_count(&self) -> usize {
        self.levels.iter().map(BTreeSet::len).sum()
    }
}

/// Partition the graph into dependency levels.
#[instrument(skip_all, fields(modules = graph.len()))]
pub fn build_levels(graph: &DependencyGraph) -> LevelPartition {
    let mut remaining: BTreeMap<&str, Vec<&str>> = graph
        .modules()
        .map(|m| {
            (
                m.name.as_str(),
                m.dependencies.iter().map(String::as_str).collect(),
            )
        })
        .collect();

    let mut levels: Vec<BTreeSet<String>> = Vec::new();
    let mut broken_edges = BTreeSet::new();

    while !remaining.is_empty() {
        let mut level: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(&name, _)| name)
            .collect();

        if level.is_empty() {
            level = break_deadlock(&remaining, &mut broken_edges);
        }

        for module in &level {
            remaining.remove(module);
        }
        for deps in remaining.values_mut() {
            deps.retain(|d| !level.contains(d));
        }

        debug!(level = levels.len(), size = level.len(), "level assigned");
        levels.push(level.into_iter().map(str::to_owned).collect());
    }

    debug!(
        levels = levels.len(),
        broken = broken_edges.len(),
        "level partition finished"
    );
    LevelPartition {
        levels,
        broken_edges,
    }
}

fn break_deadlock<'g>(
    remaining: &BTreeMap<&'g str, Vec<&'g str>>,
    broken_edges: &mut BTreeSet<CycleEdge>,
) -> BTreeSet<&'g str> {
    let Some((&forced, outstanding)) = remaining
        .iter()
        .min_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.0.cmp(b.0)))
    else {
        return BTreeSet::new();
    };

    debug!(
        module = forced,
        outstanding = outstanding.len(),
        "forcing module to break a dependency cycle"
    );

    let mut level = BTreeSet::from([forced]);
    for &dependency in outstanding {
        if !remaining.contains_key(dependency) {
            continue;
        }
        broken_edges.insert(CycleEdge::new(forced, dependency));

        let closes_on_forced = dependency != forced
            && remaining
                .get(dependency)
                .is_some_and(|deps| deps.iter().all(|&d| d == forced));
        if closes_on_forced {
            level.insert(dependency);
        }
    }

    level
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleKind {
    External,
    Local,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::External => f.write_str("External"),
            ModuleKind::Local => f.write_str("Local"),
        }
    }
}

/// One line of the migration-order table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRow {
    pub level: usize,
    pub kind: ModuleKind,
    pub module: String,
    /// Declared dependencies sorted and comma-joined, duplicates kept.
    pub signature: String,
    pub dependency_count: usize,
    pub circular: bool,
}

/// Flatten a partition into table rows.
///
/// Within a level, modules sharing a dependency signature are grouped;
/// groups are ordered by dependency count and then signature, and inside a
/// group external modules come before local ones, each sorted by name.
pub fn migration_order(graph: &DependencyGraph, partition: &LevelPartition) -> Vec<MigrationRow> {
    let mut rows = Vec::with_capacity(partition.module_count());

    for (level, modules) in partition.levels.iter().enumerate() {
        let mut groups: BTreeMap<(usize, String), Vec<(ModuleKind, &str)>> = BTreeMap::new();

        for name in modules {
            let Some(module) = graph.get(name) else {
                continue;
            };
            let mut deps: Vec<&str> = module.dependencies.iter().map(String::as_str).collect();
            deps.sort_unstable();

            let kind = if module.is_external {
                ModuleKind::External
            } else {
                ModuleKind::Local
            };
            groups
                .entry((deps.len(), deps.join(",")))
                .or_default()
                .push((kind, name.as_str()));
        }

        for ((dependency_count, signature), mut members) in groups {
            members.sort_unstable();
            for (kind, module) in members {
                rows.push(MigrationRow {
                    level,
                    kind,
                    module: module.to_string(),
                    signature: signature.clone(),
                    dependency_count,
                    circular: partition.is_circular(module),
                });
            }
        }
    }

    rows
}
