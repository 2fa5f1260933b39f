use anyhow::Context;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Module name -> declared dependency names, exactly as scanned or loaded.
///
/// This is also the on-disk format: a flat JSON object whose values are
/// arrays of strings.
pub type RawDependencies = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Declared order, duplicates kept.
    pub dependencies: Vec<String>,
    /// True when the module was only ever referenced as a dependency.
    pub is_external: bool,
}

/// A directed edge `source -> target` ("source depends on target") that
/// takes part in a dependency cycle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CycleEdge {
    pub source: String,
    pub target: String,
}

impl CycleEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn touches(&self, module: &str) -> bool {
        self.source == module || self.target == module
    }
}

impl std::fmt::Display for CycleEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// A set of modules together with the declared edges running between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    pub modules: BTreeSet<String>,
    pub edges: Vec<SubgraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphEdge {
    pub source: String,
    pub target: String,
    pub circular: bool,
}

/// A closed dependency graph: every dependency name resolves to a module.
///
/// Built once from a [`RawDependencies`] map and read-only afterwards. The
/// graph may contain cycles.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    modules: BTreeMap<String, Module>,
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Modules in name order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Declared dependencies of `name`, or an empty slice for unknown names.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.modules
            .get(name)
            .map(|m| m.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Modules whose dependency list mentions `name`.
    pub fn dependents_of(&self, name: &str) -> BTreeSet<&str> {
        let Some(&idx) = self.node_map.get(name) else {
            return BTreeSet::new();
        };

        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// Every `(module, dependency)` pair, module by module in name order and
    /// dependencies in declared order. Duplicate declarations repeat.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modules.values().flat_map(|m| {
            m.dependencies
                .iter()
                .map(move |d| (m.name.as_str(), d.as_str()))
        })
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.dependencies_of(source).iter().any(|d| d == target)
    }

    pub fn external_modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values().filter(|m| m.is_external)
    }

    /// Restrict the graph to `members`, keeping each declared edge between
    /// two members once. Edges found in `circular` are flagged.
    pub fn induced_subgraph(
        &self,
        members: &BTreeSet<String>,
        circular: &BTreeSet<CycleEdge>,
    ) -> Subgraph {
        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();

        for (source, target) in self.edges() {
            if !members.contains(source) || !members.contains(target) {
                continue;
            }
            if !seen.insert((source, target)) {
                continue;
            }
            let edge = CycleEdge::new(source, target);
            edges.push(SubgraphEdge {
                circular: circular.contains(&edge),
                source: edge.source,
                target: edge.target,
            });
        }

        Subgraph {
            modules: members.clone(),
            edges,
        }
    }

    /// Petgraph view of the graph, one node per module and one edge per
    /// declared dependency.
    pub fn as_petgraph(&self) -> &DiGraph<String, ()> {
        &self.graph
    }
}

/// Assembles a [`DependencyGraph`], synthesizing external modules for
/// dependencies that are never declared.
pub struct GraphBuilder {
    modules: BTreeMap<String, Module>,
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    #[instrument(skip_all, fields(declared = raw.len()))]
    pub fn build_graph(mut self, raw: &RawDependencies) -> DependencyGraph {
        self.add_declared_modules(raw);
        self.add_external_modules(raw);
        self.add_nodes();
        self.add_dependency_edges();

        debug!(
            modules = self.modules.len(),
            edges = self.graph.edge_count(),
            "dependency graph built"
        );

        DependencyGraph {
            modules: self.modules,
            graph: self.graph,
            node_map: self.node_map,
        }
    }

    fn add_declared_modules(&mut self, raw: &RawDependencies) {
        for (name, dependencies) in raw {
            self.modules.insert(
                name.clone(),
                Module {
                    name: name.clone(),
                    dependencies: dependencies.clone(),
                    is_external: false,
                },
            );
        }
    }

    fn add_external_modules(&mut self, raw: &RawDependencies) {
        for dependency in raw.values().flatten() {
            if raw.contains_key(dependency) || self.modules.contains_key(dependency) {
                continue;
            }
            self.modules.insert(
                dependency.clone(),
                Module {
                    name: dependency.clone(),
                    dependencies: Vec::new(),
                    is_external: true,
                },
            );
        }
    }

    fn add_nodes(&mut self) {
        for name in self.modules.keys() {
            let idx = self.graph.add_node(name.clone());
            self.node_map.insert(name.clone(), idx);
        }
    }

    fn add_dependency_edges(&mut self) {
        for module in self.modules.values() {
            let from = self.node_map[&module.name];
            for dependency in &module.dependencies {
                let to = self.node_map[dependency];
                self.graph.add_edge(from, to, ());
            }
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a closed dependency graph from a raw module map.
pub fn build_graph(raw: &RawDependencies) -> DependencyGraph {
    GraphBuilder::new().build_graph(raw)
}

/// Read a dependency map from a JSON file.
pub fn load_dependencies(path: &Path) -> crate::Result<RawDependencies> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read dependency map {}", path.display()))?;
    let raw: RawDependencies = serde_json::from_str(&content).with_context(|| {
        format!(
            "{} is not a JSON object of module name to dependency list",
            path.display()
        )
    })?;
    info!(path = %path.display(), modules = raw.len(), "loaded dependency map");
    Ok(raw)
}

/// Write a dependency map as pretty-printed JSON.
pub fn save_dependencies(path: &Path, raw: &RawDependencies) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(raw)?;
    fs::write(path, content)
        .with_context(|| format!("failed to write dependency map {}", path.display()))?;
    info!(path = %path.display(), modules = raw.len(), "saved dependency map");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_modules: usize,
    pub local_modules: usize,
    pub external_modules: usize,
    pub total_edges: usize,
    pub avg_degree: f64,
    /// Components of more than one module, plus self-referencing modules.
    pub strongly_connected_components: usize,
}

impl GraphStats {
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let total_modules = graph.len();
        let external_modules = graph.external_modules().count();
        let total_edges = graph.edges().count();

        let petgraph = graph.as_petgraph();
        let strongly_connected_components = tarjan_scc(petgraph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| petgraph.find_edge(n, n).is_some())
            })
            .count();

        Self {
            total_modules,
            local_modules: total_modules - external_modules,
            external_modules,
            total_edges,
            avg_degree: if total_modules > 0 {
                total_edges as f64 / total_modules as f64
            } else {
                0.0
            },
            strongly_connected_components,
        }
    }

    pub fn print_summary(&self) {
        println!("Dependency Graph Analysis:");
        println!("  Total modules: {}", self.total_modules);
        println!("    Local: {}", self.local_modules);
        println!("    External: {}", self.external_modules);
        println!("  Total edges: {}", self.total_edges);
        println!("  Average out-degree: {:.2}", self.avg_degree);
        println!(
            "  Cyclic components: {}",
            self.strongly_connected_components
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, &[&str])]) -> RawDependencies {
        entries
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn synthesizes_external_leaves() {
        let graph = build_graph(&raw(&[("sale", &["base", "product"]), ("product", &["base"])]));

        assert_eq!(graph.len(), 3);
        let base = graph.get("base").expect("base synthesized");
        assert!(base.is_external);
        assert!(base.dependencies.is_empty());
        assert!(!graph.get("sale").expect("sale declared").is_external);
        assert!(!graph.get("product").expect("product declared").is_external);
    }

    #[test]
    fn declared_module_with_empty_list_is_not_external() {
        let graph = build_graph(&raw(&[("base", &[]), ("web", &["base"])]));
        assert!(!graph.get("base").expect("base").is_external);
        assert_eq!(graph.external_modules().count(), 0);
    }

    #[test]
    fn keeps_declared_order_and_duplicates() {
        let graph = build_graph(&raw(&[("a", &["c", "b", "c"])]));

        assert_eq!(graph.dependencies_of("a"), ["c", "b", "c"]);
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges, vec![("a", "c"), ("a", "b"), ("a", "c")]);
    }

    #[test]
    fn dependents_are_reverse_edges() {
        let graph = build_graph(&raw(&[("a", &["c"]), ("b", &["c", "c"]), ("c", &[])]));

        let dependents: Vec<_> = graph.dependents_of("c").into_iter().collect();
        assert_eq!(dependents, vec!["a", "b"]);
        assert!(graph.dependents_of("a").is_empty());
        assert!(graph.dependents_of("missing").is_empty());
    }

    #[test]
    fn induced_subgraph_keeps_inner_edges_once() {
        let graph = build_graph(&raw(&[("a", &["b", "b", "c"]), ("b", &["a"]), ("c", &[])]));
        let members: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let circular: BTreeSet<CycleEdge> = [CycleEdge::new("b", "a")].into_iter().collect();

        let sub = graph.induced_subgraph(&members, &circular);

        assert_eq!(sub.modules, members);
        assert_eq!(
            sub.edges,
            vec![
                SubgraphEdge { source: "a".into(), target: "b".into(), circular: false },
                SubgraphEdge { source: "b".into(), target: "a".into(), circular: true },
            ]
        );
    }

    #[test]
    fn empty_map_builds_empty_graph() {
        let graph = build_graph(&RawDependencies::new());
        assert!(graph.is_empty());
        assert_eq!(graph.edges().count(), 0);
    }

    #[test]
    fn stats_count_cyclic_components_and_self_loops() {
        let graph = build_graph(&raw(&[
            ("a", &["b"]),
            ("b", &["a"]),
            ("c", &["c"]),
            ("d", &["e"]),
        ]));
        let stats = GraphStats::from_graph(&graph);

        assert_eq!(stats.total_modules, 5);
        assert_eq!(stats.external_modules, 1);
        assert_eq!(stats.local_modules, 4);
        assert_eq!(stats.total_edges, 4);
        assert_eq!(stats.strongly_connected_components, 2);
    }

    #[test]
    fn dependency_map_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("module_dependencies.json");
        let map = raw(&[("sale", &["base", "base"]), ("base", &[])]);

        save_dependencies(&path, &map).expect("save");
        let loaded = load_dependencies(&path).expect("load");

        assert_eq!(loaded, map);
    }

    #[test]
    fn rejects_nested_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"sale": {"depends": ["base"]}}"#).expect("write");

        let err = load_dependencies(&path).expect_err("nested object must fail");
        assert!(err.to_string().contains("bad.json"));
    }
}
