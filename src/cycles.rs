//! Circular dependency detection.
//!
//! Depth-first search in declared dependency order, rooted at every module in
//! name order. The visited set is shared by all roots, and each root stops at
//! the first cycle it closes. The result is therefore best-effort: it is
//! non-empty whenever the graph has a cycle, but a densely cyclic graph may
//! contain cycles whose edges are not reported.

use crate::dependency_graph::{DependencyGraph, Subgraph};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument};

pub use crate::dependency_graph::CycleEdge;

/// Collect the edges of the first cycle reachable from each unvisited root.
#[instrument(skip_all, fields(modules = graph.len()))]
pub fn detect_cycles(graph: &DependencyGraph) -> BTreeSet<CycleEdge> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycle_edges = BTreeSet::new();

    for root in graph.names() {
        if visited.contains(root) {
            continue;
        }

        if let Some(cycle) = first_cycle_from(graph, root, &mut visited) {
            debug!(root, cycle = %cycle.join(" -> "), "cycle closed");
            for pair in cycle.windows(2) {
                cycle_edges.insert(CycleEdge::new(pair[0], pair[1]));
            }
        }
    }

    debug!(edges = cycle_edges.len(), "cycle detection finished");
    cycle_edges
}

/// Walk from `root` until a dependency already on the current path is met.
///
/// Returns the closed path `[d, .., current, d]`, or `None` once every module
/// reachable from `root` (and not visited before) has been explored.
fn first_cycle_from<'g>(
    graph: &'g DependencyGraph,
    root: &'g str,
    visited: &mut HashSet<&'g str>,
) -> Option<Vec<&'g str>> {
    let mut path: Vec<&'g str> = vec![root];
    let mut on_path: HashSet<&'g str> = HashSet::from([root]);
    // (module, index of the next dependency to follow)
    let mut stack: Vec<(&'g str, usize)> = vec![(root, 0)];
    visited.insert(root);

    while let Some(frame) = stack.last_mut() {
        let (module, next) = *frame;

        let Some(dependency) = graph.dependencies_of(module).get(next) else {
            stack.pop();
            path.pop();
            on_path.remove(module);
            continue;
        };
        frame.1 += 1;
        let dependency = dependency.as_str();

        if on_path.contains(dependency) {
            let start = path.iter().position(|&m| m == dependency).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(dependency);
            return Some(cycle);
        }

        if visited.insert(dependency) {
            path.push(dependency);
            on_path.insert(dependency);
            stack.push((dependency, 0));
        }
    }

    None
}

/// Every module that is the source or target of a cycle edge.
pub fn circular_modules(edges: &BTreeSet<CycleEdge>) -> BTreeSet<String> {
    edges
        .iter()
        .flat_map(|e| [e.source.clone(), e.target.clone()])
        .collect()
}

/// The circular modules and all declared edges among them.
pub fn circular_subgraph(graph: &DependencyGraph, edges: &BTreeSet<CycleEdge>) -> Subgraph {
    graph.induced_subgraph(&circular_modules(edges), edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency_graph::{build_graph, RawDependencies};

    fn graph(entries: &[(&str, &[&str])]) -> DependencyGraph {
        let raw: RawDependencies = entries
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect();
        build_graph(&raw)
    }

    fn edges(pairs: &[(&str, &str)]) -> BTreeSet<CycleEdge> {
        pairs.iter().map(|&(s, t)| CycleEdge::new(s, t)).collect()
    }

    #[test]
    fn acyclic_chain_has_no_cycle_edges() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &[])]);
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let g = graph(&[("A", &["B", "C"]), ("B", &["D"]), ("C", &["D"])]);
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn two_module_loop() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        assert_eq!(detect_cycles(&g), edges(&[("A", "B"), ("B", "A")]));
    }

    #[test]
    fn self_loop_is_reported() {
        let g = graph(&[("A", &["A"])]);
        assert_eq!(detect_cycles(&g), edges(&[("A", "A")]));
    }

    #[test]
    fn cycle_below_an_acyclic_prefix() {
        // Only the B -> C -> D -> B loop is circular; A -> B is not.
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["D"]), ("D", &["B"])]);
        assert_eq!(
            detect_cycles(&g),
            edges(&[("B", "C"), ("C", "D"), ("D", "B")])
        );
    }

    #[test]
    fn independent_cycles_are_found_from_separate_roots() {
        let g = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &["D"]), ("D", &["C"])]);
        assert_eq!(
            detect_cycles(&g),
            edges(&[("A", "B"), ("B", "A"), ("C", "D"), ("D", "C")])
        );
    }

    #[test]
    fn root_stops_after_its_first_cycle() {
        // A -> B -> C closes B <-> C first; the longer loop through C -> A
        // is not reported.
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["B", "A"])]);
        let found = detect_cycles(&g);

        assert_eq!(found, edges(&[("B", "C"), ("C", "B")]));
        assert!(!found.contains(&CycleEdge::new("C", "A")));
    }

    #[test]
    fn external_leaves_never_take_part() {
        let g = graph(&[("A", &["ext", "B"]), ("B", &["A"])]);
        let found = detect_cycles(&g);
        assert!(found.iter().all(|e| !e.touches("ext")));
        assert!(!found.is_empty());
    }

    #[test]
    fn repeated_calls_are_independent() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        assert_eq!(detect_cycles(&g), detect_cycles(&g));
    }

    #[test]
    fn circular_subgraph_flags_cycle_edges() {
        let g = graph(&[("A", &["B"]), ("B", &["C", "A"]), ("C", &["B"])]);
        let found = detect_cycles(&g);
        let sub = circular_subgraph(&g, &found);

        assert_eq!(sub.modules, circular_modules(&found));
        for edge in &sub.edges {
            assert_eq!(
                edge.circular,
                found.contains(&CycleEdge::new(edge.source.clone(), edge.target.clone()))
            );
        }
    }

    #[test]
    fn empty_graph() {
        let g = graph(&[]);
        assert!(detect_cycles(&g).is_empty());
        assert!(circular_subgraph(&g, &BTreeSet::new()).modules.is_empty());
    }
}
