//! Bounded-hop neighborhoods around a seed module.

use crate::dependency_graph::{CycleEdge, DependencyGraph, Subgraph};
use crate::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// How many hops to expand in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Depth {
    Limited(usize),
    /// Expand until no new module is reached.
    Unbounded,
}

impl Depth {
    fn allows(self, hop: usize) -> bool {
        match self {
            Depth::Limited(max) => hop < max,
            Depth::Unbounded => true,
        }
    }
}

impl FromStr for Depth {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("all") || s == "*" {
            return Ok(Depth::Unbounded);
        }

        if s.starts_with('-') {
            return Err(GraphError::InvalidArgument(format!(
                "depth must be non-negative, got {s}"
            )));
        }

        s.parse::<usize>().map(Depth::Limited).map_err(|e| {
            GraphError::InvalidArgument(format!(
                "depth must be a non-negative integer or 'unbounded', got '{s}': {e}"
            ))
        })
    }
}

impl TryFrom<i64> for Depth {
    type Error = GraphError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value).map(Depth::Limited).map_err(|_| {
            GraphError::InvalidArgument(format!("depth must be non-negative, got {value}"))
        })
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Limited(n) => write!(f, "{n}"),
            Depth::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// The seed plus every module within `depth` hops along dependency edges
/// (forward) or dependent edges (backward). The two directions expand
/// independently and are not mixed within one path.
#[instrument(skip(graph), fields(modules = graph.len()))]
pub fn extract_neighborhood(
    graph: &DependencyGraph,
    seed: &str,
    depth: Depth,
) -> GraphResult<BTreeSet<String>> {
    let Some(seed) = graph.get(seed).map(|m| m.name.as_str()) else {
        return Err(GraphError::UnknownModule(seed.to_string()));
    };

    let forward = expand(seed, depth, |module| {
        graph
            .dependencies_of(module)
            .iter()
            .map(String::as_str)
            .collect()
    });
    let backward = expand(seed, depth, |module| {
        graph.dependents_of(module).into_iter().collect()
    });

    debug!(
        forward = forward.len() - 1,
        backward = backward.len() - 1,
        "neighborhood expanded"
    );

    Ok(forward
        .into_iter()
        .chain(backward)
        .map(str::to_owned)
        .collect())
}

/// Breadth-first expansion from `seed`. Always contains `seed`.
fn expand<'g, F>(seed: &'g str, depth: Depth, mut step: F) -> BTreeSet<&'g str>
where
    F: FnMut(&'g str) -> Vec<&'g str>,
{
    let mut reached = BTreeSet::from([seed]);
    let mut frontier = vec![seed];
    let mut hop = 0;

    while depth.allows(hop) && !frontier.is_empty() {
        let mut next = Vec::new();
        for module in frontier {
            for neighbor in step(module) {
                if reached.insert(neighbor) {
                    next.push(neighbor);
                }
            }
        }
        frontier = next;
        hop += 1;
    }

    reached
}

/// A module's relation to the seed of a neighborhood query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Seed,
    /// Declared directly by the seed.
    Dependency,
    /// Declares the seed directly.
    Dependent,
    Other,
}

pub fn classify(graph: &DependencyGraph, seed: &str, module: &str) -> Role {
    if module == seed {
        Role::Seed
    } else if graph.has_edge(seed, module) {
        Role::Dependency
    } else if graph.has_edge(module, seed) {
        Role::Dependent
    } else {
        Role::Other
    }
}

/// The neighborhood with the declared edges among its members.
pub fn neighborhood_subgraph(
    graph: &DependencyGraph,
    neighborhood: &BTreeSet<String>,
    circular: &BTreeSet<CycleEdge>,
) -> Subgraph {
    graph.induced_subgraph(neighborhood, circular)
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

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn chain() -> DependencyGraph {
        graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["D"]), ("D", &[])])
    }

    #[test]
    fn depth_zero_is_the_seed() {
        let n = extract_neighborhood(&chain(), "B", Depth::Limited(0)).expect("known seed");
        assert_eq!(n, set(&["B"]));
    }

    #[test]
    fn one_hop_goes_both_ways() {
        let n = extract_neighborhood(&chain(), "B", Depth::Limited(1)).expect("known seed");
        assert_eq!(n, set(&["A", "B", "C"]));
    }

    #[test]
    fn two_hops_forward() {
        let n = extract_neighborhood(&chain(), "A", Depth::Limited(2)).expect("known seed");
        assert_eq!(n, set(&["A", "B", "C"]));
    }

    #[test]
    fn unbounded_reaches_everything_connected() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &[]), ("Z", &[])]);
        let n = extract_neighborhood(&g, "B", Depth::Unbounded).expect("known seed");
        assert_eq!(n, set(&["A", "B", "C"]));
    }

    #[test]
    fn unbounded_terminates_on_cycles() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        let n = extract_neighborhood(&g, "A", Depth::Unbounded).expect("known seed");
        assert_eq!(n, set(&["A", "B", "C"]));
    }

    #[test]
    fn directions_do_not_mix() {
        // S depends on X; Y also depends on X. Y is a sibling, not a
        // dependency or dependent of S.
        let g = graph(&[("S", &["X"]), ("Y", &["X"])]);
        let n = extract_neighborhood(&g, "S", Depth::Unbounded).expect("known seed");
        assert_eq!(n, set(&["S", "X"]));
    }

    #[test]
    fn external_modules_can_seed() {
        let g = graph(&[("A", &["ext"])]);
        let n = extract_neighborhood(&g, "ext", Depth::Limited(1)).expect("external seed");
        assert_eq!(n, set(&["A", "ext"]));
    }

    #[test]
    fn unknown_seed_fails() {
        let err = extract_neighborhood(&chain(), "nope", Depth::Limited(1))
            .expect_err("unknown seed must fail");
        assert_eq!(err, GraphError::UnknownModule("nope".to_string()));
    }

    #[test]
    fn depth_parsing() {
        assert_eq!("3".parse::<Depth>(), Ok(Depth::Limited(3)));
        assert_eq!(" 0 ".parse::<Depth>(), Ok(Depth::Limited(0)));
        assert_eq!("unbounded".parse::<Depth>(), Ok(Depth::Unbounded));
        assert_eq!("ALL".parse::<Depth>(), Ok(Depth::Unbounded));
        assert!(matches!(
            "-1".parse::<Depth>(),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            "1.5".parse::<Depth>(),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            "".parse::<Depth>(),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            "-0".parse::<Depth>(),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(Depth::try_from(-4_i64).is_err());
        assert_eq!(Depth::Unbounded.to_string(), "unbounded");
    }

    #[test]
    fn depth_parses_the_full_usize_range() {
        let max = usize::MAX.to_string();
        assert_eq!(max.parse::<Depth>(), Ok(Depth::Limited(usize::MAX)));

        let too_big = format!("{max}0");
        assert!(matches!(
            too_big.parse::<Depth>(),
            Err(GraphError::InvalidArgument(msg)) if msg.contains("too large")
        ));
    }

    #[test]
    fn roles_relative_to_seed() {
        let g = chain();
        assert_eq!(classify(&g, "B", "B"), Role::Seed);
        assert_eq!(classify(&g, "B", "C"), Role::Dependency);
        assert_eq!(classify(&g, "B", "A"), Role::Dependent);
        assert_eq!(classify(&g, "B", "D"), Role::Other);
    }

    #[test]
    fn subgraph_keeps_edges_inside_the_neighborhood() {
        let g = chain();
        let n = extract_neighborhood(&g, "B", Depth::Limited(1)).expect("known seed");
        let sub = neighborhood_subgraph(&g, &n, &BTreeSet::new());

        let pairs: Vec<(&str, &str)> = sub
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A", "B"), ("B", "C")]);
    }
}
