use crate::{
    config::Config,
    cycles::{circular_modules, detect_cycles},
    dependency_graph::{build_graph, load_dependencies, CycleEdge, GraphStats, RawDependencies},
    file_discovery::ManifestDiscovery,
    levels::{build_levels, migration_order, LevelPartition, MigrationRow},
    manifest_parser::{ManifestParser, ParsedManifest},
};
use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, instrument, warn};

pub struct Analyzer {
    config: Config,
}

impl Analyzer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover and parse every manifest under the addons directory.
    ///
    /// Manifests are parsed in parallel. When two manifests name the same
    /// module, the one with the later path wins.
    #[instrument(skip_all, fields(root = %self.config.addons_directory.display()))]
    pub fn scan(&self) -> Result<RawDependencies> {
        let manifests = ManifestDiscovery::new(&self.config).discover()?;
        let parser = ManifestParser::new()?;

        let parsed: Vec<ParsedManifest> = manifests
            .par_iter()
            .map(|manifest| match parser.parse_file(manifest) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %manifest.path.display(), error = %e, "unreadable manifest");
                    ParsedManifest {
                        module: manifest.module.clone(),
                        dependencies: Vec::new(),
                    }
                }
            })
            .collect();

        let mut raw = RawDependencies::new();
        for manifest in parsed {
            raw.insert(manifest.module, manifest.dependencies);
        }

        info!(modules = raw.len(), "scan finished");
        Ok(raw)
    }

    /// Read the dependency map from `path`, or from the configured file.
    pub fn load(&self, path: Option<&Path>) -> Result<RawDependencies> {
        load_dependencies(path.unwrap_or(self.config.dependency_file.as_path()))
    }

    /// Build the graph and run the cycle and level analyses on it.
    #[instrument(skip_all, fields(declared = raw.len()))]
    pub fn analyze(&self, raw: &RawDependencies) -> ProjectAnalysis {
        let graph = build_graph(raw);
        let stats = GraphStats::from_graph(&graph);

        let (cycle_edges, partition) =
            rayon::join(|| detect_cycles(&graph), || build_levels(&graph));
        let migration = migration_order(&graph, &partition);

        info!(
            modules = stats.total_modules,
            cycle_edges = cycle_edges.len(),
            levels = partition.levels.len(),
            broken_edges = partition.broken_edges.len(),
            "analysis finished"
        );

        ProjectAnalysis {
            stats,
            cycle_edges,
            partition,
            migration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub stats: GraphStats,
    /// Edges on cycles found by depth-first search.
    pub cycle_edges: BTreeSet<CycleEdge>,
    pub partition: LevelPartition,
    pub migration: Vec<MigrationRow>,
}

impl ProjectAnalysis {
    pub fn circular_modules(&self) -> BTreeSet<String> {
        circular_modules(&self.cycle_edges)
    }

    pub fn print_summary(&self) {
        println!("Module Analysis Summary");
        println!("=======================");
        self.stats.print_summary();

        println!("\nCircular dependencies:");
        if self.cycle_edges.is_empty() {
            println!("  none found");
        } else {
            println!(
                "  {} edges across {} modules",
                self.cycle_edges.len(),
                self.circular_modules().len()
            );
        }

        println!("\nMigration order:");
        println!("  Levels: {}", self.partition.levels.len());
        println!("  Broken edges: {}", self.partition.broken_edges.len());
    }
}
