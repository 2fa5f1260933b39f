pub mod config;
pub mod error;
pub mod file_discovery;
pub mod manifest_parser;
pub mod dependency_graph;
pub mod cycles;
pub mod levels;
pub mod neighborhood;
pub mod analyzer;
pub mod reporter;

pub use config::Config;
pub use error::GraphError;
pub use file_discovery::ManifestDiscovery;
pub use manifest_parser::ManifestParser;
pub use dependency_graph::{build_graph, CycleEdge, DependencyGraph, Module, RawDependencies};
pub use cycles::detect_cycles;
pub use levels::{build_levels, LevelPartition};
pub use neighborhood::{extract_neighborhood, Depth};
pub use analyzer::Analyzer;
pub use reporter::Reporter;

pub type Result<T> = anyhow::Result<T>;
