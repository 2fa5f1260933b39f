use clap::{Parser, Subcommand};
use module_examer::{
    build_graph,
    config::ReportFormat,
    cycles::circular_subgraph,
    dependency_graph::{save_dependencies, Subgraph},
    detect_cycles,
    neighborhood::{classify, neighborhood_subgraph, Role},
    Analyzer, Config, Depth, Reporter,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "module-examer")]
#[command(
    about = "Dependency analysis for addon module trees: cycles, migration order and neighborhoods"
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (defaults to ~/.module-examer.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an addons directory and write the module dependency map
    Scan {
        /// Addons directory (defaults to the configured one)
        path: Option<PathBuf>,

        /// Dependency map to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List dependency edges that take part in cycles
    Cycles {
        /// Dependency map to read
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Partition modules into migration levels
    Levels {
        /// Dependency map to read
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the modules within a number of hops of one module
    Neighborhood {
        /// Module at the center of the neighborhood
        #[arg(short, long)]
        module: String,

        /// Hops in each direction: a non-negative integer or "unbounded"
        #[arg(short, long)]
        depth: Option<String>,

        /// Dependency map to read
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run every analysis and export the migration report
    Report {
        /// Dependency map to read
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate only one report format
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the config file (defaults to ~/.module-examer.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum FormatArg {
    Json,
    Csv,
    Markdown,
    All,
}

impl FormatArg {
    fn formats(self) -> Vec<ReportFormat> {
        match self {
            FormatArg::Json => vec![ReportFormat::Json],
            FormatArg::Csv => vec![ReportFormat::Csv],
            FormatArg::Markdown => vec![ReportFormat::Markdown],
            FormatArg::All => ReportFormat::ALL.to_vec(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let analyzer = Analyzer::new(config);

    match cli.command {
        Commands::Scan { path, output } => scan(analyzer, path, output),
        Commands::Cycles { input, json } => cycles(&analyzer, input, json),
        Commands::Levels { input, json } => levels(&analyzer, input, json),
        Commands::Neighborhood {
            module,
            depth,
            input,
            json,
        } => neighborhood(&analyzer, &module, depth.as_deref(), input, json),
        Commands::Report {
            input,
            output,
            format,
        } => report(&analyzer, input, output, format),
        Commands::Config { output } => generate_config(output),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "module_examer=debug"
    } else {
        "module_examer=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn scan(analyzer: Analyzer, path: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = analyzer.config().clone();
    if let Some(path) = path {
        anyhow::ensure!(
            path.is_dir(),
            "the path '{}' is not a valid directory",
            path.display()
        );
        config.addons_directory = path;
    }
    let output = output.unwrap_or_else(|| config.dependency_file.clone());
    let analyzer = Analyzer::new(config);

    let raw = analyzer.scan()?;
    if raw.is_empty() {
        println!(
            "No manifest files found in {}",
            analyzer.config().addons_directory.display()
        );
        return Ok(());
    }

    save_dependencies(&output, &raw)?;
    println!("Module dependencies saved to {}", output.display());
    println!("Total modules: {}", raw.len());
    Ok(())
}

fn cycles(analyzer: &Analyzer, input: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let graph = build_graph(&analyzer.load(input.as_deref())?);
    let edges = detect_cycles(&graph);

    if json {
        println!("{}", serde_json::to_string_pretty(&circular_subgraph(&graph, &edges))?);
        return Ok(());
    }

    if edges.is_empty() {
        println!("No circular dependencies found");
        return Ok(());
    }

    println!("Circular dependencies ({} edges):", edges.len());
    for edge in &edges {
        println!("  {edge}");
    }
    Ok(())
}

fn levels(analyzer: &Analyzer, input: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let raw = analyzer.load(input.as_deref())?;
    let analysis = analyzer.analyze(&raw);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis.partition)?);
        return Ok(());
    }

    for (level, modules) in analysis.partition.levels.iter().enumerate() {
        let names: Vec<&str> = modules.iter().map(String::as_str).collect();
        println!("Level {level}: {}", names.join(", "));
    }
    if !analysis.partition.broken_edges.is_empty() {
        println!("\nBroken circular edges:");
        for edge in &analysis.partition.broken_edges {
            println!("  {edge}");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct NeighborhoodOutput<'a> {
    seed: &'a str,
    depth: String,
    #[serde(flatten)]
    subgraph: Subgraph,
}

fn neighborhood(
    analyzer: &Analyzer,
    module: &str,
    depth: Option<&str>,
    input: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let depth = match depth {
        Some(depth) => depth.parse::<Depth>()?,
        None => analyzer
            .config()
            .analysis
            .default_depth
            .map_or(Depth::Unbounded, Depth::Limited),
    };

    let graph = build_graph(&analyzer.load(input.as_deref())?);
    let members = module_examer::extract_neighborhood(&graph, module, depth)?;
    let subgraph = neighborhood_subgraph(&graph, &members, &detect_cycles(&graph));

    if json {
        let output = NeighborhoodOutput {
            seed: module,
            depth: depth.to_string(),
            subgraph,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Neighborhood of {module} (depth {depth}): {} modules", members.len());
    for name in &members {
        let role = match classify(&graph, module, name) {
            Role::Seed => "seed",
            Role::Dependency => "dependency",
            Role::Dependent => "dependent",
            Role::Other => "",
        };
        println!("  {name} {role}");
    }
    println!("\nEdges:");
    for edge in &subgraph.edges {
        let marker = if edge.circular { " (circular)" } else { "" };
        println!("  {} -> {}{marker}", edge.source, edge.target);
    }
    Ok(())
}

fn report(
    analyzer: &Analyzer,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<FormatArg>,
) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let source = input
        .clone()
        .unwrap_or_else(|| analyzer.config().dependency_file.clone());

    let raw = analyzer.load(Some(source.as_path()))?;
    let analysis = analyzer.analyze(&raw);
    let duration = start_time.elapsed();
    analysis.print_summary();

    let output_dir =
        output.unwrap_or_else(|| analyzer.config().report.output_directory.clone());
    let formats = format.map_or_else(
        || analyzer.config().report.formats.clone(),
        FormatArg::formats,
    );

    let reporter = Reporter::new();
    let report = reporter.generate_report(
        &analysis,
        &source.display().to_string(),
        duration.as_millis(),
    );
    let exported_files = reporter.export_report(&report, &output_dir, &formats)?;

    println!("\nAnalysis completed in {:.2}s", duration.as_secs_f64());
    println!("Reports exported to:");
    for file in exported_files {
        println!("   - {}", file.display());
    }
    Ok(())
}

fn generate_config(output_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = match output_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    std::fs::write(&config_path, Config::create_documented_config())?;
    println!("Configuration file created: {}", config_path.display());
    Ok(())
}
