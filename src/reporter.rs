use crate::{
    analyzer::ProjectAnalysis,
    config::ReportFormat,
    dependency_graph::{CycleEdge, GraphStats},
    levels::MigrationRow,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const CSV_HEADER: [&str; 6] = [
    "Level",
    "Type",
    "Module",
    "Dependencies",
    "Dependency Count",
    "Circular",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub graph_metrics: GraphStats,
    pub circular_dependencies: Vec<CycleEdge>,
    pub broken_edges: Vec<CycleEdge>,
    pub levels: Vec<LevelSummary>,
    pub migration_order: Vec<MigrationRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub source: String,
    pub total_modules: usize,
    pub analysis_duration_ms: u128,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: usize,
    pub modules: Vec<String>,
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_report(
        &self,
        analysis: &ProjectAnalysis,
        source: &str,
        duration_ms: u128,
    ) -> Report {
        Report {
            metadata: ReportMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                source: source.to_string(),
                total_modules: analysis.stats.total_modules,
                analysis_duration_ms: duration_ms,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            graph_metrics: analysis.stats.clone(),
            circular_dependencies: analysis.cycle_edges.iter().cloned().collect(),
            broken_edges: analysis.partition.broken_edges.iter().cloned().collect(),
            levels: analysis
                .partition
                .levels
                .iter()
                .enumerate()
                .map(|(level, modules)| LevelSummary {
                    level,
                    modules: modules.iter().cloned().collect(),
                })
                .collect(),
            migration_order: analysis.migration.clone(),
        }
    }

    pub fn export_report(
        &self,
        report: &Report,
        output_dir: &Path,
        formats: &[ReportFormat],
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
        let mut exported_files = Vec::new();

        for format in formats {
            let (file_name, content) = match format {
                ReportFormat::Json => (
                    "migration_report.json",
                    serde_json::to_string_pretty(report)?,
                ),
                ReportFormat::Csv => (
                    "module_migration_order.csv",
                    self.generate_csv(report),
                ),
                ReportFormat::Markdown => (
                    "migration_report.md",
                    self.generate_markdown_summary(report),
                ),
            };

            let path = output_dir.join(file_name);
            fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "report written");
            exported_files.push(path);
        }

        Ok(exported_files)
    }

    pub fn generate_csv(&self, report: &Report) -> String {
        let mut lines = vec![CSV_HEADER.join(",")];

        for row in &report.migration_order {
            let cells = [
                row.level.to_string(),
                row.kind.to_string(),
                row.module.clone(),
                display_signature(row),
                row.dependency_count.to_string(),
                yes_no(row.circular).to_string(),
            ];
            lines.push(
                cells
                    .iter()
                    .map(|c| csv_cell(c))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        lines.join("\n")
    }

    pub fn generate_markdown_summary(&self, report: &Report) -> String {
        let mut md = String::new();
        let metadata = &report.metadata;
        let m = &report.graph_metrics;

        md.push_str("# Module Migration Report\n\n");
        md.push_str(&format!(
            "*Generated {} from `{}` by module-examer {}*\n\n",
            metadata.generated_at, metadata.source, metadata.version
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!(
            "- **Modules:** {} ({} local, {} external)\n",
            m.total_modules, m.local_modules, m.external_modules
        ));
        md.push_str(&format!("- **Dependency edges:** {}\n", m.total_edges));
        md.push_str(&format!(
            "- **Cyclic components:** {}\n",
            m.strongly_connected_components
        ));
        md.push_str(&format!("- **Levels:** {}\n", report.levels.len()));
        md.push_str(&format!(
            "- **Broken edges:** {}\n\n",
            report.broken_edges.len()
        ));

        if !report.circular_dependencies.is_empty() {
            md.push_str("## Circular Dependencies\n\n");
            for edge in &report.circular_dependencies {
                md.push_str(&format!("- `{}` -> `{}`\n", edge.source, edge.target));
            }
            md.push('\n');
        }

        md.push_str("## Migration Order\n\n");
        md.push_str(&format!("| {} |\n", CSV_HEADER.join(" | ")));
        md.push_str(&format!("|{}\n", "---|".repeat(CSV_HEADER.len())));
        for row in &report.migration_order {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                row.level,
                row.kind,
                row.module,
                display_signature(row),
                row.dependency_count,
                yes_no(row.circular)
            ));
        }

        md
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

fn display_signature(row: &MigrationRow) -> String {
    if row.signature.is_empty() {
        "<none>".to_string()
    } else {
        row.signature.clone()
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
