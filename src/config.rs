use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub addons_directory: PathBuf,
    pub manifest_names: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub dependency_file: PathBuf,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Neighborhood depth used when none is given on the command line.
    /// Absent means unbounded.
    pub default_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_directory: PathBuf,
    pub formats: Vec<ReportFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 3] = [
        ReportFormat::Json,
        ReportFormat::Csv,
        ReportFormat::Markdown,
    ];
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addons_directory: PathBuf::from("."),
            manifest_names: vec![
                "__manifest__.py".to_string(),
                "__openerp__.py".to_string(),
            ],
            ignore_patterns: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "__pycache__".to_string(),
                "*.pyc".to_string(),
                "static".to_string(),
            ],
            dependency_file: PathBuf::from("module_dependencies.json"),
            analysis: AnalysisConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("./migration-output"),
            formats: ReportFormat::ALL.to_vec(),
        }
    }
}

impl Config {
    /// Get the default config file path (~/.module-examer.toml)
    pub fn default_config_path() -> crate::Result<PathBuf> {
        let home_dir = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(PathBuf::from(home_dir).join(".module-examer.toml"))
    }

    /// Load config from the default location, falling back to defaults if
    /// the file doesn't exist
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            info!(path = %config_path.display(), "loading configuration");
            Self::from_file(&config_path)
        } else {
            info!(path = %config_path.display(), "no config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load config from a specific file path
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Create a config file with all available options documented
    pub fn create_documented_config() -> String {
        r#"# Module Examer Configuration File
# This file configures how module-examer scans addons and analyzes their
# dependency graph.

# Directory scanned by `module-examer scan` (defaults to current directory)
addons_directory = "."

# File names that mark a module directory. The module name is the name of
# the directory holding the manifest.
manifest_names = ["__manifest__.py", "__openerp__.py"]

# Patterns skipped while walking the addons directory.
# Plain names match any path component, "*.ext" matches file extensions and
# other "*" patterns are matched as wildcards.
ignore_patterns = [
    ".git",
    "node_modules",
    "__pycache__",
    "*.pyc",
    "static"
]

# Dependency map written by `scan` and read by every analysis command
dependency_file = "module_dependencies.json"

[analysis]
# Neighborhood depth used when --depth is not given. Leave unset for
# unbounded expansion.
# default_depth = 2

[report]
# Where `module-examer report` writes its files
output_directory = "./migration-output"

# Any of "json", "csv", "markdown"
formats = ["json", "csv", "markdown"]
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_config_parses_to_defaults() {
        let parsed: Config =
            toml::from_str(&Config::create_documented_config()).expect("template parses");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: Config = toml::from_str(
            r#"
addons_directory = "/srv/odoo/addons"

[analysis]
default_depth = 3
"#,
        )
        .expect("partial config parses");

        assert_eq!(parsed.addons_directory, PathBuf::from("/srv/odoo/addons"));
        assert_eq!(parsed.analysis.default_depth, Some(3));
        assert_eq!(parsed.manifest_names, Config::default().manifest_names);
        assert_eq!(parsed.report.formats, ReportFormat::ALL.to_vec());
    }

    #[test]
    fn from_file_reads_generated_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("module-examer.toml");
        std::fs::write(&path, Config::create_documented_config()).expect("write");

        assert_eq!(Config::from_file(&path).expect("load"), Config::default());
    }

    #[test]
    fn from_file_names_the_bad_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "manifest_names = 3").expect("write");

        let err = Config::from_file(&path).expect_err("wrong type must fail");
        assert!(err.to_string().contains("broken.toml"));
    }
}
