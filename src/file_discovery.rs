use crate::config::Config;
use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A manifest file and the module it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub path: PathBuf,
    /// Name of the directory holding the manifest.
    pub module: String,
}

pub struct ManifestDiscovery {
    root: PathBuf,
    manifest_names: Vec<String>,
    ignore_patterns: Vec<IgnorePattern>,
}

enum IgnorePattern {
    Extension(String),
    Wildcard(Regex),
    Component(String),
}

impl ManifestDiscovery {
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.addons_directory.clone(),
            manifest_names: config.manifest_names.clone(),
            ignore_patterns: config
                .ignore_patterns
                .iter()
                .filter_map(|p| IgnorePattern::compile(p))
                .collect(),
        }
    }

    /// Every manifest below the addons directory, sorted by path.
    pub fn discover(&self) -> crate::Result<Vec<ManifestFile>> {
        let mut manifests = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        for result in walker {
            let entry = result?;
            let path = entry.path();

            // Symlinked manifests are kept; the parser reports broken links.
            if entry.file_type().map_or(true, |t| t.is_dir()) {
                continue;
            }
            if self.should_ignore(path) {
                debug!(path = %path.display(), "ignored");
                continue;
            }
            if let Some(manifest) = self.as_manifest(path) {
                manifests.push(manifest);
            }
        }

        manifests.sort_by(|a, b| a.path.cmp(&b.path));
        info!(
            root = %self.root.display(),
            manifests = manifests.len(),
            "manifest discovery finished"
        );
        Ok(manifests)
    }

    fn as_manifest(&self, path: &Path) -> Option<ManifestFile> {
        let file_name = path.file_name()?.to_str()?;
        if !self.manifest_names.iter().any(|n| n == file_name) {
            return None;
        }

        let module = path.parent()?.file_name()?.to_str()?.to_string();
        Some(ManifestFile {
            path: path.to_path_buf(),
            module,
        })
    }

    fn should_ignore(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.ignore_patterns.iter().any(|p| p.matches(relative))
    }
}

impl IgnorePattern {
    fn compile(pattern: &str) -> Option<Self> {
        if let Some(ext) = pattern.strip_prefix("*.") {
            if !ext.contains('*') {
                return Some(IgnorePattern::Extension(format!(".{ext}")));
            }
        }

        if pattern.contains('*') {
            let regex = format!(
                "^{}$",
                pattern
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*")
            );
            return Regex::new(&regex).ok().map(IgnorePattern::Wildcard);
        }

        if pattern.is_empty() {
            None
        } else {
            Some(IgnorePattern::Component(pattern.to_string()))
        }
    }

    fn matches(&self, path: &Path) -> bool {
        match self {
            IgnorePattern::Extension(suffix) => path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(suffix.as_str())),
            IgnorePattern::Wildcard(re) => path
                .components()
                .any(|c| re.is_match(&c.as_os_str().to_string_lossy())),
            IgnorePattern::Component(name) => path
                .components()
                .any(|c| c.as_os_str().to_string_lossy() == name.as_str()),
        }
    }
}
