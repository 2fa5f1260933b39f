use crate::file_discovery::ManifestFile;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedManifest {
    pub module: String,
    pub dependencies: Vec<String>,
}

/// Pulls the `depends` list out of a Python-literal manifest without
/// evaluating it.
pub struct ManifestParser {
    depends_pattern: Regex,
    item_pattern: Regex,
}

impl ManifestParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            depends_pattern: Regex::new(r#"(?s)['"]depends['"]\s*:\s*\[(.*?)\]"#)?,
            item_pattern: Regex::new(r#"['"]([^'"]*)['"]"#)?,
        })
    }

    /// Legacy manifests are often Latin-1; invalid UTF-8 is replaced rather
    /// than rejected, so only I/O failures are errors.
    pub fn parse_file(&self, manifest: &ManifestFile) -> Result<ParsedManifest> {
        let bytes = std::fs::read(&manifest.path)
            .with_context(|| format!("failed to read manifest {}", manifest.path.display()))?;
        Ok(self.parse_str(&manifest.module, &String::from_utf8_lossy(&bytes)))
    }

    /// Dependencies in declared order, duplicates kept. A manifest without a
    /// `depends` key declares none.
    pub fn parse_str(&self, module: &str, content: &str) -> ParsedManifest {
        let dependencies = self
            .depends_pattern
            .captures(content)
            .and_then(|captures| captures.get(1))
            .map(|list| {
                self.item_pattern
                    .captures_iter(list.as_str())
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        ParsedManifest {
            module: module.to_string(),
            dependencies,
        }
    }
}
