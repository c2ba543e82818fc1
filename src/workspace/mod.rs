//! Scanned source tree
//!
//! A `Workspace` is the root directory being indexed plus its `GraphConfig`.
//! Discovery walks the tree once and classifies every file the extractors
//! understand: schema scripts (`.sql`) and C# sources (`.cs`).

pub mod config;

pub use config::{ConfigError, DEFAULT_HOT_METHODS, DomainRule, GraphConfig, simple_type_name};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Config file looked up in the workspace root when none is given
pub const CONFIG_FILE_NAME: &str = "dbgraph.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    SchemaScript,
    CSharp,
}

impl SourceKind {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "sql" => Some(SourceKind::SchemaScript),
            "cs" => Some(SourceKind::CSharp),
            _ => None,
        }
    }
}

/// One discovered input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Root-relative path with `/` separators; used as `source_file` in the graph
    pub relative: String,
    pub absolute: PathBuf,
    pub kind: SourceKind,
    /// Under the configured ORM model root
    pub in_model_root: bool,
}

pub struct Workspace {
    pub root: PathBuf,
    pub config: GraphConfig,
    excludes: GlobSet,
    domains: Vec<(GlobSet, String)>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: GraphConfig) -> Self {
        let excludes = build_glob_set(&config.exclude);
        let domains = config
            .domains
            .iter()
            .filter(|rule| !rule.tag.trim().is_empty())
            .map(|rule| (build_glob_set(std::slice::from_ref(&rule.pattern)), rule.tag.clone()))
            .collect();

        Self {
            root: root.into(),
            config,
            excludes,
            domains,
        }
    }

    /// Open `root`, reading `dbgraph.toml` from it when present
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = GraphConfig::load_or_default(&root.join(CONFIG_FILE_NAME));
        Self::new(root, config)
    }

    /// Every `.sql` and `.cs` file under the root, sorted by relative path
    pub fn discover(&self) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();

        for entry in walkdir::WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(kind) = SourceKind::from_path(path) else {
                continue;
            };
            let relative = self.relative_path(path)?;
            if self.is_excluded(&relative) {
                debug!("Excluded by config: {}", relative);
                continue;
            }

            files.push(SourceFile {
                in_model_root: self.in_model_root(&relative),
                relative,
                absolute: path.to_path_buf(),
                kind,
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        debug!("Discovered {} source files under {}", files.len(), self.root.display());
        Ok(files)
    }

    fn relative_path(&self, path: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(&self.root)
            .with_context(|| format!("{} is outside {}", path.display(), self.root.display()))?;
        Ok(relative.to_string_lossy().replace('\\', "/"))
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        self.excludes.is_match(relative)
    }

    pub fn in_model_root(&self, relative: &str) -> bool {
        let model_root = self.config.model_root.trim().trim_matches('/').replace('\\', "/");
        if model_root.is_empty() {
            return true;
        }
        relative == model_root || relative.starts_with(&format!("{}/", model_root))
    }

    /// Tag of the first `[[domains]]` rule matching the file
    pub fn domain_for(&self, relative: &str) -> Option<&str> {
        self.domains
            .iter()
            .find(|(set, _)| set.is_match(relative))
            .map(|(_, tag)| tag.as_str())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Invalid patterns are logged and ignored
fn build_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = pattern.replace('\\', "/");
        match Glob::new(&normalized) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Invalid glob pattern '{}': {}", pattern, e),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("Failed to compile glob patterns: {}", e);
        GlobSet::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discover_filters_extensions_excludes_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("db")).unwrap();
        fs::create_dir_all(root.join("src/bin")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("db/schema.sql"), "CREATE TABLE t(id INT)").unwrap();
        fs::write(root.join("src/Repo.cs"), "class Repo {}").unwrap();
        fs::write(root.join("src/bin/Gen.cs"), "class Gen {}").unwrap();
        fs::write(root.join("src/readme.md"), "# hi").unwrap();
        fs::write(root.join(".git/hook.sql"), "SELECT 1").unwrap();

        let workspace = Workspace::new(root, GraphConfig::default());
        let files = workspace.discover().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();

        assert_eq!(names, vec!["db/schema.sql", "src/Repo.cs"]);
        assert_eq!(files[0].kind, SourceKind::SchemaScript);
        assert_eq!(files[1].kind, SourceKind::CSharp);
    }

    #[test]
    fn test_model_root_and_domain_rules() {
        let config = GraphConfig {
            model_root: "src/Models/".to_string(),
            domains: vec![
                DomainRule {
                    pattern: "src/Billing/**".to_string(),
                    tag: "billing".to_string(),
                },
                DomainRule {
                    pattern: "src/**".to_string(),
                    tag: "core".to_string(),
                },
            ],
            ..Default::default()
        };
        let workspace = Workspace::new("/tmp/none", config);

        assert!(workspace.in_model_root("src/Models/Product.cs"));
        assert!(!workspace.in_model_root("src/ModelsOld/Product.cs"));
        assert_eq!(workspace.domain_for("src/Billing/Invoice.cs"), Some("billing"));
        assert_eq!(workspace.domain_for("src/Shop/Cart.cs"), Some("core"));
        assert_eq!(workspace.domain_for("db/schema.sql"), None);
    }
}
