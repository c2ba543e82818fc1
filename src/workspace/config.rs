// Graph run configuration (dbgraph.toml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Call-site tokens that always carry statement text
pub const DEFAULT_HOT_METHODS: &[&str] = &[
    "ExecuteSqlRaw",
    "ExecuteSqlRawAsync",
    "ExecuteSqlInterpolated",
    "FromSqlRaw",
    "FromSqlInterpolated",
    "SqlQuery",
    "SqlQueryRaw",
    "Query",
    "QueryAsync",
    "QueryFirst",
    "QueryFirstOrDefault",
    "QuerySingle",
    "QueryMultiple",
    "Execute",
    "ExecuteAsync",
    "ExecuteScalar",
    "ExecuteReader",
    "SqlCommand",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tag nodes defined in matching files with a domain name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRule {
    pub pattern: String,
    pub tag: String,
}

/// Explicit configuration threaded through every extractor entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Schema for unqualified object names
    pub default_schema: String,

    /// Base types (full or simple names) whose subclasses are ORM entities
    pub entity_base_types: Vec<String>,

    /// Generic property types that mark an ORM object set
    pub object_set_types: Vec<String>,

    /// Directory (relative to the scanned root) holding the ORM model; empty = whole tree
    pub model_root: String,

    /// Extra hot call-site tokens, on top of `DEFAULT_HOT_METHODS`
    pub hot_methods: Vec<String>,

    /// A class whose base type name ends with this is a migration
    pub migration_base_suffix: String,

    /// A class carrying an attribute whose name contains this is a migration
    pub migration_attribute_marker: String,

    /// Forward-operation method of a migration class
    pub migration_up_method: String,

    /// Glob patterns excluded from discovery
    pub exclude: Vec<String>,

    pub domains: Vec<DomainRule>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_schema: "dbo".to_string(),
            entity_base_types: vec![],
            object_set_types: vec!["DbSet".to_string(), "IDbSet".to_string()],
            model_root: String::new(),
            hot_methods: vec![],
            migration_base_suffix: "Migration".to_string(),
            migration_attribute_marker: "Migration".to_string(),
            migration_up_method: "Up".to_string(),
            exclude: vec![
                "**/bin/**".to_string(),
                "**/obj/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
            ],
            domains: vec![],
        }
    }
}

impl GraphConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Default schema, never empty
    pub fn schema(&self) -> &str {
        let trimmed = self.default_schema.trim();
        if trimmed.is_empty() { "dbo" } else { trimmed }
    }

    /// Fixed defaults plus configured extras, blanks removed
    pub fn hot_method_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = DEFAULT_HOT_METHODS.iter().map(|s| s.to_string()).collect();
        for extra in &self.hot_methods {
            let extra = extra.trim();
            if !extra.is_empty() && !tokens.iter().any(|t| t == extra) {
                tokens.push(extra.to_string());
            }
        }
        tokens
    }

    /// Simple names of the configured entity base types
    pub fn entity_base_names(&self) -> Vec<String> {
        self.entity_base_types
            .iter()
            .map(|t| simple_type_name(t))
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn is_object_set_type(&self, simple_name: &str) -> bool {
        self.object_set_types
            .iter()
            .any(|t| !t.trim().is_empty() && simple_type_name(t) == simple_name)
    }

    pub fn is_migration_base(&self, base_type: &str) -> bool {
        let suffix = self.migration_base_suffix.trim();
        !suffix.is_empty() && simple_type_name(base_type).ends_with(suffix)
    }

    pub fn is_migration_attribute(&self, attribute_name: &str) -> bool {
        let marker = self.migration_attribute_marker.trim();
        !marker.is_empty() && attribute_name.contains(marker)
    }
}

/// `Shop.Data.BaseEntity<int>` -> `BaseEntity`
pub fn simple_type_name(type_text: &str) -> String {
    let without_generics = type_text.split('<').next().unwrap_or(type_text);
    let without_nullable = without_generics.trim().trim_end_matches('?');
    without_nullable
        .rsplit('.')
        .next()
        .unwrap_or(without_nullable)
        .trim()
        .trim_start_matches("global::")
        .to_string()
}
