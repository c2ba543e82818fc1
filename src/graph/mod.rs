//! Dependency graph model
//!
//! Nodes are database objects (tables, views, routines, ...) or code constructs
//! (methods, entities, object sets, migrations). Edges are typed, directed and
//! deduplicated on (from, to, relation); each edge remembers which extractors
//! confirmed it.

mod facts;
pub mod keys;
mod merge;

pub use facts::{CodeRef, DbObjectRef, Fact, FileFacts, MappingTarget, MappingVia};
pub use keys::{QualifiedName, code_key, db_key, lookup_key};
pub use merge::{DependencyGraph, StatementRecord};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Node kinds. Database objects first, code constructs after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeKind {
    Table,
    View,
    Proc,
    Func,
    Trigger,
    Type,
    Sequence,
    Synonym,
    DbSet,
    Method,
    Entity,
    Migration,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Table => "TABLE",
            NodeKind::View => "VIEW",
            NodeKind::Proc => "PROC",
            NodeKind::Func => "FUNC",
            NodeKind::Trigger => "TRIGGER",
            NodeKind::Type => "TYPE",
            NodeKind::Sequence => "SEQUENCE",
            NodeKind::Synonym => "SYNONYM",
            NodeKind::DbSet => "DBSET",
            NodeKind::Method => "METHOD",
            NodeKind::Entity => "ENTITY",
            NodeKind::Migration => "MIGRATION",
        }
    }

    /// Convert from string representation (for database deserialization)
    pub fn from_string(s: &str) -> Option<Self> {
        let kind = match s.to_ascii_uppercase().as_str() {
            "TABLE" => NodeKind::Table,
            "VIEW" => NodeKind::View,
            "PROC" | "PROCEDURE" => NodeKind::Proc,
            "FUNC" | "FUNCTION" => NodeKind::Func,
            "TRIGGER" => NodeKind::Trigger,
            "TYPE" => NodeKind::Type,
            "SEQUENCE" => NodeKind::Sequence,
            "SYNONYM" => NodeKind::Synonym,
            "DBSET" => NodeKind::DbSet,
            "METHOD" => NodeKind::Method,
            "ENTITY" => NodeKind::Entity,
            "MIGRATION" => NodeKind::Migration,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_database_object(&self) -> bool {
        !matches!(
            self,
            NodeKind::DbSet | NodeKind::Method | NodeKind::Entity | NodeKind::Migration
        )
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relation {
    ReadsFrom,
    WritesTo,
    Executes,
    SynonymFor,
    On,
    MapsTo,
    ForeignKey,
    SchemaChange,
    DataChange,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::ReadsFrom => "ReadsFrom",
            Relation::WritesTo => "WritesTo",
            Relation::Executes => "Executes",
            Relation::SynonymFor => "SynonymFor",
            Relation::On => "On",
            Relation::MapsTo => "MapsTo",
            Relation::ForeignKey => "ForeignKey",
            Relation::SchemaChange => "SchemaChange",
            Relation::DataChange => "DataChange",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which extractor produced a fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactSource {
    Schema,
    Inline,
    Orm,
    Migration,
}

impl FactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactSource::Schema => "schema",
            FactSource::Inline => "inline",
            FactSource::Orm => "orm",
            FactSource::Migration => "migration",
        }
    }
}

/// A uniquely keyed vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Display key; lookups are case-insensitive
    pub key: String,
    pub kind: NodeKind,
    pub name: String,
    /// Database schema, or the namespace for code constructs
    pub schema: Option<String>,
    pub source_file: Option<String>,
    pub domain: Option<String>,
    /// Created from a reference only, no definition site seen
    pub is_stub: bool,
    /// Extra per-node facts (migration version, raw SQL, ...)
    pub attributes: BTreeMap<String, String>,
}

/// A directed, typed relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub relation: Relation,
    pub to_kind: NodeKind,
    /// File of the first fact that produced this edge
    pub source_file: Option<String>,
    /// Every extractor that confirmed this edge
    pub provenance: BTreeSet<FactSource>,
}

impl Edge {
    pub fn provenance_label(&self) -> String {
        self.provenance
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Summary counts for one graph run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_relation: BTreeMap<String, usize>,
    pub stub_nodes: usize,
    pub statements: usize,
    pub files_scanned: usize,
    pub files_skipped: usize,
}

impl GraphStats {
    pub fn node_total(&self) -> usize {
        self.nodes_by_kind.values().sum()
    }

    pub fn edge_total(&self) -> usize {
        self.edges_by_relation.values().sum()
    }
}
