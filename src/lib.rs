// dbgraph - Code-to-Database Dependency Graph Library
//!
//! dbgraph indexes codebases that mix T-SQL schema scripts, an ORM mapping layer and
//! code-first migrations, and merges everything it finds into one dependency graph
//! linking C# code constructs to the database objects they touch.
//!
//! Four extractors run independently per file (schema scripts, inline statement text,
//! ORM mappings, migration operations); the graph merger unifies their facts.

pub mod database;
pub mod extractors;
pub mod graph;
pub mod pipeline;
pub mod workspace;

#[cfg(test)]
pub mod tests;

// Re-export common types
pub use graph::{DependencyGraph, Edge, Fact, FactSource, GraphStats, Node, NodeKind, Relation};
pub use pipeline::{CancellationToken, GraphPipeline, PipelineError};
pub use workspace::{GraphConfig, Workspace};
