// dbgraph extractors
//
// Tree-sitter based extractors. Each one turns a single file into an ordered
// list of facts; none of them sees the graph.

pub mod base;
pub mod csharp;
pub mod inline;
pub mod migrations;
pub mod orm;
pub mod sql;

pub use base::BaseExtractor;
pub use inline::InlineStatementExtractor;
pub use migrations::MigrationExtractor;
pub use orm::{OrmMappingExtractor, TypeIndex};
pub use sql::SchemaScriptExtractor;
