//! SQL text handling: schema scripts and statement analysis

mod helpers;
pub mod parser;
mod schema;

pub use helpers::{Batch, blank_comments_and_strings, split_batches};
pub use parser::{
    AccessIntent, ObjectReference, ParsedSql, StatementAnalysis, StatementError, analyze,
    fallback_references, parse_statements,
};
pub use schema::SchemaScriptExtractor;
