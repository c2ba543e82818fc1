// Shared fixtures for extractor and graph tests

use crate::extractors::csharp::CSharpSource;
use crate::extractors::{
    InlineStatementExtractor, MigrationExtractor, OrmMappingExtractor, SchemaScriptExtractor,
    TypeIndex,
};
use crate::graph::{DependencyGraph, FileFacts};
use crate::workspace::GraphConfig;
use std::sync::Arc;

pub fn csharp(path: &str, code: &str) -> CSharpSource {
    CSharpSource::parse(path, code).expect("C# source should parse")
}

/// Default configuration with `BaseEntity` as the entity base type
pub fn entity_config() -> GraphConfig {
    GraphConfig {
        entity_base_types: vec!["BaseEntity".to_string()],
        ..GraphConfig::default()
    }
}

pub fn schema_facts(path: &str, sql: &str) -> FileFacts {
    SchemaScriptExtractor::new(path.to_string(), sql.to_string()).extract()
}

pub fn inline_facts(path: &str, code: &str) -> FileFacts {
    InlineStatementExtractor::new(&GraphConfig::default()).extract(&csharp(path, code))
}

pub fn migration_facts(path: &str, code: &str) -> FileFacts {
    MigrationExtractor::new(&GraphConfig::default()).extract(&csharp(path, code))
}

/// ORM facts for each file, with the type index built over all of them
pub fn orm_facts(config: &GraphConfig, files: &[(&str, &str)]) -> Vec<FileFacts> {
    let sources: Vec<CSharpSource> = files.iter().map(|(path, code)| csharp(path, code)).collect();
    let mut index = TypeIndex::new();
    for source in &sources {
        index.add_source(source);
    }
    let extractor = OrmMappingExtractor::new(config, Arc::new(index));
    sources.iter().map(|source| extractor.extract(source)).collect()
}

/// Merge in the given order, then settle deferred facts
pub fn merged(facts: &[FileFacts]) -> DependencyGraph {
    let mut graph = DependencyGraph::new("dbo");
    for file_facts in facts {
        graph.merge(file_facts, None);
    }
    graph.resolve_deferred();
    graph
}

/// Sorted (from, relation, to) triples, for whole-graph comparisons
pub fn edge_triples(graph: &DependencyGraph) -> Vec<(String, String, String)> {
    let mut triples: Vec<_> = graph
        .edges()
        .map(|e| (e.from.to_lowercase(), e.relation.to_string(), e.to.to_lowercase()))
        .collect();
    triples.sort();
    triples
}
