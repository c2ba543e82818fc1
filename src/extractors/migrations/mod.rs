// Migration extractor
//
// Recognises migration classes by base type suffix or marker attribute, walks
// the forward-migration method and turns each recognised builder call into a
// schema or data change against a table. Raw SQL issued by the migration is
// kept as the migration node's body.

mod operations;

pub use operations::{MigrationOperation, OperationMatcher};

use crate::extractors::csharp::{
    CSharpSource, ConstantResolver, TypeDecl, flatten_member_chain, is_chain_root,
};
use crate::graph::{CodeRef, DbObjectRef, Fact, FactSource, FileFacts, NodeKind, Relation};
use crate::workspace::GraphConfig;
use std::collections::BTreeMap;
use tracing::{debug, trace};
use tree_sitter::Node;

pub struct MigrationExtractor {
    config: GraphConfig,
}

impl MigrationExtractor {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn is_migration(&self, decl: &TypeDecl) -> bool {
        decl.base_types.iter().any(|b| self.config.is_migration_base(b))
            || decl
                .attributes
                .iter()
                .any(|a| self.config.is_migration_attribute(&a.name))
    }

    pub fn extract(&self, source: &CSharpSource) -> FileFacts {
        let mut facts = Vec::new();
        for decl in source.types() {
            if self.is_migration(&decl) {
                facts.extend(self.migration_facts(source, &decl));
            }
        }
        FileFacts::new(source.file_path(), FactSource::Migration, facts)
    }

    fn migration_facts<'t>(&self, source: &'t CSharpSource, decl: &TypeDecl<'t>) -> Vec<Fact> {
        let mut resolver = ConstantResolver::new(source);
        let version = self.version(source, &mut resolver, decl);

        let mut operations: Vec<(MigrationOperation, u32)> = Vec::new();
        for body in self.up_bodies(source, decl) {
            // Local aliases first, so `var t = nameof(Product); Create.Table(t)` resolves
            for (name, value) in source.local_declarators(&body) {
                if let Some(resolved) = resolver.resolve(value) {
                    resolver.define(name, resolved);
                }
            }

            let mut matcher = OperationMatcher::new(source, &mut resolver);
            for call in source.base().find_nodes_by_type(&body, "invocation_expression") {
                if !is_chain_root(&call) {
                    continue;
                }
                let chain = flatten_member_chain(source, call);
                let line = source.line(&call);
                let matched = matcher.match_chain(&chain, call);
                if matched.is_empty() {
                    trace!("{}:{} unmatched migration call", source.file_path(), line);
                }
                operations.extend(matched.into_iter().map(|op| (op, line)));
            }
        }

        let code = CodeRef::new(decl.full_name.clone(), NodeKind::Migration);
        let raw_sql: Vec<&str> = operations
            .iter()
            .filter_map(|(op, _)| match op {
                MigrationOperation::RawSql { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        let mut attributes = BTreeMap::new();
        if let Some(version) = version {
            attributes.insert("version".to_string(), version);
        }
        attributes.insert(
            "operations".to_string(),
            operations
                .iter()
                .map(|(op, _)| op.label())
                .collect::<Vec<_>>()
                .join(","),
        );

        let mut facts = vec![Fact::DefineCode {
            code: code.clone(),
            line: decl.start_line,
            body: (!raw_sql.is_empty()).then(|| raw_sql.join("\n")),
            attributes,
        }];

        for (operation, line) in &operations {
            let (Some(table), Some(relation)) = (operation.table(), operation.relation()) else {
                continue;
            };
            let target = DbObjectRef::new(table.clone(), NodeKind::Table);
            facts.push(Fact::CodeLink {
                from: code.clone(),
                to: target.clone(),
                relation,
                line: *line,
            });
            if let MigrationOperation::TouchTable {
                principal: Some(principal),
                ..
            } = operation
            {
                facts.push(Fact::ObjectLink {
                    from: target,
                    to: DbObjectRef::new(principal.clone(), NodeKind::Table),
                    relation: Relation::ForeignKey,
                    line: *line,
                });
            }
        }

        debug!(
            "{}: migration {} with {} operations",
            source.file_path(),
            decl.full_name,
            operations.len()
        );
        facts
    }

    /// `[Migration(20240101)]` or `[Migration("20240101120000_AddOrders")]`
    fn version<'t>(
        &self,
        source: &'t CSharpSource,
        resolver: &mut ConstantResolver<'t>,
        decl: &TypeDecl<'t>,
    ) -> Option<String> {
        decl.attributes
            .iter()
            .filter(|a| self.config.is_migration_attribute(&a.name))
            .filter_map(|a| a.arguments.first())
            .find_map(|arg| {
                if arg.value.kind() == "integer_literal" {
                    let text = source.text(&arg.value);
                    return Some(text.trim_end_matches(['L', 'l', 'U', 'u']).replace('_', ""));
                }
                let text = resolver.resolve(arg.value)?;
                let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
                (!digits.is_empty()).then_some(digits)
            })
    }

    /// Bodies of the forward-migration methods declared directly on `decl`
    fn up_bodies<'t>(&self, source: &'t CSharpSource, decl: &TypeDecl<'t>) -> Vec<Node<'t>> {
        source
            .methods()
            .into_iter()
            .filter(|m| m.name == self.config.migration_up_method)
            .filter(|m| source.enclosing_type(&m.node).is_some_and(|t| t.id() == decl.node.id()))
            .filter_map(|m| m.body)
            .collect()
    }
}
