// Schema script extractor
//
// Turns one schema script into object definitions and object-to-object links:
// foreign keys (child to parent), trigger targets, synonym targets, and the
// dependencies of view/procedure/function/trigger bodies. Each GO batch is
// handled on its own; a batch the grammar rejects is scanned with header
// patterns instead.

use super::helpers::{
    Batch, OBJECT_HEADER_RE, REFERENCES_RE, SYNONYM_FOR_RE, TRIGGER_ON_RE,
    blank_comments_and_strings, line_offset, object_reference_name, split_batches,
};
use super::parser::{AccessIntent, ObjectReference, ParsedSql, analyze};
use crate::extractors::base::BaseExtractor;
use crate::graph::{DbObjectRef, Fact, FactSource, FileFacts, NodeKind, QualifiedName, Relation};
use tracing::{debug, warn};
use tree_sitter::Node;

/// Statement node kinds that define an object, with the kind they define
const DEFINING_STATEMENTS: &[(&str, NodeKind)] = &[
    ("create_table", NodeKind::Table),
    ("alter_table", NodeKind::Table),
    ("create_view", NodeKind::View),
    ("create_procedure", NodeKind::Proc),
    ("create_function", NodeKind::Func),
    ("create_function_statement", NodeKind::Func),
    ("create_trigger", NodeKind::Trigger),
    ("create_sequence", NodeKind::Sequence),
    ("create_type", NodeKind::Type),
];

pub struct SchemaScriptExtractor {
    base: BaseExtractor,
}

impl SchemaScriptExtractor {
    pub fn new(file_path: String, content: String) -> Self {
        Self {
            base: BaseExtractor::new(file_path, content),
        }
    }

    pub fn extract(&self) -> FileFacts {
        let mut facts = Vec::new();
        for batch in split_batches(&self.base.content) {
            facts.extend(self.extract_batch(&batch));
        }
        debug!("{}: {} schema facts", self.base.file_path, facts.len());
        FileFacts::new(self.base.file_path.clone(), FactSource::Schema, facts)
    }

    fn extract_batch(&self, batch: &Batch) -> Vec<Fact> {
        let parsed = ParsedSql::parse_lenient(&batch.text).ok();
        let clean = parsed
            .as_ref()
            .is_some_and(|p| p.first_error_line().is_none());

        if let Some(parsed) = parsed.as_ref().filter(|_| clean) {
            let facts = self.tree_facts(batch, parsed);
            if !facts.is_empty() {
                return facts;
            }
        }

        let facts = self.header_facts(batch);
        if facts.is_empty() {
            if clean {
                debug!(
                    "{}:{}: batch defines no objects",
                    self.base.file_path, batch.start_line
                );
            } else {
                warn!(
                    "{}:{}: unparseable batch yielded no schema facts",
                    self.base.file_path, batch.start_line
                );
            }
        }
        facts
    }

    /// Facts from a batch the grammar parsed cleanly
    fn tree_facts(&self, batch: &Batch, parsed: &ParsedSql) -> Vec<Fact> {
        let kinds: Vec<&str> = DEFINING_STATEMENTS.iter().map(|(k, _)| *k).collect();
        let statements = parsed.base().find_nodes_by_types(&parsed.root(), &kinds);

        let mut facts = Vec::new();
        for statement in statements {
            let Some(kind) = DEFINING_STATEMENTS
                .iter()
                .find(|(k, _)| *k == statement.kind())
                .map(|(_, kind)| *kind)
            else {
                continue;
            };
            let Some(name_node) = parsed.base().find_child_by_type(&statement, "object_reference") else {
                continue;
            };
            let Some(name) = parsed.object_name(&name_node) else {
                continue;
            };

            let line = batch.start_line + statement.start_position().row as u32;
            let object = DbObjectRef::new(name, kind);
            let body = (statement.kind() != "alter_table")
                .then(|| slice(&batch.text, &statement))
                .filter(|b| !b.trim().is_empty());
            facts.push(Fact::DefineObject {
                object: object.clone(),
                line,
                body,
            });

            match kind {
                NodeKind::Table => {
                    facts.extend(self.tree_foreign_keys(batch, parsed, &statement, &object));
                }
                NodeKind::Trigger => {
                    let target = parsed
                        .base()
                        .find_children_by_type(&statement, "object_reference")
                        .into_iter()
                        .find(|n| n.id() != name_node.id());
                    if let Some(target) = target.and_then(|t| parsed.object_name(&t)) {
                        facts.push(Fact::ObjectLink {
                            from: object.clone(),
                            to: DbObjectRef::table_like(target.clone()),
                            relation: Relation::On,
                            line,
                        });
                        let references = parsed
                            .references_in(&statement, Some(name_node.id()))
                            .into_iter()
                            .filter(|r| !same_name(&r.name, &target) || r.intent != AccessIntent::Read)
                            .collect::<Vec<_>>();
                        facts.extend(dependency_facts(&object, &references, line));
                    }
                }
                NodeKind::View | NodeKind::Proc | NodeKind::Func => {
                    let references = parsed.references_in(&statement, Some(name_node.id()));
                    facts.extend(dependency_facts(&object, &references, line));
                }
                _ => {}
            }
        }
        facts
    }

    fn tree_foreign_keys(
        &self,
        batch: &Batch,
        parsed: &ParsedSql,
        statement: &Node,
        table: &DbObjectRef,
    ) -> Vec<Fact> {
        let mut facts = Vec::new();
        let keywords = parsed
            .base()
            .find_nodes_by_type(statement, "keyword_references");

        for keyword in keywords {
            let Some(holder) = keyword.parent() else {
                continue;
            };
            let parent = parsed
                .base()
                .find_children_by_type(&holder, "object_reference")
                .into_iter()
                .find(|r| r.start_byte() > keyword.start_byte());
            let Some(parent) = parent.and_then(|p| parsed.object_name(&p)) else {
                continue;
            };
            facts.push(foreign_key(
                table,
                parent,
                batch.start_line + holder.start_position().row as u32,
            ));
        }

        // Constraint shapes the grammar nests differently still show up textually
        if facts.is_empty() {
            let text = slice(&batch.text, statement);
            let blanked = blank_comments_and_strings(&text);
            let first_line = batch.start_line + statement.start_position().row as u32;
            facts.extend(regex_foreign_keys(&blanked, table, first_line));
        }
        facts
    }

    /// Facts from header patterns, for batches the grammar rejects
    fn header_facts(&self, batch: &Batch) -> Vec<Fact> {
        let blanked = blank_comments_and_strings(&batch.text);
        let headers: Vec<_> = OBJECT_HEADER_RE.captures_iter(&blanked).collect();

        let mut facts = Vec::new();
        let mut consumed_until = 0usize;
        for (index, caps) in headers.iter().enumerate() {
            let (Some(whole), Some(verb), Some(kind), Some(raw_name)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            if whole.start() < consumed_until {
                continue;
            }
            let Some(kind) = NodeKind::from_string(kind.as_str()) else {
                continue;
            };
            let Some(name) = object_reference_name(raw_name.as_str()) else {
                continue;
            };

            let is_routine = matches!(
                kind,
                NodeKind::View | NodeKind::Proc | NodeKind::Func | NodeKind::Trigger
            );
            // Routine bodies run to the end of the batch
            let end = if is_routine {
                blanked.len()
            } else {
                headers
                    .get(index + 1)
                    .and_then(|next| next.get(0))
                    .map(|m| m.start())
                    .unwrap_or(blanked.len())
            };
            consumed_until = end;

            let line = batch.start_line + line_offset(&blanked, whole.start());
            let segment = &blanked[whole.start()..end];
            let original = batch.text.get(whole.start()..end).unwrap_or("").trim_end();
            let is_alter_table =
                kind == NodeKind::Table && verb.as_str().eq_ignore_ascii_case("ALTER");

            let object = DbObjectRef::new(name, kind);
            facts.push(Fact::DefineObject {
                object: object.clone(),
                line,
                body: (!is_alter_table && !original.is_empty()).then(|| original.to_string()),
            });

            match kind {
                NodeKind::Table => facts.extend(regex_foreign_keys(segment, &object, line)),
                NodeKind::Synonym => {
                    if let Some(target) = SYNONYM_FOR_RE
                        .captures(segment)
                        .and_then(|c| c.get(1))
                        .and_then(|m| object_reference_name(m.as_str()))
                    {
                        facts.push(Fact::ObjectLink {
                            from: object.clone(),
                            to: DbObjectRef::table_like(target),
                            relation: Relation::SynonymFor,
                            line,
                        });
                    }
                }
                NodeKind::Trigger => {
                    let target = TRIGGER_ON_RE
                        .captures(segment)
                        .and_then(|c| c.get(1))
                        .and_then(|m| object_reference_name(m.as_str()));
                    if let Some(target) = &target {
                        facts.push(Fact::ObjectLink {
                            from: object.clone(),
                            to: DbObjectRef::table_like(target.clone()),
                            relation: Relation::On,
                            line,
                        });
                    }
                    let references: Vec<ObjectReference> = analyze(original)
                        .references
                        .into_iter()
                        .filter(|r| {
                            r.intent != AccessIntent::Read
                                || !target.as_ref().is_some_and(|t| same_name(&r.name, t))
                        })
                        .collect();
                    facts.extend(dependency_facts(&object, &references, line));
                }
                NodeKind::View | NodeKind::Proc | NodeKind::Func => {
                    let references = analyze(original).references;
                    facts.extend(dependency_facts(&object, &references, line));
                }
                _ => {}
            }
        }
        facts
    }
}

/// ReadsFrom / WritesTo / Executes links from a routine to what its body touches
fn dependency_facts(from: &DbObjectRef, references: &[ObjectReference], line: u32) -> Vec<Fact> {
    references
        .iter()
        .filter(|r| !same_name(&r.name, &from.name))
        .map(|r| {
            let (to, relation) = match r.intent {
                AccessIntent::Read => (DbObjectRef::table_like(r.name.clone()), Relation::ReadsFrom),
                AccessIntent::Write => (DbObjectRef::table_like(r.name.clone()), Relation::WritesTo),
                AccessIntent::Execute => (
                    DbObjectRef::new(r.name.clone(), NodeKind::Proc),
                    Relation::Executes,
                ),
            };
            Fact::ObjectLink {
                from: from.clone(),
                to,
                relation,
                line,
            }
        })
        .collect()
}

fn regex_foreign_keys(blanked: &str, table: &DbObjectRef, first_line: u32) -> Vec<Fact> {
    REFERENCES_RE
        .captures_iter(blanked)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            let parent = object_reference_name(m.as_str())?;
            Some(foreign_key(
                table,
                parent,
                first_line + line_offset(blanked, m.start()),
            ))
        })
        .collect()
}

fn foreign_key(child: &DbObjectRef, parent: QualifiedName, line: u32) -> Fact {
    Fact::ObjectLink {
        from: child.clone(),
        to: DbObjectRef::new(parent, NodeKind::Table),
        relation: Relation::ForeignKey,
        line,
    }
}

fn same_name(a: &QualifiedName, b: &QualifiedName) -> bool {
    a.name.eq_ignore_ascii_case(&b.name)
        && match (&a.schema, &b.schema) {
            (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
            _ => true,
        }
}

fn slice(text: &str, node: &Node) -> String {
    text.get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .to_string()
}
