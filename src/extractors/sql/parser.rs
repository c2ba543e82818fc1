// Statement parser
//
// Parses SQL text with the tree-sitter-sequel grammar and lists the objects a
// statement touches and how: read, written or executed. Text the grammar
// rejects is scanned with reference patterns instead, so callers always get an
// answer.

use super::helpers::{
    TABLE_REFERENCE_RE, blank_comments_and_strings, cte_names, exec_targets, is_alias,
    normalize_for_parse, object_reference_name, resolve_alias, table_aliases, write_targets,
};
use crate::extractors::base::BaseExtractor;
use crate::graph::QualifiedName;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

/// Parents under which an `object_reference` names a column qualifier, not a relation
const QUALIFIER_PARENTS: &[&str] = &["field", "all_fields", "column", "assignment"];

#[derive(Debug, Error)]
pub enum StatementError {
    #[error("Failed to parse statement: {0}")]
    Parse(String),

    #[error("Statement text is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessIntent {
    Read,
    Write,
    Execute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    pub name: QualifiedName,
    pub intent: AccessIntent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementAnalysis {
    /// Distinct references in first-seen order
    pub references: Vec<ObjectReference>,
    /// False when the pattern fallback produced the references
    pub parsed: bool,
}

/// A syntax tree over normalized statement text.
///
/// Comments and string contents are blanked and `[x]` identifiers become
/// `"x"` before parsing; byte offsets and lines match the original text.
pub struct ParsedSql {
    base: BaseExtractor,
    tree: Tree,
}

impl ParsedSql {
    /// Parse `text`, keeping the tree even when it contains error nodes
    pub fn parse_lenient(text: &str) -> Result<Self, StatementError> {
        let normalized = normalize_for_parse(text);
        if normalized.trim().is_empty() {
            return Err(StatementError::Empty);
        }

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_sequel::LANGUAGE.into())
            .map_err(|e| StatementError::Parse(format!("Error loading SQL grammar: {}", e)))?;
        let tree = parser
            .parse(&normalized, None)
            .ok_or_else(|| StatementError::Parse("parser returned no tree".to_string()))?;

        Ok(Self {
            base: BaseExtractor::new(String::new(), normalized),
            tree,
        })
    }

    /// Parse `text`; any syntax error is reported as `StatementError::Parse`
    pub fn parse(text: &str) -> Result<Self, StatementError> {
        let parsed = Self::parse_lenient(text)?;
        if let Some(line) = parsed.first_error_line() {
            return Err(StatementError::Parse(format!("syntax error at line {}", line)));
        }
        Ok(parsed)
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn base(&self) -> &BaseExtractor {
        &self.base
    }

    /// Normalized source text
    pub fn text(&self) -> &str {
        &self.base.content
    }

    pub fn node_text(&self, node: &Node) -> String {
        self.base.get_node_text(node)
    }

    /// 1-based line of the first error or missing node
    pub fn first_error_line(&self) -> Option<u32> {
        let root = self.root();
        if !root.has_error() {
            return None;
        }
        let mut line = None;
        self.base.walk_tree(
            &root,
            &mut |node: &Node, _depth: u32| {
                if line.is_none() && (node.is_error() || node.is_missing()) {
                    line = Some(node.start_position().row as u32 + 1);
                }
            },
            0,
        );
        line.or(Some(root.start_position().row as u32 + 1))
    }

    /// Name held by an `object_reference` node
    pub fn object_name(&self, node: &Node) -> Option<QualifiedName> {
        object_reference_name(&self.node_text(node))
    }

    /// `object_reference` nodes under `scope` that name relations
    pub fn relation_nodes<'t>(&'t self, scope: &Node<'t>) -> Vec<Node<'t>> {
        self.base
            .find_nodes_by_type(scope, "object_reference")
            .into_iter()
            .filter(|node| is_relation(node))
            .collect()
    }

    /// References inside `scope`, skipping the node with id `defining`
    pub fn references_in(&self, scope: &Node, defining: Option<usize>) -> Vec<ObjectReference> {
        let scope_text = self
            .text()
            .get(scope.start_byte()..scope.end_byte())
            .unwrap_or("");
        let aliases = table_aliases(scope_text);
        let writes = write_targets(scope_text, &aliases);
        let ctes = cte_names(scope_text);

        let mut references = Vec::new();
        for node in self.relation_nodes(scope) {
            if Some(node.id()) == defining {
                continue;
            }
            let Some(name) = self.object_name(&node) else {
                continue;
            };
            if is_local_name(&name, &ctes) || is_alias(&name, &aliases) {
                continue;
            }
            let intent = if writes.contains(&name.display().to_lowercase()) {
                AccessIntent::Write
            } else {
                AccessIntent::Read
            };
            references.push(ObjectReference { name, intent });
        }
        references.extend(exec_references(scope_text));
        dedupe(references)
    }
}

fn is_relation(node: &Node) -> bool {
    // `alias.column` qualifiers are followed by a dot
    if node.next_sibling().is_some_and(|next| next.kind() == ".") {
        return false;
    }
    match node.parent() {
        Some(parent) if QUALIFIER_PARENTS.contains(&parent.kind()) => false,
        // Built-in function calls are unqualified; user functions carry a schema
        Some(parent) if parent.kind() == "invocation" => node.named_child_count() > 1,
        _ => true,
    }
}

/// Parse without error tolerance
pub fn parse_statements(text: &str) -> Result<ParsedSql, StatementError> {
    ParsedSql::parse(text)
}

/// References in `text`; never fails
pub fn analyze(text: &str) -> StatementAnalysis {
    match parse_statements(text) {
        Ok(parsed) => StatementAnalysis {
            references: parsed.references_in(&parsed.root(), None),
            parsed: true,
        },
        Err(StatementError::Empty) => StatementAnalysis::default(),
        Err(e) => {
            debug!("Pattern scan after parse failure: {}", e);
            StatementAnalysis {
                references: fallback_references(text),
                parsed: false,
            }
        }
    }
}

/// Pattern scan for `FROM|JOIN|INTO|UPDATE|MERGE|DELETE FROM <name>` and `EXEC <name>`
pub fn fallback_references(text: &str) -> Vec<ObjectReference> {
    let blanked = blank_comments_and_strings(text);
    let ctes = cte_names(&blanked);
    let aliases = table_aliases(&blanked);
    let writes = write_targets(&blanked, &aliases);

    let mut references = Vec::new();
    for caps in TABLE_REFERENCE_RE.captures_iter(&blanked) {
        let (Some(verb), Some(raw)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(name) = object_reference_name(raw.as_str()) else {
            continue;
        };
        let name = resolve_alias(name, raw.start(), &aliases);
        if is_local_name(&name, &ctes) {
            continue;
        }
        let verb = verb.as_str().to_ascii_uppercase();
        let reads = (verb == "FROM" || verb == "JOIN")
            && !writes.contains(&name.display().to_lowercase());
        let intent = if reads {
            AccessIntent::Read
        } else {
            AccessIntent::Write
        };
        references.push(ObjectReference { name, intent });
    }
    references.extend(exec_references(&blanked));
    dedupe(references)
}

fn exec_references(text: &str) -> Vec<ObjectReference> {
    exec_targets(text)
        .into_iter()
        .map(|name| ObjectReference {
            name,
            intent: AccessIntent::Execute,
        })
        .collect()
}

fn is_local_name(name: &QualifiedName, ctes: &[String]) -> bool {
    name.schema.is_none() && ctes.contains(&name.name.to_lowercase())
}

/// One reference per (name, intent); a written name drops its read
fn dedupe(references: Vec<ObjectReference>) -> Vec<ObjectReference> {
    let written: BTreeSet<String> = references
        .iter()
        .filter(|r| r.intent == AccessIntent::Write)
        .map(|r| r.name.display().to_lowercase())
        .collect();

    let mut seen = BTreeSet::new();
    references
        .into_iter()
        .filter(|reference| {
            let display = reference.name.display().to_lowercase();
            if reference.intent == AccessIntent::Read && written.contains(&display) {
                return false;
            }
            seen.insert((display, reference.intent))
        })
        .collect()
}
