// Inline statement extractor
//
// Finds statement text embedded in C# sources. Arguments of hot call sites
// (`ExecuteSqlRaw`, `QueryAsync`, `new SqlCommand`, ...) are taken as
// statements whenever they reduce to a constant string; every other string
// literal must pass the `looks_like_statement` gate. Each accepted snippet is
// attributed to its enclosing method.

mod heuristic;

pub use heuristic::{MIN_STATEMENT_LENGTH, looks_like_statement, normalize};

use crate::extractors::csharp::{
    CSharpSource, ConstantResolver, MethodDecl, binary_operator, callee_name,
};
use crate::extractors::sql::{AccessIntent, analyze};
use crate::graph::{CodeRef, DbObjectRef, Fact, FactSource, FileFacts, NodeKind, Relation};
use crate::workspace::GraphConfig;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use tree_sitter::Node;

/// Accepted statement text and where it sits
#[derive(Debug, Clone)]
struct Snippet<'t> {
    anchor: Node<'t>,
    line: u32,
    text: String,
}

pub struct InlineStatementExtractor {
    hot_tokens: Vec<String>,
}

impl InlineStatementExtractor {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            hot_tokens: config.hot_method_tokens(),
        }
    }

    pub fn is_hot(&self, callee: &str) -> bool {
        self.hot_tokens.iter().any(|token| callee.contains(token.as_str()))
    }

    pub fn extract(&self, source: &CSharpSource) -> FileFacts {
        let mut resolver = ConstantResolver::new(source);
        let mut snippets = self.hot_call_snippets(source, &mut resolver);
        snippets.extend(heuristic_snippets(source, &mut resolver));
        snippets.sort_by_key(|s| (s.line, s.anchor.start_byte()));

        let methods = source.methods();
        let mut defined = BTreeSet::new();
        let mut facts = Vec::new();

        for snippet in &snippets {
            let method = owner_of(source, &methods, snippet);
            if defined.insert(method.code.full_name.clone()) {
                facts.push(Fact::DefineCode {
                    code: method.code.clone(),
                    line: method.line,
                    body: method.body.clone(),
                    attributes: BTreeMap::new(),
                });
            }

            let analysis = analyze(&snippet.text);
            if analysis.references.is_empty() {
                facts.push(Fact::Statement {
                    method: method.code.clone(),
                    line: snippet.line,
                    text: snippet.text.clone(),
                });
                continue;
            }

            for reference in analysis.references {
                let (to, relation) = match reference.intent {
                    AccessIntent::Read => (DbObjectRef::table_like(reference.name), Relation::ReadsFrom),
                    AccessIntent::Write => (DbObjectRef::table_like(reference.name), Relation::WritesTo),
                    AccessIntent::Execute => (
                        DbObjectRef::new(reference.name, NodeKind::Proc),
                        Relation::Executes,
                    ),
                };
                facts.push(Fact::CodeLink {
                    from: method.code.clone(),
                    to,
                    relation,
                    line: snippet.line,
                });
            }
        }

        debug!(
            "{}: {} inline snippets, {} facts",
            source.file_path(),
            snippets.len(),
            facts.len()
        );
        FileFacts::new(source.file_path(), FactSource::Inline, facts)
    }

    /// First arguments of hot calls that reduce to a constant string
    fn hot_call_snippets<'t>(
        &self,
        source: &'t CSharpSource,
        resolver: &mut ConstantResolver<'t>,
    ) -> Vec<Snippet<'t>> {
        let mut snippets = Vec::new();
        for call in source.call_sites() {
            let Some(callee) = callee_name(source, &call) else {
                continue;
            };
            if !self.is_hot(&callee) {
                continue;
            }
            let Some(argument) = source.arguments(&call).first().map(|a| a.value) else {
                continue;
            };
            // Runtime values are skipped silently
            let Some(text) = resolver.resolve(argument) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            snippets.push(Snippet {
                anchor: argument,
                line: source.line(&argument),
                text,
            });
        }
        snippets
    }
}

/// Literals no hot call claimed that pass the statement gate
fn heuristic_snippets<'t>(
    source: &'t CSharpSource,
    resolver: &mut ConstantResolver<'t>,
) -> Vec<Snippet<'t>> {
    let mut snippets = Vec::new();
    let mut chains_seen = BTreeSet::new();

    for literal in source.string_literals() {
        if resolver.claimed().contains(&literal.start_byte()) {
            continue;
        }

        // A `"a" + B + "c"` chain is judged as a whole when it is constant
        let top = concatenation_top(source, literal);
        if top.id() != literal.id() && chains_seen.insert(top.id()) {
            if let Some(text) = resolver.resolve(top) {
                if looks_like_statement(&text) {
                    snippets.push(Snippet {
                        anchor: top,
                        line: source.line(&top),
                        text,
                    });
                }
                continue;
            }
        }
        if resolver.claimed().contains(&literal.start_byte()) {
            continue;
        }

        let Some(text) = resolver.resolve(literal) else {
            continue;
        };
        if looks_like_statement(&text) {
            snippets.push(Snippet {
                anchor: literal,
                line: source.line(&literal),
                text,
            });
        }
    }
    snippets
}

/// Outermost `+` expression (through parentheses) containing `node`
fn concatenation_top<'t>(source: &'t CSharpSource, node: Node<'t>) -> Node<'t> {
    let mut top = node;
    while let Some(parent) = top.parent() {
        let is_concat = match parent.kind() {
            "parenthesized_expression" => true,
            "binary_expression" => binary_operator(source, &parent) == Some("+"),
            _ => false,
        };
        if !is_concat {
            break;
        }
        top = parent;
    }
    top
}

/// The METHOD node a snippet is attributed to
struct Owner {
    code: CodeRef,
    line: u32,
    body: Option<String>,
}

fn owner_of(source: &CSharpSource, methods: &[MethodDecl], snippet: &Snippet) -> Owner {
    if let Some(method) = CSharpSource::enclosing_method(methods, snippet.line) {
        return Owner {
            code: CodeRef::new(method.full_name.clone(), NodeKind::Method),
            line: method.start_line,
            body: Some(source.text(&method.node)),
        };
    }

    // Field initializers and other member-level literals
    let synthetic = match source
        .enclosing_type(&snippet.anchor)
        .and_then(|t| source.type_full_name(&t))
    {
        Some(type_name) => format!("{}.<init>", type_name),
        None => format!("{}.<file>", source.file_path()),
    };
    Owner {
        code: CodeRef::new(synthetic, NodeKind::Method),
        line: snippet.line,
        body: None,
    }
}
