// Extraction facts
//
// Extractors never touch the graph. They return ordered `Fact` lists that the
// merger folds into the shared graph afterwards.

use super::keys::{QualifiedName, code_key, db_key};
use super::{FactSource, NodeKind, Relation};
use std::collections::BTreeMap;

/// Reference to a database object by (possibly unqualified) name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbObjectRef {
    pub name: QualifiedName,
    pub kind: NodeKind,
    /// Kind inferred from usage only (`FROM x` may be a table, view or synonym)
    pub kind_is_guess: bool,
}

impl DbObjectRef {
    pub fn new(name: QualifiedName, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            kind_is_guess: false,
        }
    }

    /// A relation used in a statement whose real kind is settled at merge time
    pub fn table_like(name: QualifiedName) -> Self {
        Self {
            name,
            kind: NodeKind::Table,
            kind_is_guess: true,
        }
    }

    pub fn key(&self, default_schema: &str) -> String {
        db_key(self.name.schema_or(default_schema), &self.name.name, self.kind)
    }

    pub fn key_as(&self, default_schema: &str, kind: NodeKind) -> String {
        db_key(self.name.schema_or(default_schema), &self.name.name, kind)
    }
}

/// Reference to a code construct by fully-qualified name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRef {
    pub full_name: String,
    pub kind: NodeKind,
}

impl CodeRef {
    pub fn new(full_name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            full_name: full_name.into(),
            kind,
        }
    }

    /// Last dotted segment
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.full_name)
    }

    /// Everything before the last dotted segment
    pub fn container(&self) -> Option<&str> {
        self.full_name.rsplit_once('.').map(|(ns, _)| ns)
    }

    pub fn key(&self) -> String {
        code_key(&self.full_name, self.kind)
    }
}

/// How an explicit table mapping was declared; earlier variants win
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MappingVia {
    Attribute,
    Fluent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    /// `[Table("x")]` or `.ToTable("x")`
    Explicit { object: DbObjectRef, via: MappingVia },
    /// Name-equality against TABLE nodes that exist once every fact is merged
    ByName { candidates: Vec<String> },
    /// A set maps wherever its entity type maps
    SameAsEntity { entity: CodeRef },
}

/// One atomic extraction result
#[derive(Debug, Clone, PartialEq)]
pub enum Fact {
    /// A database object defined at this location
    DefineObject {
        object: DbObjectRef,
        line: u32,
        body: Option<String>,
    },
    /// A code construct defined at this location
    DefineCode {
        code: CodeRef,
        line: u32,
        body: Option<String>,
        attributes: BTreeMap<String, String>,
    },
    /// Database object to database object (FK, trigger target, view dependency)
    ObjectLink {
        from: DbObjectRef,
        to: DbObjectRef,
        relation: Relation,
        line: u32,
    },
    /// Code construct to database object
    CodeLink {
        from: CodeRef,
        to: DbObjectRef,
        relation: Relation,
        line: u32,
    },
    /// ENTITY/DBSET to table, resolved after the merge
    MapsTo {
        from: CodeRef,
        target: MappingTarget,
        line: u32,
    },
    /// Fluent relationship between two entity types, child to parent
    EntityForeignKey {
        child: CodeRef,
        parent: CodeRef,
        line: u32,
    },
    /// Accepted statement text that referenced no object
    Statement {
        method: CodeRef,
        line: u32,
        text: String,
    },
}

impl Fact {
    pub fn line(&self) -> u32 {
        match self {
            Fact::DefineObject { line, .. }
            | Fact::DefineCode { line, .. }
            | Fact::ObjectLink { line, .. }
            | Fact::CodeLink { line, .. }
            | Fact::MapsTo { line, .. }
            | Fact::EntityForeignKey { line, .. }
            | Fact::Statement { line, .. } => *line,
        }
    }
}

/// The ordered fact list one extractor produced for one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileFacts {
    pub file: String,
    pub source: FactSource,
    pub facts: Vec<Fact>,
}

impl FileFacts {
    pub fn new(file: impl Into<String>, source: FactSource, mut facts: Vec<Fact>) -> Self {
        // Stable: facts on the same line keep emission order
        facts.sort_by_key(|f| f.line());
        Self {
            file: file.into(),
            source,
            facts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
