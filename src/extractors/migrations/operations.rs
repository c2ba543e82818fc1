// Migration operation matching
//
// Each invocation chain in a forward-migration body is flattened receiver
// first and matched against the FluentMigrator expression roots
// (`Create.Table(...)`, `Delete.FromTable(...)`, ...) and the EF Core
// `MigrationBuilder` methods (`CreateTable(name: ...)`, `AddColumn<T>(...)`).

use crate::extractors::csharp::{CSharpSource, ChainSegment, ConstantResolver, callee_name};
use crate::extractors::orm::element_type;
use crate::graph::{QualifiedName, Relation};
use tree_sitter::Node;

/// FluentMigrator expression roots
const FLUENT_ROOTS: &[&str] = &[
    "Create", "Delete", "Alter", "Rename", "Schema", "Insert", "Update", "Execute",
];

/// FluentMigrator segments whose argument names the table a column/index/key lives on
const TABLE_TARGET_SEGMENTS: &[&str] = &["OnTable", "FromTable", "Table"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOperation {
    CreateTable {
        table: QualifiedName,
    },
    DropTable {
        table: QualifiedName,
    },
    CreateIndex {
        table: QualifiedName,
        index: Option<String>,
    },
    DropIndex {
        table: QualifiedName,
        index: Option<String>,
    },
    /// Probe or structural change to an existing table (columns, keys, renames)
    TouchTable {
        table: QualifiedName,
        column: Option<String>,
        /// Principal table of an added foreign key
        principal: Option<QualifiedName>,
    },
    DataChange {
        table: QualifiedName,
    },
    RawSql {
        text: String,
    },
}

impl MigrationOperation {
    pub fn label(&self) -> &'static str {
        match self {
            MigrationOperation::CreateTable { .. } => "CreateTable",
            MigrationOperation::DropTable { .. } => "DropTable",
            MigrationOperation::CreateIndex { .. } => "CreateIndex",
            MigrationOperation::DropIndex { .. } => "DropIndex",
            MigrationOperation::TouchTable { .. } => "TouchTable",
            MigrationOperation::DataChange { .. } => "DataChange",
            MigrationOperation::RawSql { .. } => "RawSql",
        }
    }

    pub fn table(&self) -> Option<&QualifiedName> {
        match self {
            MigrationOperation::CreateTable { table }
            | MigrationOperation::DropTable { table }
            | MigrationOperation::CreateIndex { table, .. }
            | MigrationOperation::DropIndex { table, .. }
            | MigrationOperation::TouchTable { table, .. }
            | MigrationOperation::DataChange { table } => Some(table),
            MigrationOperation::RawSql { .. } => None,
        }
    }

    /// Edge from the migration to the operation's table; raw SQL has none
    pub fn relation(&self) -> Option<Relation> {
        match self {
            MigrationOperation::DataChange { .. } => Some(Relation::DataChange),
            MigrationOperation::RawSql { .. } => None,
            _ => Some(Relation::SchemaChange),
        }
    }
}

/// Resolves argument expressions against one migration method's constants
pub struct OperationMatcher<'s, 'r> {
    source: &'s CSharpSource,
    resolver: &'r mut ConstantResolver<'s>,
}

impl<'s, 'r> OperationMatcher<'s, 'r> {
    pub fn new(source: &'s CSharpSource, resolver: &'r mut ConstantResolver<'s>) -> Self {
        Self { source, resolver }
    }

    /// Operations of one flattened chain; unknown shapes yield nothing
    pub fn match_chain(&mut self, chain: &[ChainSegment<'s>], root: Node<'s>) -> Vec<MigrationOperation> {
        let chain: Vec<&ChainSegment<'s>> = chain
            .iter()
            .skip_while(|s| s.name == "this" || s.name == "base")
            .collect();
        let Some(first) = chain.first() else {
            return Vec::new();
        };

        if !first.is_call() && FLUENT_ROOTS.contains(&first.name.as_str()) {
            if let Some(operation) = self.match_fluent(&chain) {
                return vec![operation];
            }
        }
        self.match_builder(&chain, root)
    }

    fn resolve(&mut self, node: Option<Node<'s>>) -> Option<String> {
        self.resolver.resolve(node?).filter(|v| !v.trim().is_empty())
    }

    fn table_name(&mut self, node: Option<Node<'s>>, schema: Option<String>) -> Option<QualifiedName> {
        let name = self.resolve(node)?;
        let mut table = QualifiedName::parse(&name)?;
        if let Some(schema) = schema.filter(|s| !s.trim().is_empty()) {
            table.schema = Some(schema);
        }
        Some(table)
    }

    /// `Create.Table("Product").InSchema("sales")`, `Delete.Index("IX").OnTable("Product")`, ...
    fn match_fluent(&mut self, chain: &[&ChainSegment<'s>]) -> Option<MigrationOperation> {
        let root = chain[0].name.as_str();
        let verb = chain.get(1).filter(|s| s.is_call())?;
        let schema = chain
            .iter()
            .find(|s| s.is_call() && (s.name == "InSchema" || s.name == "Schema"))
            .and_then(|s| s.first_arg())
            .and_then(|node| self.resolve(Some(node)));

        // Table a column/index/key operation is attached to
        let target_segment = chain[2..]
            .iter()
            .find(|s| s.is_call() && TABLE_TARGET_SEGMENTS.contains(&s.name.as_str()))
            .copied();
        let target = |matcher: &mut Self| {
            let node = target_segment.and_then(|s| s.first_arg());
            matcher.table_name(node, schema.clone())
        };

        let operation = match (root, verb.name.as_str()) {
            ("Create", "Table") => MigrationOperation::CreateTable {
                table: self.table_name(verb.first_arg(), schema.clone())?,
            },
            ("Delete", "Table") => MigrationOperation::DropTable {
                table: self.table_name(verb.first_arg(), schema.clone())?,
            },
            ("Create", "Index") | ("Delete", "Index") => {
                let index = self.resolve(verb.first_arg());
                let table = target(self)?;
                if root == "Create" {
                    MigrationOperation::CreateIndex { table, index }
                } else {
                    MigrationOperation::DropIndex { table, index }
                }
            }
            ("Create", "ForeignKey") => {
                let table = chain
                    .iter()
                    .find(|s| s.name == "FromTable" && s.is_call())
                    .and_then(|s| s.first_arg());
                let principal = chain
                    .iter()
                    .find(|s| s.name == "ToTable" && s.is_call())
                    .and_then(|s| s.first_arg());
                MigrationOperation::TouchTable {
                    table: self.table_name(table, schema.clone())?,
                    column: None,
                    principal: self.table_name(principal, None),
                }
            }
            ("Create" | "Delete" | "Alter" | "Rename", "Column") => MigrationOperation::TouchTable {
                column: self.resolve(verb.first_arg()),
                table: target(self)?,
                principal: None,
            },
            ("Delete", "ForeignKey") => MigrationOperation::TouchTable {
                table: target(self)?,
                column: None,
                principal: None,
            },
            ("Alter" | "Rename" | "Schema", "Table") => MigrationOperation::TouchTable {
                table: self.table_name(verb.first_arg(), schema.clone())?,
                column: None,
                principal: None,
            },
            ("Schema", "Schema") => {
                let probe_schema = self.resolve(verb.first_arg());
                let table = chain
                    .iter()
                    .skip(2)
                    .find(|s| s.name == "Table" && s.is_call())
                    .and_then(|s| s.first_arg());
                MigrationOperation::TouchTable {
                    table: self.table_name(table, probe_schema)?,
                    column: None,
                    principal: None,
                }
            }
            ("Insert", "IntoTable") | ("Update", "Table") | ("Delete", "FromTable") => {
                MigrationOperation::DataChange {
                    table: self.table_name(verb.first_arg(), schema.clone())?,
                }
            }
            ("Execute", "Sql") => MigrationOperation::RawSql {
                text: self.sql_text(verb.first_arg()?),
            },
            _ => return None,
        };
        Some(operation)
    }

    /// `migrationBuilder.CreateTable(name: "Product", ...)` and friends
    fn match_builder(&mut self, chain: &[&ChainSegment<'s>], root: Node<'s>) -> Vec<MigrationOperation> {
        let mut operations = Vec::new();
        for segment in chain.iter().filter(|s| s.is_call()) {
            let schema = segment
                .named_arg("schema")
                .and_then(|node| self.resolve(Some(node)));

            let operation = match segment.name.as_str() {
                "CreateTable" => self
                    .table_name(segment.arg("name", 0), schema)
                    .map(|table| MigrationOperation::CreateTable { table }),
                "DropTable" => self
                    .table_name(segment.arg("name", 0), schema)
                    .map(|table| MigrationOperation::DropTable { table }),
                "RenameTable" => self
                    .table_name(segment.arg("name", 0), schema)
                    .map(|table| MigrationOperation::TouchTable {
                        table,
                        column: None,
                        principal: None,
                    }),
                "CreateIndex" | "DropIndex" => {
                    let index = self.resolve(segment.arg("name", 0));
                    self.table_name(segment.arg("table", 1), schema).map(|table| {
                        if segment.name == "CreateIndex" {
                            MigrationOperation::CreateIndex { table, index }
                        } else {
                            MigrationOperation::DropIndex { table, index }
                        }
                    })
                }
                "AddColumn" | "DropColumn" | "RenameColumn" | "AlterColumn" => {
                    let column = self.resolve(segment.arg("name", 0));
                    self.table_name(segment.arg("table", 1), schema)
                        .map(|table| MigrationOperation::TouchTable {
                            table,
                            column,
                            principal: None,
                        })
                }
                "AddForeignKey" | "DropForeignKey" => {
                    let principal_schema = segment
                        .named_arg("principalSchema")
                        .and_then(|node| self.resolve(Some(node)));
                    let principal = self.table_name(segment.named_arg("principalTable"), principal_schema);
                    let column = self.resolve(segment.named_arg("column"));
                    self.table_name(segment.arg("table", 1), schema)
                        .map(|table| MigrationOperation::TouchTable {
                            table,
                            column,
                            principal,
                        })
                }
                // `table.ForeignKey(...)` inside a CreateTable constraints lambda
                "ForeignKey" => self.constraint_foreign_key(segment, root),
                "InsertData" | "UpdateData" | "DeleteData" => self
                    .table_name(segment.arg("table", 0), schema)
                    .map(|table| MigrationOperation::DataChange { table }),
                "InsertEntity" | "InsertEntities" | "UpdateEntity" | "UpdateEntities"
                | "DeleteEntity" | "DeleteEntities" => segment
                    .first_arg()
                    .and_then(|arg| self.constructed_type(arg))
                    .map(|name| MigrationOperation::DataChange {
                        table: QualifiedName::new(None, &name),
                    }),
                "Sql" => segment.first_arg().map(|arg| MigrationOperation::RawSql {
                    text: self.sql_text(arg),
                }),
                _ => None,
            };
            operations.extend(operation);
        }
        operations
    }

    fn constraint_foreign_key(
        &mut self,
        segment: &ChainSegment<'s>,
        root: Node<'s>,
    ) -> Option<MigrationOperation> {
        let principal_node = segment.named_arg("principalTable")?;
        let principal_schema = segment
            .named_arg("principalSchema")
            .and_then(|node| self.resolve(Some(node)));
        let principal = self.table_name(Some(principal_node), principal_schema);

        let mut current = root.parent();
        while let Some(node) = current {
            if node.kind() == "invocation_expression"
                && callee_name(self.source, &node).as_deref() == Some("CreateTable")
            {
                let arguments = self.source.arguments(&node);
                let name = arguments
                    .iter()
                    .find(|a| a.name.is_some_and(|n| n.eq_ignore_ascii_case("name")))
                    .or_else(|| arguments.iter().find(|a| a.name.is_none()))
                    .map(|a| a.value);
                let schema = arguments
                    .iter()
                    .find(|a| a.name.is_some_and(|n| n.eq_ignore_ascii_case("schema")))
                    .and_then(|a| self.resolve(Some(a.value)));
                let column = segment
                    .named_arg("column")
                    .and_then(|node| self.resolve(Some(node)));
                return self
                    .table_name(name, schema)
                    .map(|table| MigrationOperation::TouchTable {
                        table,
                        column,
                        principal,
                    });
            }
            current = node.parent();
        }
        None
    }

    /// Unqualified type name of `new Product { ... }` (or the first one inside a collection)
    fn constructed_type(&self, arg: Node<'s>) -> Option<String> {
        let creation = if arg.kind() == "object_creation_expression" {
            Some(arg)
        } else {
            self.source
                .base()
                .find_nodes_by_type(&arg, "object_creation_expression")
                .into_iter()
                .next()
        }?;
        let type_node = creation.child_by_field_name("type")?;
        Some(element_type(&self.source.text(&type_node)))
    }

    /// Constant value of a `Sql(...)` argument, else its expression text
    fn sql_text(&mut self, arg: Node<'s>) -> String {
        self.resolver
            .resolve(arg)
            .unwrap_or_else(|| self.source.text(&arg))
    }
}
