// Schema script extraction, merged into a graph

use super::test_utils::{edge_triples, merged, schema_facts};
use crate::graph::{Fact, NodeKind, Relation};

#[test]
fn test_create_table_defines_table_node() {
    let graph = merged(&[schema_facts(
        "db/customer.sql",
        "CREATE TABLE dbo.Customer(Id INT PRIMARY KEY)",
    )]);

    let node = graph.node("dbo.Customer|TABLE").expect("table node");
    assert_eq!(node.kind, NodeKind::Table);
    assert_eq!(node.name, "Customer");
    assert!(!node.is_stub);
    assert_eq!(node.source_file.as_deref(), Some("db/customer.sql"));
}

#[test]
fn test_foreign_key_links_child_to_parent() {
    let graph = merged(&[schema_facts(
        "db/order.sql",
        "CREATE TABLE dbo.Order(Id INT, CustomerId INT, FOREIGN KEY(CustomerId) REFERENCES dbo.Customer(Id))",
    )]);

    assert!(graph.contains("dbo.Order|TABLE"));
    assert!(graph.contains("dbo.Customer|TABLE"));
    let edge = graph
        .edge("dbo.Order|TABLE", "dbo.Customer|TABLE", Relation::ForeignKey)
        .expect("foreign key edge");
    assert_eq!(edge.provenance_label(), "schema");
    // Referenced only, never defined here
    assert!(graph.node("dbo.Customer|TABLE").unwrap().is_stub);
}

#[test]
fn test_batches_define_routines_with_bodies_and_dependencies() {
    let sql = r#"
CREATE TABLE [dbo].[Customer] (
    [Id] INT NOT NULL PRIMARY KEY,
    [Active] BIT NOT NULL
);
GO

CREATE VIEW dbo.ActiveCustomers AS
    SELECT Id FROM dbo.Customer WHERE Active = 1;
GO

CREATE PROCEDURE dbo.DeactivateCustomer @Id INT AS
BEGIN
    UPDATE dbo.Customer SET Active = 0 WHERE Id = @Id;
END
GO
"#;
    let graph = merged(&[schema_facts("db/schema.sql", sql)]);

    assert!(graph.contains("dbo.Customer|TABLE"));
    assert!(graph.contains("dbo.ActiveCustomers|VIEW"));
    assert!(graph.contains("dbo.DeactivateCustomer|PROC"));

    assert!(
        graph
            .edge("dbo.ActiveCustomers|VIEW", "dbo.Customer|TABLE", Relation::ReadsFrom)
            .is_some()
    );
    assert!(
        graph
            .edge("dbo.DeactivateCustomer|PROC", "dbo.Customer|TABLE", Relation::WritesTo)
            .is_some()
    );

    let body = graph.body("dbo.DeactivateCustomer|PROC").expect("procedure body");
    assert!(body.contains("UPDATE dbo.Customer"));
}

#[test]
fn test_usage_resolves_to_existing_view() {
    let sql = r#"
CREATE VIEW dbo.OpenOrders AS SELECT Id FROM dbo.Orders WHERE Closed = 0
GO
CREATE PROCEDURE dbo.CountOpen AS SELECT COUNT(*) FROM dbo.OpenOrders
GO
"#;
    let graph = merged(&[schema_facts("db/views.sql", sql)]);

    assert!(
        graph
            .edge("dbo.CountOpen|PROC", "dbo.OpenOrders|VIEW", Relation::ReadsFrom)
            .is_some()
    );
    assert!(!graph.contains("dbo.OpenOrders|TABLE"));
}

#[test]
fn test_trigger_is_attached_to_its_table() {
    let sql = r#"
CREATE TRIGGER dbo.trg_Customer_Audit ON dbo.Customer AFTER UPDATE AS
BEGIN
    INSERT INTO dbo.CustomerAudit (CustomerId) SELECT Id FROM inserted;
END
"#;
    let graph = merged(&[schema_facts("db/triggers.sql", sql)]);

    assert!(
        graph
            .edge("dbo.trg_Customer_Audit|TRIGGER", "dbo.Customer|TABLE", Relation::On)
            .is_some()
    );
    assert!(
        graph
            .edge("dbo.trg_Customer_Audit|TRIGGER", "dbo.CustomerAudit|TABLE", Relation::WritesTo)
            .is_some()
    );
}

#[test]
fn test_unqualified_names_use_default_schema() {
    let graph = merged(&[schema_facts(
        "db/product.sql",
        "CREATE TABLE Product (Id INT PRIMARY KEY, Name NVARCHAR(100))",
    )]);
    assert!(graph.contains("dbo.Product|TABLE"));
}

#[test]
fn test_malformed_scripts_never_panic() {
    let inputs = [
        "",
        "GO\nGO\n",
        "CREATE TABLE ((((",
        "CREATE PROCEDURE dbo.Broken AS BEGIN SELECT FROM WHERE END END",
        "/* unterminated comment CREATE TABLE dbo.X(Id INT)",
        "CREATE TABLE dbo.Weird ( 'unterminated string",
        "\u{feff}@@@ ;;; ]]] [[[",
    ];
    for input in inputs {
        let facts = schema_facts("db/broken.sql", input);
        // Whatever survives must still merge cleanly
        let graph = merged(&[facts]);
        let _ = edge_triples(&graph);
    }
}

#[test]
fn test_unparseable_batches_still_yield_objects_and_dependencies() {
    let sql = r#"
CREATE TABLE dbo.Invoice (
    Id INT NOT NULL,
    CustomerId INT NOT NULL,
    CONSTRAINT FK_Invoice_Customer FOREIGN KEY (CustomerId) REFERENCES dbo.Customer (Id)
) WITH (((
GO
CREATE PROCEDURE dbo.SettleInvoices AS
BEGIN
    UPDATE dbo.Invoice SET Paid = 1 WHERE ((;
    SELECT Id FROM dbo.Customer;
    EXEC dbo.NotifyBilling;
END END
GO
"#;
    let graph = merged(&[schema_facts("db/broken.sql", sql)]);

    let invoice = graph.node("dbo.Invoice|TABLE").expect("table from header scan");
    assert!(!invoice.is_stub);
    assert!(graph.node("dbo.SettleInvoices|PROC").is_some_and(|n| !n.is_stub));
    assert!(graph.body("dbo.SettleInvoices|PROC").is_some_and(|b| b.contains("NotifyBilling")));

    assert_eq!(
        edge_triples(&graph),
        vec![
            (
                "dbo.invoice|table".to_string(),
                "ForeignKey".to_string(),
                "dbo.customer|table".to_string()
            ),
            (
                "dbo.settleinvoices|proc".to_string(),
                "Executes".to_string(),
                "dbo.notifybilling|proc".to_string()
            ),
            (
                "dbo.settleinvoices|proc".to_string(),
                "ReadsFrom".to_string(),
                "dbo.customer|table".to_string()
            ),
            (
                "dbo.settleinvoices|proc".to_string(),
                "WritesTo".to_string(),
                "dbo.invoice|table".to_string()
            ),
        ]
    );
}

#[test]
fn test_update_through_alias_writes_the_aliased_table() {
    let sql = "CREATE PROCEDURE dbo.Deact AS BEGIN UPDATE c SET Active = 0 FROM dbo.Customer c WHERE c.Id = 1; END";
    let graph = merged(&[schema_facts("db/deact.sql", sql)]);

    assert_eq!(
        edge_triples(&graph),
        vec![(
            "dbo.deact|proc".to_string(),
            "WritesTo".to_string(),
            "dbo.customer|table".to_string()
        )]
    );
    assert!(!graph.contains("dbo.c|TABLE"));
}

#[test]
fn test_delete_through_alias_writes_the_aliased_table() {
    let sql = r#"
CREATE PROCEDURE dbo.PurgeInactive AS
BEGIN
    DELETE o FROM dbo.Orders AS o JOIN dbo.Customer c ON c.Id = o.CustomerId WHERE c.Active = 0;
END
"#;
    let graph = merged(&[schema_facts("db/purge.sql", sql)]);

    assert!(
        graph
            .edge("dbo.PurgeInactive|PROC", "dbo.Orders|TABLE", Relation::WritesTo)
            .is_some()
    );
    assert!(
        graph
            .edge("dbo.PurgeInactive|PROC", "dbo.Customer|TABLE", Relation::ReadsFrom)
            .is_some()
    );
    assert!(!graph.contains("dbo.o|TABLE"));
    assert!(!graph.contains("dbo.c|TABLE"));
}

#[test]
fn test_type_sequence_and_synonym_definitions() {
    let sql = r#"
CREATE TYPE dbo.IdList AS TABLE (Id INT NOT NULL)
GO
CREATE SEQUENCE dbo.OrderSeq AS INT START WITH 1 INCREMENT BY 1
GO
CREATE SYNONYM dbo.Cust FOR dbo.Customer
GO
"#;
    let graph = merged(&[schema_facts("db/objects.sql", sql)]);

    for (key, kind) in [
        ("dbo.IdList|TYPE", NodeKind::Type),
        ("dbo.OrderSeq|SEQUENCE", NodeKind::Sequence),
        ("dbo.Cust|SYNONYM", NodeKind::Synonym),
    ] {
        let node = graph.node(key).unwrap_or_else(|| panic!("missing {}", key));
        assert_eq!(node.kind, kind);
        assert!(!node.is_stub);
    }

    assert!(
        graph
            .edge("dbo.Cust|SYNONYM", "dbo.Customer|TABLE", Relation::SynonymFor)
            .is_some()
    );
    assert!(graph.node("dbo.Customer|TABLE").unwrap().is_stub);
}

#[test]
fn test_usage_resolves_through_synonym_when_no_table_or_view_exists() {
    let sql = r#"
CREATE SYNONYM dbo.Cust FOR archive.Customer
GO
CREATE PROCEDURE dbo.CountCustomers AS SELECT COUNT(*) FROM dbo.Cust
GO
"#;
    let graph = merged(&[schema_facts("db/synonyms.sql", sql)]);

    assert!(
        graph
            .edge("dbo.CountCustomers|PROC", "dbo.Cust|SYNONYM", Relation::ReadsFrom)
            .is_some()
    );
    assert!(!graph.contains("dbo.Cust|TABLE"));
    assert!(
        graph
            .edge("dbo.Cust|SYNONYM", "archive.Customer|TABLE", Relation::SynonymFor)
            .is_some()
    );
}

#[test]
fn test_usage_prefers_table_over_synonym_of_the_same_name() {
    let sql = r#"
CREATE TABLE dbo.Ledger (Id INT PRIMARY KEY)
GO
CREATE SYNONYM dbo.Ledger FOR archive.Ledger
GO
CREATE VIEW dbo.LedgerIds AS SELECT Id FROM dbo.Ledger
GO
"#;
    let graph = merged(&[schema_facts("db/ledger.sql", sql)]);

    assert!(
        graph
            .edge("dbo.LedgerIds|VIEW", "dbo.Ledger|TABLE", Relation::ReadsFrom)
            .is_some()
    );
    assert!(
        graph
            .edge("dbo.LedgerIds|VIEW", "dbo.Ledger|SYNONYM", Relation::ReadsFrom)
            .is_none()
    );
}

#[test]
fn test_facts_are_in_line_order() {
    let sql = "CREATE TABLE dbo.A (Id INT)\nGO\nCREATE TABLE dbo.B (Id INT)\nGO\n";
    let facts = schema_facts("db/ab.sql", sql);
    let lines: Vec<u32> = facts.facts.iter().map(Fact::line).collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
    assert_eq!(facts.facts.len(), 2);
}
