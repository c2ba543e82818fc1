// SQLite graph artifact

use super::test_utils::{merged, migration_facts, schema_facts};
use crate::database::GraphDatabase;
use tempfile::TempDir;

const SCHEMA: &str = r#"
CREATE TABLE dbo.Customer (Id INT PRIMARY KEY);
GO
CREATE TABLE dbo.Orders (Id INT, CustomerId INT, FOREIGN KEY (CustomerId) REFERENCES dbo.Customer(Id));
GO
CREATE PROCEDURE dbo.PurgeOrders AS DELETE FROM dbo.Orders;
GO
"#;

const MIGRATION: &str = r#"
namespace Shop.Migrations
{
    [Migration(9)]
    public class AddOrders : Migration
    {
        public override void Up()
        {
            Alter.Table("Orders").AddColumn("Total").AsDecimal();
            Execute.Sql("UPDATE dbo.Orders SET Total = 0");
        }
    }
}
"#;

#[test]
fn test_counts_round_trip_through_sqlite() {
    let graph = merged(&[
        schema_facts("db/schema.sql", SCHEMA),
        migration_facts("src/Migrations/AddOrders.cs", MIGRATION),
    ]);
    let stats = graph.stats();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.db");
    let mut db = GraphDatabase::create(&path).unwrap();
    db.write_graph(&graph, &stats).unwrap();

    assert_eq!(db.node_count().unwrap(), graph.node_count());
    assert_eq!(db.edge_count().unwrap(), graph.edge_count());
    assert_eq!(db.stub_count().unwrap(), stats.stub_nodes);
    assert_eq!(
        db.run_info("node_count").unwrap().as_deref(),
        Some(graph.node_count().to_string().as_str())
    );
    assert_eq!(
        db.run_info("tool_version").unwrap().as_deref(),
        Some(env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn test_edges_bodies_and_provenance_are_stored() {
    let graph = merged(&[
        schema_facts("db/schema.sql", SCHEMA),
        migration_facts("src/Migrations/AddOrders.cs", MIGRATION),
    ]);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.db");
    let mut db = GraphDatabase::create(&path).unwrap();
    db.write_graph(&graph, &graph.stats()).unwrap();

    let edges = db.edges_from("DBO.ORDERS|TABLE").unwrap();
    let fk = edges
        .iter()
        .find(|e| e.relation == "ForeignKey")
        .expect("stored foreign key");
    assert_eq!(fk.to_key, "dbo.Customer|TABLE");
    assert_eq!(fk.to_kind, "TABLE");
    assert_eq!(fk.provenance, "schema");

    let body = db.body("dbo.PurgeOrders|PROC").unwrap().expect("procedure body");
    assert!(body.contains("DELETE FROM dbo.Orders"));

    let raw_sql = db
        .body("code:Shop.Migrations.AddOrders|MIGRATION")
        .unwrap()
        .expect("migration raw sql");
    assert!(raw_sql.contains("UPDATE dbo.Orders SET Total = 0"));
}

#[test]
fn test_create_replaces_existing_file() {
    let graph = merged(&[schema_facts("db/schema.sql", SCHEMA)]);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.db");

    {
        let mut db = GraphDatabase::create(&path).unwrap();
        db.write_graph(&graph, &graph.stats()).unwrap();
    }
    let db = GraphDatabase::create(&path).unwrap();
    assert_eq!(db.node_count().unwrap(), 0);
    assert_eq!(db.edge_count().unwrap(), 0);
}
