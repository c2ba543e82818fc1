// Whole-graph properties: determinism, order independence, stub policy

use super::test_utils::{
    edge_triples, entity_config, inline_facts, merged, migration_facts, orm_facts, schema_facts,
};
use crate::graph::{DependencyGraph, FileFacts, NodeKind};

const SCHEMA: &str = r#"
CREATE TABLE dbo.Customer (Id INT PRIMARY KEY);
GO
CREATE TABLE dbo.Product (Id INT PRIMARY KEY, Name NVARCHAR(100));
GO
CREATE VIEW dbo.ProductNames AS SELECT Name FROM dbo.Product;
GO
"#;

const MODEL: &str = r#"
namespace Shop.Models
{
    public class BaseEntity { }

    [Table("Product")]
    public class Product : BaseEntity { }

    public class Customer : BaseEntity { }
}
"#;

const REPOSITORY: &str = r#"
namespace Shop.Data
{
    public class ProductRepository
    {
        public void Names(IDbConnection db)
        {
            db.Query("SELECT Name FROM dbo.ProductNames");
        }
    }
}
"#;

const MIGRATION: &str = r#"
namespace Shop.Migrations
{
    [Migration(42)]
    public class AddWarehouse : Migration
    {
        public override void Up()
        {
            Create.Table("Warehouse");
            Alter.Table("Product").AddColumn("WarehouseId").AsInt32();
        }
    }
}
"#;

fn all_facts() -> Vec<FileFacts> {
    let mut facts = vec![
        schema_facts("db/schema.sql", SCHEMA),
        inline_facts("src/Data/ProductRepository.cs", REPOSITORY),
        migration_facts("src/Migrations/AddWarehouse.cs", MIGRATION),
    ];
    facts.extend(orm_facts(&entity_config(), &[("src/Models/Shop.cs", MODEL)]));
    facts
}

fn node_summary(graph: &DependencyGraph) -> Vec<(String, NodeKind, bool, Option<String>)> {
    graph
        .nodes()
        .map(|n| (n.key.to_lowercase(), n.kind, n.is_stub, n.source_file.clone()))
        .collect()
}

#[test]
fn test_rerun_on_unchanged_input_is_identical() {
    let first = merged(&all_facts());
    let second = merged(&all_facts());

    assert_eq!(node_summary(&first), node_summary(&second));
    assert_eq!(edge_triples(&first), edge_triples(&second));
}

#[test]
fn test_merge_order_does_not_change_the_graph() {
    let forward = merged(&all_facts());
    let mut reversed_facts = all_facts();
    reversed_facts.reverse();
    let reversed = merged(&reversed_facts);

    assert_eq!(node_summary(&forward), node_summary(&reversed));
    assert_eq!(edge_triples(&forward), edge_triples(&reversed));
}

#[test]
fn test_cross_extractor_graph_shape() {
    let graph = merged(&all_facts());

    // Defined by the schema script even though the migration saw it first in reverse order
    let product = graph.node("dbo.Product|TABLE").unwrap();
    assert!(!product.is_stub);
    assert_eq!(product.source_file.as_deref(), Some("db/schema.sql"));

    // Only the migration knows the warehouse table
    assert!(graph.node("dbo.Warehouse|TABLE").unwrap().is_stub);

    // The inline read resolves to the view, not a table stub
    assert!(graph.contains("dbo.ProductNames|VIEW"));
    assert!(!graph.contains("dbo.ProductNames|TABLE"));

    // Name-equality mapping against a schema-defined table
    assert!(
        graph
            .edge("code:Shop.Models.Customer|ENTITY", "dbo.Customer|TABLE", crate::graph::Relation::MapsTo)
            .is_some()
    );

    let stats = graph.stats();
    assert_eq!(stats.nodes_by_kind.get("MIGRATION"), Some(&1));
    assert_eq!(stats.stub_nodes, 1);
    assert_eq!(stats.node_total(), graph.node_count());
}

#[test]
fn test_domain_tags_fill_once() {
    let mut graph = DependencyGraph::new("dbo");
    graph.merge(&schema_facts("db/billing.sql", "CREATE TABLE dbo.Invoice (Id INT)"), Some("billing"));
    graph.merge(&schema_facts("db/other.sql", "CREATE TABLE dbo.Invoice (Id INT)"), Some("other"));
    graph.resolve_deferred();

    let node = graph.node("dbo.Invoice|TABLE").unwrap();
    assert_eq!(node.domain.as_deref(), Some("billing"));
    assert_eq!(node.source_file.as_deref(), Some("db/billing.sql"));
}

#[test]
fn test_node_kinds_serialize_as_key_suffixes() {
    for kind in [NodeKind::DbSet, NodeKind::Synonym, NodeKind::Migration] {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
    }
    assert_eq!(serde_json::to_string(&NodeKind::DbSet).unwrap(), "\"DBSET\"");
}
