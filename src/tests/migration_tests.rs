// Migration operation extraction

use super::test_utils::{merged, migration_facts, schema_facts};
use crate::graph::{Fact, NodeKind, Relation};

const FLUENT_MIGRATION: &str = r#"
using FluentMigrator;

namespace Shop.Migrations
{
    [Migration(20240101)]
    public class AddProduct : Migration
    {
        public override void Up()
        {
            Create.Table("Product")
                .WithColumn("Id").AsInt32().PrimaryKey()
                .WithColumn("Name").AsString(100);

            Create.Index("IX_Product_Name").OnTable("Product").OnColumn("Name");
            Insert.IntoTable("Product").InSchema("dbo").Row(new { Id = 1, Name = "Seed" });
        }

        public override void Down()
        {
            Delete.Table("Product");
        }
    }
}
"#;

#[test]
fn test_create_table_yields_migration_and_schema_change() {
    let graph = merged(&[migration_facts("Migrations/AddProduct.cs", FLUENT_MIGRATION)]);

    let migration = graph
        .node("code:Shop.Migrations.AddProduct|MIGRATION")
        .expect("migration node");
    assert_eq!(migration.kind, NodeKind::Migration);
    assert_eq!(migration.attributes.get("version").map(String::as_str), Some("20240101"));
    assert_eq!(
        migration.attributes.get("operations").map(String::as_str),
        Some("CreateTable,CreateIndex,DataChange")
    );

    assert!(
        graph
            .edge("code:Shop.Migrations.AddProduct|MIGRATION", "dbo.Product|TABLE", Relation::SchemaChange)
            .is_some()
    );
    assert!(
        graph
            .edge("code:Shop.Migrations.AddProduct|MIGRATION", "dbo.Product|TABLE", Relation::DataChange)
            .is_some()
    );
    // Nothing defined the table: it is a stub
    assert!(graph.node("dbo.Product|TABLE").unwrap().is_stub);
}

#[test]
fn test_down_method_is_not_scanned() {
    let facts = migration_facts("Migrations/AddProduct.cs", FLUENT_MIGRATION);
    let graph = merged(&[facts]);
    // CreateTable and CreateIndex collapse into one SchemaChange edge
    assert_eq!(graph.edges_from("code:Shop.Migrations.AddProduct|MIGRATION").len(), 2);
}

#[test]
fn test_schema_script_fills_migration_stub() {
    let graph = merged(&[
        migration_facts("Migrations/AddProduct.cs", FLUENT_MIGRATION),
        schema_facts("db/product.sql", "CREATE TABLE dbo.Product (Id INT PRIMARY KEY)"),
    ]);
    let table = graph.node("dbo.Product|TABLE").unwrap();
    assert!(!table.is_stub);
    assert_eq!(table.source_file.as_deref(), Some("db/product.sql"));
}

#[test]
fn test_local_alias_resolves_table_name() {
    let code = r#"
namespace Shop.Migrations
{
    [Migration(7)]
    public class ProbeProduct : Migration
    {
        public override void Up()
        {
            var t = nameof(Product);
            if (!Schema.Table(t).Exists())
            {
                Alter.Table(t).InSchema("sales").AddColumn("Sku").AsString(20);
            }
        }

        public override void Down() { }
    }
}
"#;
    let graph = merged(&[migration_facts("Migrations/ProbeProduct.cs", code)]);

    assert!(
        graph
            .edge("code:Shop.Migrations.ProbeProduct|MIGRATION", "dbo.Product|TABLE", Relation::SchemaChange)
            .is_some()
    );
    assert!(
        graph
            .edge("code:Shop.Migrations.ProbeProduct|MIGRATION", "sales.Product|TABLE", Relation::SchemaChange)
            .is_some()
    );
}

#[test]
fn test_migration_builder_operations() {
    let code = r#"
using Microsoft.EntityFrameworkCore.Migrations;

namespace Shop.Data.Migrations
{
    [Migration("20240315120000_CreateOrders")]
    public partial class CreateOrders : Migration
    {
        protected override void Up(MigrationBuilder migrationBuilder)
        {
            migrationBuilder.CreateTable(
                name: "Orders",
                schema: "sales",
                columns: table => new
                {
                    Id = table.Column<int>(nullable: false),
                    CustomerId = table.Column<int>(nullable: false)
                },
                constraints: table =>
                {
                    table.PrimaryKey("PK_Orders", x => x.Id);
                    table.ForeignKey(
                        name: "FK_Orders_Customers",
                        column: x => x.CustomerId,
                        principalTable: "Customers",
                        principalColumn: "Id");
                });

            migrationBuilder.AddColumn<string>(
                name: "Email",
                table: "Customers",
                nullable: true);

            migrationBuilder.Sql("UPDATE dbo.Customers SET Email = ''");
        }

        protected override void Down(MigrationBuilder migrationBuilder)
        {
            migrationBuilder.DropTable(name: "Orders", schema: "sales");
        }
    }
}
"#;
    let graph = merged(&[migration_facts("Data/Migrations/20240315120000_CreateOrders.cs", code)]);
    let key = "code:Shop.Data.Migrations.CreateOrders|MIGRATION";

    let migration = graph.node(key).expect("migration node");
    assert_eq!(migration.attributes.get("version").map(String::as_str), Some("20240315120000"));

    assert!(graph.edge(key, "sales.Orders|TABLE", Relation::SchemaChange).is_some());
    assert!(graph.edge(key, "dbo.Customers|TABLE", Relation::SchemaChange).is_some());
    assert!(
        graph
            .edge("sales.Orders|TABLE", "dbo.Customers|TABLE", Relation::ForeignKey)
            .is_some()
    );

    // Raw SQL is kept on the node, not turned into edges
    let body = graph.body(key).expect("raw sql body");
    assert!(body.contains("UPDATE dbo.Customers SET Email"));
    assert!(graph.edge(key, "dbo.Customers|TABLE", Relation::WritesTo).is_none());
}

#[test]
fn test_entity_data_operations_use_constructed_type() {
    let code = r#"
namespace Shop.Migrations
{
    public class SeedCategories : DataMigration
    {
        public override void Up()
        {
            InsertEntity(new Category { Name = "Books" });
            DeleteEntities(new List<Category> { new Category { Name = "Old" } });
            Log("seeded");
        }
    }
}
"#;
    let facts = migration_facts("Migrations/SeedCategories.cs", code);
    let data_changes = facts
        .facts
        .iter()
        .filter(|f| matches!(f, Fact::CodeLink { relation: Relation::DataChange, .. }))
        .count();
    assert_eq!(data_changes, 2);

    let graph = merged(&[facts]);
    assert!(
        graph
            .edge("code:Shop.Migrations.SeedCategories|MIGRATION", "dbo.Category|TABLE", Relation::DataChange)
            .is_some()
    );
}

#[test]
fn test_migration_without_recognised_operations_keeps_its_node() {
    let code = r#"
namespace Shop.Migrations
{
    [Migration(3)]
    public class Noop : Migration
    {
        public override void Up()
        {
            Console.WriteLine("nothing to do");
        }
    }
}
"#;
    let graph = merged(&[migration_facts("Migrations/Noop.cs", code)]);
    assert!(graph.contains("code:Shop.Migrations.Noop|MIGRATION"));
    assert!(graph.edges_from("code:Shop.Migrations.Noop|MIGRATION").is_empty());
}

#[test]
fn test_plain_classes_are_not_migrations() {
    let code = r#"
namespace Shop.Services
{
    public class MigrationPlanner
    {
        public void Up() { Create.Table("Nope"); }
    }
}
"#;
    let facts = migration_facts("Services/MigrationPlanner.cs", code);
    assert!(facts.is_empty());
}
