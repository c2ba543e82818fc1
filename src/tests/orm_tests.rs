// ORM mapping extraction: entities, object sets, fluent configuration

use super::test_utils::{entity_config, merged, orm_facts, schema_facts};
use crate::graph::{Fact, NodeKind, Relation};
use crate::workspace::GraphConfig;

const PRODUCT: &str = r#"
using System.ComponentModel.DataAnnotations.Schema;

namespace Shop.Models
{
    public abstract class BaseEntity
    {
        public int Id { get; set; }
    }

    [Table("Product", Schema = "dbo")]
    public class Product : BaseEntity
    {
        public string Name { get; set; }
    }

    public class PriceCalculator
    {
        public decimal Total { get; set; }
    }
}
"#;

const SHOP_MODEL: &str = r#"
namespace Shop.Models
{
    public abstract class BaseEntity
    {
        public int Id { get; set; }
    }

    public abstract class AuditedEntity : BaseEntity
    {
        public DateTime CreatedAt { get; set; }
    }

    [Table("Customers")]
    public class Customer : AuditedEntity
    {
        public ICollection<Order> Orders { get; set; }
    }

    [Table("Orders")]
    public class Order : BaseEntity
    {
        public int CustomerId { get; set; }
        public Customer Customer { get; set; }
    }

    public class Invoice : BaseEntity
    {
        public int OrderId { get; set; }
    }
}
"#;

const SHOP_CONTEXT: &str = r#"
namespace Shop.Data
{
    public class ShopContext : DbContext
    {
        public DbSet<Order> Orders { get; set; }
        public DbSet<Customer> Customers { get; set; }
        public DbSet<Invoice> Invoices { get; set; }

        protected override void OnModelCreating(ModelBuilder modelBuilder)
        {
            modelBuilder.Entity<Order>()
                .HasOne(o => o.Customer)
                .WithMany(c => c.Orders)
                .HasForeignKey(o => o.CustomerId);
        }
    }
}
"#;

const SHOP_SCHEMA: &str = r#"
CREATE TABLE dbo.Customers (Id INT PRIMARY KEY, CreatedAt DATETIME2 NOT NULL);
GO
CREATE TABLE dbo.Orders (
    Id INT PRIMARY KEY,
    CustomerId INT NOT NULL,
    CONSTRAINT FK_Orders_Customers FOREIGN KEY (CustomerId) REFERENCES dbo.Customers(Id)
);
GO
CREATE TABLE dbo.Invoice (Id INT PRIMARY KEY, OrderId INT NOT NULL);
GO
"#;

#[test]
fn test_table_attribute_maps_entity() {
    let graph = merged(&orm_facts(&entity_config(), &[("src/Models/Product.cs", PRODUCT)]));

    let entity = graph
        .node("code:Shop.Models.Product|ENTITY")
        .expect("entity node");
    assert_eq!(entity.kind, NodeKind::Entity);
    let edge = graph
        .edge("code:Shop.Models.Product|ENTITY", "dbo.Product|TABLE", Relation::MapsTo)
        .expect("maps-to edge");
    assert_eq!(edge.provenance_label(), "orm");
    // Mapped without a schema script: the table is a stub
    assert!(graph.node("dbo.Product|TABLE").unwrap().is_stub);
}

#[test]
fn test_classes_outside_entity_hierarchy_are_ignored() {
    let facts = orm_facts(&entity_config(), &[("src/Models/Product.cs", PRODUCT)]);
    let graph = merged(&facts);

    assert!(!graph.contains("code:Shop.Models.PriceCalculator|ENTITY"));
    assert!(!graph.contains("code:Shop.Models.BaseEntity|ENTITY"));
}

#[test]
fn test_no_entity_base_types_means_no_entities() {
    let facts = orm_facts(&GraphConfig::default(), &[("src/Models/Product.cs", PRODUCT)]);
    assert!(facts.iter().all(|f| {
        f.facts
            .iter()
            .all(|fact| !matches!(fact, Fact::DefineCode { code, .. } if code.kind == NodeKind::Entity))
    }));
}

#[test]
fn test_object_sets_follow_explicit_entity_mappings() {
    let mut facts = vec![schema_facts("db/shop.sql", SHOP_SCHEMA)];
    facts.extend(orm_facts(
        &entity_config(),
        &[
            ("src/Models/Shop.cs", SHOP_MODEL),
            ("src/Data/ShopContext.cs", SHOP_CONTEXT),
        ],
    ));
    let graph = merged(&facts);

    assert!(graph.contains("code:Shop.Data.ShopContext.Orders|DBSET"));
    assert!(
        graph
            .edge("code:Shop.Data.ShopContext.Orders|DBSET", "dbo.Orders|TABLE", Relation::MapsTo)
            .is_some()
    );
    // Entity reached through an intermediate base class
    assert!(
        graph
            .edge("code:Shop.Models.Customer|ENTITY", "dbo.Customers|TABLE", Relation::MapsTo)
            .is_some()
    );
    // No explicit mapping: the entity name matches the table
    assert!(
        graph
            .edge("code:Shop.Models.Invoice|ENTITY", "dbo.Invoice|TABLE", Relation::MapsTo)
            .is_some()
    );
    // The set name "Invoices" has no table; its entity name "Invoice" does
    assert!(
        graph
            .edge("code:Shop.Data.ShopContext.Invoices|DBSET", "dbo.Invoice|TABLE", Relation::MapsTo)
            .is_some()
    );
}

#[test]
fn test_foreign_key_confirmed_by_schema_and_fluent_chain() {
    let mut facts = vec![schema_facts("db/shop.sql", SHOP_SCHEMA)];
    facts.extend(orm_facts(
        &entity_config(),
        &[
            ("src/Models/Shop.cs", SHOP_MODEL),
            ("src/Data/ShopContext.cs", SHOP_CONTEXT),
        ],
    ));
    let graph = merged(&facts);

    let edge = graph
        .edge("dbo.Orders|TABLE", "dbo.Customers|TABLE", Relation::ForeignKey)
        .expect("foreign key edge");
    assert!(edge.provenance.contains(&crate::graph::FactSource::Schema));
    assert!(edge.provenance.contains(&crate::graph::FactSource::Orm));
    assert_eq!(edge.provenance_label(), "schema,orm");
}

#[test]
fn test_table_attribute_wins_over_fluent_binding() {
    let model = r#"
namespace Shop.Models
{
    public class BaseEntity { }

    [Table("Legacy_Product")]
    public class Product : BaseEntity { }

    public class ProductConfiguration : IEntityTypeConfiguration<Product>
    {
        public void Configure(EntityTypeBuilder<Product> builder)
        {
            builder.ToTable("Products", "catalog");
        }
    }
}
"#;
    let graph = merged(&orm_facts(&entity_config(), &[("src/Models/Product.cs", model)]));

    assert!(
        graph
            .edge("code:Shop.Models.Product|ENTITY", "dbo.Legacy_Product|TABLE", Relation::MapsTo)
            .is_some()
    );
    assert!(!graph.contains("catalog.Products|TABLE"));
}

#[test]
fn test_fluent_binding_inside_entity_lambda() {
    let model = r#"
namespace Shop.Models
{
    public class BaseEntity { }
    public class Category : BaseEntity { }

    public class CatalogContext : DbContext
    {
        protected override void OnModelCreating(ModelBuilder modelBuilder)
        {
            modelBuilder.Entity<Category>(b =>
            {
                b.ToTable("Categories", "catalog");
            });
        }
    }
}
"#;
    let graph = merged(&orm_facts(&entity_config(), &[("src/Models/Catalog.cs", model)]));
    assert!(
        graph
            .edge("code:Shop.Models.Category|ENTITY", "catalog.Categories|TABLE", Relation::MapsTo)
            .is_some()
    );
}
