// Fluent model configuration
//
// Reads `modelBuilder.Entity<T>()...` chains and `EntityTypeBuilder<T>`
// configuration bodies for table bindings (`ToTable`, `ToView`) and
// relationships (`HasOne`/`HasMany` ... `HasForeignKey`).

use super::hierarchy::{TypeIndex, element_type, generic_argument};
use crate::extractors::csharp::{
    CSharpSource, ChainSegment, ConstantResolver, METHOD_DECLARATION_KINDS, flatten_member_chain,
    is_chain_root, rightmost_identifier,
};
use crate::graph::{NodeKind, QualifiedName};
use crate::workspace::simple_type_name;
use tree_sitter::Node;

const ENTITY_BUILDER_TYPE: &str = "EntityTypeBuilder";
const ENTITY_CONFIGURATION_TYPE: &str = "IEntityTypeConfiguration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FluentFinding {
    /// `ToTable("n", "s")` / `ToView("n")` for an entity (simple name)
    TableBinding {
        entity: String,
        object: QualifiedName,
        kind: NodeKind,
        line: u32,
    },
    /// Child entity holds the foreign key to the parent entity (simple names)
    Relationship {
        child: String,
        parent: String,
        line: u32,
    },
}

/// Every table binding and relationship configured in `source`
pub fn scan_fluent_configuration(source: &CSharpSource, index: &TypeIndex) -> Vec<FluentFinding> {
    let mut resolver = ConstantResolver::new(source);
    let mut findings = Vec::new();

    for call in source.call_sites() {
        if call.kind() != "invocation_expression" || !is_chain_root(&call) {
            continue;
        }
        let chain = flatten_member_chain(source, call);
        let Some((entity, start)) = entity_context(source, &chain, call) else {
            continue;
        };
        let configuration = &chain[start..];
        let line = source.line(&call);

        findings.extend(table_binding(&mut resolver, &entity, configuration, line));
        findings.extend(relationship(source, &mut resolver, index, &entity, configuration, line));
    }
    findings
}

/// Entity a chain configures, and where its configuration segments start
fn entity_context(
    source: &CSharpSource,
    chain: &[ChainSegment],
    call: Node,
) -> Option<(String, usize)> {
    if let Some(position) = chain
        .iter()
        .position(|s| s.name == "Entity" && !s.generic_args.is_empty())
    {
        let entity = simple_type_name(&chain[position].generic_args[0]);
        return Some((entity, position + 1));
    }

    // `builder.ToTable(...)` where `builder` is an EntityTypeBuilder<T>
    let receiver = chain.first().filter(|s| !s.is_call())?;
    let entity = builder_parameter_entity(source, call, &receiver.name)
        .or_else(|| lambda_parameter_entity(source, call, &receiver.name))
        .or_else(|| configuration_entity(source, call))?;
    Some((entity, 1))
}

fn builder_parameter_entity(source: &CSharpSource, call: Node, receiver: &str) -> Option<String> {
    let method = source
        .base()
        .find_parent_of_types(&call, METHOD_DECLARATION_KINDS)?;
    source
        .parameters(&method)
        .into_iter()
        .find(|(name, type_text)| name == receiver && simple_type_name(type_text) == ENTITY_BUILDER_TYPE)
        .and_then(|(_, type_text)| generic_argument(&type_text))
}

/// `modelBuilder.Entity<Order>(b => { b.ToTable("Orders"); })`
fn lambda_parameter_entity(source: &CSharpSource, call: Node, receiver: &str) -> Option<String> {
    let mut current = call.parent();
    while let Some(node) = current {
        if node.kind() == "lambda_expression" && lambda_parameters(&source.text(&node)).iter().any(|p| p == receiver) {
            let outer = source.base().find_parent_of_type(&node, "invocation_expression")?;
            let function = outer.child_by_field_name("function")?;
            let segments = flatten_member_chain(source, function);
            let last = segments.last()?;
            if last.name == "Entity" {
                return last.generic_args.first().map(|t| simple_type_name(t));
            }
            return None;
        }
        current = node.parent();
    }
    None
}

/// Type argument of an enclosing `IEntityTypeConfiguration<T>` implementation
fn configuration_entity(source: &CSharpSource, call: Node) -> Option<String> {
    let owner = source.enclosing_type(&call)?;
    source
        .base_types(&owner)
        .iter()
        .find(|b| simple_type_name(b) == ENTITY_CONFIGURATION_TYPE)
        .and_then(|b| generic_argument(b))
}

fn table_binding<'t>(
    resolver: &mut ConstantResolver<'t>,
    entity: &str,
    configuration: &[ChainSegment<'t>],
    line: u32,
) -> Option<FluentFinding> {
    let segment = configuration
        .iter()
        .find(|s| s.is_call() && (s.name == "ToTable" || s.name == "ToView"))?;
    let name = resolver.resolve(segment.arg("name", 0)?)?;
    let schema = segment
        .arg("schema", 1)
        .and_then(|node| resolver.resolve(node));

    let mut object = QualifiedName::parse(&name)?;
    if let Some(schema) = schema.filter(|s| !s.trim().is_empty()) {
        object.schema = Some(schema);
    }
    let kind = if segment.name == "ToView" {
        NodeKind::View
    } else {
        NodeKind::Table
    };
    Some(FluentFinding::TableBinding {
        entity: entity.to_string(),
        object,
        kind,
        line,
    })
}

/// Child/parent of a `HasOne|HasMany ... HasForeignKey` chain.
///
/// The side owning the foreign key is the child, whatever order the calls
/// appear in. Without a resolvable owner the chain shape decides: `HasOne`
/// makes the configured entity the child, `HasMany` makes the target the child.
fn relationship<'t>(
    source: &'t CSharpSource,
    resolver: &mut ConstantResolver<'t>,
    index: &TypeIndex,
    entity: &str,
    configuration: &[ChainSegment<'t>],
    line: u32,
) -> Option<FluentFinding> {
    let has = configuration
        .iter()
        .find(|s| s.name == "HasOne" || s.name == "HasMany")?;
    let foreign_key = configuration
        .iter()
        .find(|s| s.name == "HasForeignKey" && s.is_call())?;
    let target = navigation_target(source, resolver, index, entity, has)?;

    let (child, parent) = if let Some(dependent) = foreign_key.generic_args.first() {
        let dependent = simple_type_name(dependent);
        if dependent == target {
            (target, entity.to_string())
        } else {
            (entity.to_string(), target)
        }
    } else {
        let property = foreign_key
            .first_arg()
            .and_then(|arg| member_name(source, resolver, arg));
        match property {
            Some(p) if index.property_type(entity, &p).is_some() => (entity.to_string(), target),
            Some(p) if index.property_type(&target, &p).is_some() => (target, entity.to_string()),
            _ if has.name == "HasMany" => (target, entity.to_string()),
            _ => (entity.to_string(), target),
        }
    };

    Some(FluentFinding::Relationship {
        child,
        parent,
        line,
    })
}

/// Type on the other end of `HasOne<T>()`, `HasOne(o => o.Customer)` or `HasMany("Orders")`
fn navigation_target<'t>(
    source: &'t CSharpSource,
    resolver: &mut ConstantResolver<'t>,
    index: &TypeIndex,
    entity: &str,
    has: &ChainSegment<'t>,
) -> Option<String> {
    if let Some(generic) = has.generic_args.first() {
        return Some(simple_type_name(generic));
    }
    let navigation = member_name(source, resolver, has.first_arg()?)?;
    match index.property_type(entity, &navigation) {
        Some(type_text) => Some(element_type(&type_text)),
        None => Some(navigation),
    }
}

/// Property named by a lambda (`o => o.CustomerId`) or a constant string
fn member_name<'t>(
    source: &'t CSharpSource,
    resolver: &mut ConstantResolver<'t>,
    arg: Node<'t>,
) -> Option<String> {
    if arg.kind() == "lambda_expression" {
        return lambda_member(&source.text(&arg));
    }
    resolver.resolve(arg)
}

/// Parameter names of a lambda's text
fn lambda_parameters(lambda: &str) -> Vec<String> {
    let Some((params, _)) = lambda.split_once("=>") else {
        return Vec::new();
    };
    params
        .trim()
        .trim_start_matches("async")
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .filter_map(|p| p.split_whitespace().last())
        .map(str::to_string)
        .collect()
}

/// `o => o.Customer` -> `Customer`; composite keys and method calls yield `None`
fn lambda_member(lambda: &str) -> Option<String> {
    let (_, body) = lambda.split_once("=>")?;
    let body = body.trim();
    if !body.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') || !body.contains('.') {
        return None;
    }
    rightmost_identifier(body)
}
