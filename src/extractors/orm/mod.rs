// ORM mapping extractor
//
// Entity classes (anything deriving from a configured entity base type),
// object-set properties (`DbSet<T>`), their table mappings and the foreign
// keys implied by fluent relationship chains. Table mappings that need the
// whole graph (name equality, a set following its entity) are emitted as
// deferred `MapsTo` targets for the merger.

mod fluent;
mod hierarchy;

pub use fluent::{FluentFinding, scan_fluent_configuration};
pub use hierarchy::{IndexedType, TypeIndex, element_type, generic_argument};

use crate::extractors::csharp::{AttributeUse, CSharpSource, ConstantResolver, TypeDecl};
use crate::graph::{
    CodeRef, DbObjectRef, Fact, FactSource, FileFacts, MappingTarget, MappingVia, NodeKind,
    QualifiedName,
};
use crate::workspace::{GraphConfig, simple_type_name};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const TABLE_ATTRIBUTE: &str = "Table";

pub struct OrmMappingExtractor {
    entity_bases: Vec<String>,
    config: GraphConfig,
    index: Arc<TypeIndex>,
}

impl OrmMappingExtractor {
    pub fn new(config: &GraphConfig, index: Arc<TypeIndex>) -> Self {
        Self {
            entity_bases: config.entity_base_names(),
            config: config.clone(),
            index,
        }
    }

    pub fn is_entity(&self, decl: &TypeDecl) -> bool {
        self.index.derives_from(&decl.base_types, &self.entity_bases)
    }

    pub fn extract(&self, source: &CSharpSource) -> FileFacts {
        let mut resolver = ConstantResolver::new(source);
        let mut facts = Vec::new();

        for decl in source.types() {
            if self.is_entity(&decl) {
                facts.extend(self.entity_facts(&mut resolver, &decl));
            }
            facts.extend(self.object_set_facts(&decl));
        }

        for finding in scan_fluent_configuration(source, &self.index) {
            match finding {
                FluentFinding::TableBinding {
                    entity,
                    object,
                    kind,
                    line,
                } => facts.push(Fact::MapsTo {
                    from: self.entity_ref(&entity),
                    target: MappingTarget::Explicit {
                        object: DbObjectRef::new(object, kind),
                        via: MappingVia::Fluent,
                    },
                    line,
                }),
                FluentFinding::Relationship {
                    child,
                    parent,
                    line,
                } => facts.push(Fact::EntityForeignKey {
                    child: self.entity_ref(&child),
                    parent: self.entity_ref(&parent),
                    line,
                }),
            }
        }

        debug!("{}: {} ORM facts", source.file_path(), facts.len());
        FileFacts::new(source.file_path(), FactSource::Orm, facts)
    }

    fn entity_facts<'t>(&self, resolver: &mut ConstantResolver<'t>, decl: &TypeDecl<'t>) -> Vec<Fact> {
        let code = CodeRef::new(decl.full_name.clone(), NodeKind::Entity);
        let mut facts = vec![Fact::DefineCode {
            code: code.clone(),
            line: decl.start_line,
            body: None,
            attributes: BTreeMap::new(),
        }];

        if let Some((object, line)) = decl
            .attributes
            .iter()
            .filter(|a| a.simple_name() == TABLE_ATTRIBUTE)
            .find_map(|a| table_attribute(resolver, a).map(|o| (o, a.line)))
        {
            facts.push(Fact::MapsTo {
                from: code.clone(),
                target: MappingTarget::Explicit {
                    object: DbObjectRef::new(object, NodeKind::Table),
                    via: MappingVia::Attribute,
                },
                line,
            });
        }

        facts.push(Fact::MapsTo {
            from: code,
            target: MappingTarget::ByName {
                candidates: vec![decl.name.clone()],
            },
            line: decl.start_line,
        });
        facts
    }

    /// `public DbSet<Product> Products { get; set; }`
    fn object_set_facts(&self, decl: &TypeDecl) -> Vec<Fact> {
        let mut facts = Vec::new();
        for property in &decl.properties {
            if !self.config.is_object_set_type(&simple_type_name(&property.type_text)) {
                continue;
            }
            let Some(entity) = generic_argument(&property.type_text) else {
                continue;
            };

            let set = CodeRef::new(
                format!("{}.{}", decl.full_name, property.name),
                NodeKind::DbSet,
            );
            facts.push(Fact::DefineCode {
                code: set.clone(),
                line: property.line,
                body: None,
                attributes: BTreeMap::from([("entity".to_string(), entity.clone())]),
            });
            facts.push(Fact::MapsTo {
                from: set.clone(),
                target: MappingTarget::SameAsEntity {
                    entity: self.entity_ref(&entity),
                },
                line: property.line,
            });
            facts.push(Fact::MapsTo {
                from: set,
                target: MappingTarget::ByName {
                    candidates: vec![property.name.clone(), entity],
                },
                line: property.line,
            });
        }
        facts
    }

    fn entity_ref(&self, simple_name: &str) -> CodeRef {
        let full_name = self
            .index
            .resolve_full_name(simple_name)
            .unwrap_or_else(|| simple_name.to_string());
        CodeRef::new(full_name, NodeKind::Entity)
    }
}

/// `[Table("Product", Schema = "sales")]`
fn table_attribute<'t>(resolver: &mut ConstantResolver<'t>, attribute: &AttributeUse<'t>) -> Option<QualifiedName> {
    let name = attribute
        .arguments
        .iter()
        .find(|a| a.name.is_none() || a.name.is_some_and(|n| n.eq_ignore_ascii_case("name")))
        .and_then(|a| resolver.resolve(a.value))?;
    let schema = attribute
        .arguments
        .iter()
        .find(|a| a.name.is_some_and(|n| n.eq_ignore_ascii_case("schema")))
        .and_then(|a| resolver.resolve(a.value));

    let mut object = QualifiedName::parse(&name)?;
    if let Some(schema) = schema.filter(|s| !s.trim().is_empty()) {
        object.schema = Some(schema);
    }
    Some(object)
}
