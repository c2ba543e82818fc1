// Identity resolver and graph merger
//
// Single writer for the dependency graph. Node creation is idempotent per
// case-folded key, edges are deduplicated on (from, to, relation) and carry the
// set of extractors that confirmed them. Facts whose target can only be settled
// once every file is in (usage-only kinds, name-equality mappings, entity
// relationships) are queued and resolved by `resolve_deferred`.

use super::facts::{CodeRef, DbObjectRef, Fact, FileFacts, MappingTarget};
use super::keys::{QualifiedName, db_key, lookup_key};
use super::{Edge, FactSource, GraphStats, Node, NodeKind, Relation};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Kinds a usage-only reference (`FROM x`) may resolve to, in preference order
const TABLE_LIKE_KINDS: [NodeKind; 4] = [
    NodeKind::Table,
    NodeKind::View,
    NodeKind::Synonym,
    NodeKind::Func,
];

/// Statement text that was accepted but referenced no database object
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRecord {
    pub source_file: String,
    pub line: u32,
    pub method_key: String,
    pub text: String,
}

#[derive(Debug, Clone)]
struct PendingLink {
    from_key: String,
    to: DbObjectRef,
    relation: Relation,
    file: String,
    source: FactSource,
}

#[derive(Debug, Clone)]
struct PendingMapping {
    from_key: String,
    target: MappingTarget,
    file: String,
    source: FactSource,
}

#[derive(Debug, Clone)]
struct PendingEntityForeignKey {
    child_key: String,
    parent_key: String,
    file: String,
    source: FactSource,
}

/// The merged node/edge graph of one run
#[derive(Debug, Default)]
pub struct DependencyGraph {
    default_schema: String,
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<(String, String, Relation), Edge>,
    bodies: BTreeMap<String, String>,
    statements: Vec<StatementRecord>,
    pending_links: Vec<PendingLink>,
    pending_mappings: Vec<PendingMapping>,
    pending_entity_fks: Vec<PendingEntityForeignKey>,
    /// Case-folded keys whose mapping came from an attribute or fluent call
    explicitly_mapped: BTreeSet<String>,
}

impl DependencyGraph {
    pub fn new(default_schema: impl Into<String>) -> Self {
        let default_schema = default_schema.into();
        Self {
            default_schema: if default_schema.trim().is_empty() {
                "dbo".to_string()
            } else {
                default_schema
            },
            ..Default::default()
        }
    }

    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    /// Create the node for `key`, or return the existing one.
    ///
    /// A definition fills fields that are still empty and clears the stub flag;
    /// fields that already hold a value are never overwritten.
    pub fn get_or_create_node(
        &mut self,
        key: &str,
        kind: NodeKind,
        name: &str,
        schema: Option<&str>,
        file: Option<&str>,
        domain: Option<&str>,
    ) -> &Node {
        match self.nodes.entry(lookup_key(key)) {
            Entry::Occupied(entry) => {
                let node = entry.into_mut();
                node.is_stub = false;
                if node.schema.is_none() {
                    node.schema = schema.map(str::to_string);
                }
                if node.source_file.is_none() {
                    node.source_file = file.map(str::to_string);
                }
                if node.domain.is_none() {
                    node.domain = domain.map(str::to_string);
                }
                node
            }
            Entry::Vacant(entry) => entry.insert(Node {
                key: key.to_string(),
                kind,
                name: name.to_string(),
                schema: schema.map(str::to_string),
                source_file: file.map(str::to_string),
                domain: domain.map(str::to_string),
                is_stub: false,
                attributes: BTreeMap::new(),
            }),
        }
    }

    /// Return the display key of an existing node, creating a stub when absent
    pub fn ensure_stub(
        &mut self,
        key: &str,
        kind: NodeKind,
        name: &str,
        schema: Option<&str>,
    ) -> String {
        self.nodes
            .entry(lookup_key(key))
            .or_insert_with(|| Node {
                key: key.to_string(),
                kind,
                name: name.to_string(),
                schema: schema.map(str::to_string),
                source_file: None,
                domain: None,
                is_stub: true,
                attributes: BTreeMap::new(),
            })
            .key
            .clone()
    }

    fn reference_object(&mut self, object: &DbObjectRef) -> String {
        let schema = object.name.schema_or(&self.default_schema).to_string();
        let key = db_key(&schema, &object.name.name, object.kind);
        self.ensure_stub(&key, object.kind, &object.name.name, Some(&schema))
    }

    fn reference_code(&mut self, code: &CodeRef) -> String {
        self.ensure_stub(&code.key(), code.kind, code.name(), code.container())
    }

    /// Add an edge; a repeated (from, to, relation) only accumulates provenance.
    ///
    /// Returns true when the edge is new.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        relation: Relation,
        to_kind: NodeKind,
        file: Option<&str>,
        source: FactSource,
    ) -> bool {
        let from_display = self.display_key(from);
        let to_display = self.display_key(to);
        let id = (lookup_key(from), lookup_key(to), relation);

        match self.edges.entry(id) {
            Entry::Occupied(mut entry) => {
                let edge = entry.get_mut();
                edge.provenance.insert(source);
                if edge.source_file.is_none() {
                    edge.source_file = file.map(str::to_string);
                }
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Edge {
                    from: from_display,
                    to: to_display,
                    relation,
                    to_kind,
                    source_file: file.map(str::to_string),
                    provenance: BTreeSet::from([source]),
                });
                true
            }
        }
    }

    fn display_key(&self, key: &str) -> String {
        self.nodes
            .get(&lookup_key(key))
            .map(|n| n.key.clone())
            .unwrap_or_else(|| key.to_string())
    }

    /// Attach definition text to a node key; the first non-empty body wins
    pub fn set_body(&mut self, key: &str, body: &str) {
        if body.trim().is_empty() {
            return;
        }
        self.bodies
            .entry(lookup_key(key))
            .or_insert_with(|| body.to_string());
    }

    fn set_attributes(&mut self, key: &str, attributes: &BTreeMap<String, String>) {
        if let Some(node) = self.nodes.get_mut(&lookup_key(key)) {
            for (name, value) in attributes {
                node.attributes
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }

    /// Fold one extractor's facts for one file into the graph
    pub fn merge(&mut self, file_facts: &FileFacts, domain: Option<&str>) {
        let file = file_facts.file.as_str();
        let source = file_facts.source;

        for fact in &file_facts.facts {
            match fact {
                Fact::DefineObject { object, body, .. } => {
                    let schema = object.name.schema_or(&self.default_schema).to_string();
                    let key = object.key(&self.default_schema);
                    self.get_or_create_node(
                        &key,
                        object.kind,
                        &object.name.name,
                        Some(&schema),
                        Some(file),
                        domain,
                    );
                    if let Some(body) = body {
                        self.set_body(&key, body);
                    }
                }
                Fact::DefineCode {
                    code,
                    body,
                    attributes,
                    ..
                } => {
                    let key = code.key();
                    self.get_or_create_node(
                        &key,
                        code.kind,
                        code.name(),
                        code.container(),
                        Some(file),
                        domain,
                    );
                    if let Some(body) = body {
                        self.set_body(&key, body);
                    }
                    self.set_attributes(&key, attributes);
                }
                Fact::ObjectLink {
                    from, to, relation, ..
                } => {
                    let from_key = self.reference_object(from);
                    self.link_to_object(from_key, to, *relation, file, source);
                }
                Fact::CodeLink {
                    from, to, relation, ..
                } => {
                    let from_key = self.reference_code(from);
                    self.link_to_object(from_key, to, *relation, file, source);
                }
                Fact::MapsTo { from, target, .. } => {
                    self.pending_mappings.push(PendingMapping {
                        from_key: from.key(),
                        target: target.clone(),
                        file: file.to_string(),
                        source,
                    });
                }
                Fact::EntityForeignKey { child, parent, .. } => {
                    self.pending_entity_fks.push(PendingEntityForeignKey {
                        child_key: child.key(),
                        parent_key: parent.key(),
                        file: file.to_string(),
                        source,
                    });
                }
                Fact::Statement { method, line, text } => {
                    let method_key = self.reference_code(method);
                    self.statements.push(StatementRecord {
                        source_file: file.to_string(),
                        line: *line,
                        method_key,
                        text: text.clone(),
                    });
                }
            }
        }
    }

    fn link_to_object(
        &mut self,
        from_key: String,
        to: &DbObjectRef,
        relation: Relation,
        file: &str,
        source: FactSource,
    ) {
        if to.kind_is_guess {
            self.pending_links.push(PendingLink {
                from_key,
                to: to.clone(),
                relation,
                file: file.to_string(),
                source,
            });
        } else {
            let to_key = self.reference_object(to);
            self.add_edge(&from_key, &to_key, relation, to.kind, Some(file), source);
        }
    }

    /// Settle every queued fact. Call once, after the last `merge`.
    pub fn resolve_deferred(&mut self) {
        let links = std::mem::take(&mut self.pending_links);
        for link in &links {
            let (to_key, to_kind) = self.resolve_table_like(&link.to);
            self.add_edge(
                &link.from_key,
                &to_key,
                link.relation,
                to_kind,
                Some(&link.file),
                link.source,
            );
        }

        self.resolve_mappings();

        let foreign_keys = std::mem::take(&mut self.pending_entity_fks);
        for fk in &foreign_keys {
            let child_table = self.mapped_object(&fk.child_key);
            let parent_table = self.mapped_object(&fk.parent_key);
            match (child_table, parent_table) {
                (Some((child, _)), Some((parent, parent_kind))) => {
                    self.add_edge(
                        &child,
                        &parent,
                        Relation::ForeignKey,
                        parent_kind,
                        Some(&fk.file),
                        fk.source,
                    );
                }
                _ if self.contains(&fk.child_key) && self.contains(&fk.parent_key) => {
                    self.add_edge(
                        &fk.child_key,
                        &fk.parent_key,
                        Relation::ForeignKey,
                        NodeKind::Entity,
                        Some(&fk.file),
                        fk.source,
                    );
                }
                _ => debug!(
                    "Dropping relationship {} -> {}: entity not in graph",
                    fk.child_key, fk.parent_key
                ),
            }
        }
    }

    /// Existing TABLE/VIEW/SYNONYM/FUNC with this name, else a TABLE stub
    fn resolve_table_like(&mut self, object: &DbObjectRef) -> (String, NodeKind) {
        for kind in TABLE_LIKE_KINDS {
            let key = object.key_as(&self.default_schema, kind);
            if let Some(node) = self.nodes.get(&lookup_key(&key)) {
                return (node.key.clone(), kind);
            }
        }
        let table = DbObjectRef::new(object.name.clone(), NodeKind::Table);
        (self.reference_object(&table), NodeKind::Table)
    }

    fn resolve_mappings(&mut self) {
        let pending = std::mem::take(&mut self.pending_mappings);

        // Group per source node, keeping first-seen order
        let mut order: Vec<String> = Vec::new();
        let mut grouped: BTreeMap<String, Vec<PendingMapping>> = BTreeMap::new();
        for mapping in pending {
            let id = lookup_key(&mapping.from_key);
            if !grouped.contains_key(&id) {
                order.push(id.clone());
            }
            grouped.entry(id).or_default().push(mapping);
        }

        // Entities before sets: a set may follow its entity's mapping
        let (entities, others): (Vec<String>, Vec<String>) = order
            .into_iter()
            .partition(|id| self.nodes.get(id).map(|n| n.kind) == Some(NodeKind::Entity));

        for id in entities.iter().chain(others.iter()) {
            let Some(mappings) = grouped.get(id) else { continue };
            if !self.nodes.contains_key(id) {
                debug!("Skipping table mapping for unknown node {}", id);
                continue;
            }
            self.resolve_mapping_group(mappings);
        }
    }

    fn resolve_mapping_group(&mut self, mappings: &[PendingMapping]) {
        let Some(first) = mappings.first() else { return };

        let explicit = mappings
            .iter()
            .filter_map(|m| match &m.target {
                MappingTarget::Explicit { object, via } => Some((*via, object, m)),
                _ => None,
            })
            .min_by_key(|(via, _, _)| *via);
        if let Some((_, object, mapping)) = explicit {
            self.explicitly_mapped.insert(lookup_key(&mapping.from_key));
            let to_key = self.reference_object(object);
            self.add_edge(
                &mapping.from_key,
                &to_key,
                Relation::MapsTo,
                object.kind,
                Some(&mapping.file),
                mapping.source,
            );
            return;
        }

        for mapping in mappings {
            if let MappingTarget::SameAsEntity { entity } = &mapping.target {
                if !self.explicitly_mapped.contains(&lookup_key(&entity.key())) {
                    continue;
                }
                if let Some((to_key, to_kind)) = self.mapped_object(&entity.key()) {
                    self.add_edge(
                        &mapping.from_key,
                        &to_key,
                        Relation::MapsTo,
                        to_kind,
                        Some(&mapping.file),
                        mapping.source,
                    );
                    return;
                }
            }
        }

        for mapping in mappings {
            if let MappingTarget::ByName { candidates } = &mapping.target {
                if let Some(to_key) = candidates.iter().find_map(|c| self.find_table_by_name(c)) {
                    self.add_edge(
                        &mapping.from_key,
                        &to_key,
                        Relation::MapsTo,
                        NodeKind::Table,
                        Some(&mapping.file),
                        mapping.source,
                    );
                    return;
                }
            }
        }

        debug!("No table resolved for {}", first.from_key);
    }

    /// TABLE node whose name equals `candidate`, preferring the default schema
    pub fn find_table_by_name(&self, candidate: &str) -> Option<String> {
        let wanted = QualifiedName::parse(candidate)?;
        let mut matches = self.nodes.values().filter(|n| {
            n.kind == NodeKind::Table
                && n.name.eq_ignore_ascii_case(&wanted.name)
                && match &wanted.schema {
                    Some(schema) => n
                        .schema
                        .as_deref()
                        .is_some_and(|s| s.eq_ignore_ascii_case(schema)),
                    None => true,
                }
        });

        let first = matches.next()?;
        if first
            .schema
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(&self.default_schema))
        {
            return Some(first.key.clone());
        }
        let preferred = matches.find(|n| {
            n.schema
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(&self.default_schema))
        });
        Some(preferred.unwrap_or(first).key.clone())
    }

    /// Target of the first MapsTo edge leaving `key`
    fn mapped_object(&self, key: &str) -> Option<(String, NodeKind)> {
        let from = lookup_key(key);
        self.edges
            .iter()
            .find(|((f, _, relation), _)| *f == from && *relation == Relation::MapsTo)
            .map(|(_, edge)| (edge.to.clone(), edge.to_kind))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(&lookup_key(key))
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.get(&lookup_key(key))
    }

    /// Nodes in case-folded key order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in (from, to, relation) order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge(&self, from: &str, to: &str, relation: Relation) -> Option<&Edge> {
        self.edges
            .get(&(lookup_key(from), lookup_key(to), relation))
    }

    pub fn edges_from(&self, key: &str) -> Vec<&Edge> {
        let from = lookup_key(key);
        self.edges
            .iter()
            .filter(|((f, _, _), _)| *f == from)
            .map(|(_, edge)| edge)
            .collect()
    }

    pub fn body(&self, key: &str) -> Option<&str> {
        self.bodies.get(&lookup_key(key)).map(String::as_str)
    }

    pub fn statements(&self) -> &[StatementRecord] {
        &self.statements
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for node in self.nodes.values() {
            *stats
                .nodes_by_kind
                .entry(node.kind.as_str().to_string())
                .or_default() += 1;
            if node.is_stub {
                stats.stub_nodes += 1;
            }
        }
        for edge in self.edges.values() {
            *stats
                .edges_by_relation
                .entry(edge.relation.as_str().to_string())
                .or_default() += 1;
        }
        stats.statements = self.statements.len();
        stats
    }
}
