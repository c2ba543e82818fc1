// Cross-file type index
//
// Built from every model-root file in a first pass, then shared read-only by
// the mapping extractor to follow base-type chains and navigation property
// types across files.

use crate::extractors::csharp::CSharpSource;
use crate::workspace::simple_type_name;
use std::collections::{BTreeMap, BTreeSet};

/// Generic collections whose element type is the navigation target
const COLLECTION_TYPES: &[&str] = &[
    "ICollection",
    "IList",
    "List",
    "IEnumerable",
    "ISet",
    "HashSet",
    "Collection",
    "IReadOnlyCollection",
    "IReadOnlyList",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedType {
    pub full_name: String,
    /// Simple names of the declared base types
    pub base_types: Vec<String>,
    /// Property name to declared type text
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    types: BTreeMap<String, Vec<IndexedType>>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(source: &CSharpSource) -> Self {
        let mut index = Self::new();
        index.add_source(source);
        index
    }

    pub fn add_source(&mut self, source: &CSharpSource) {
        for decl in source.types() {
            let indexed = IndexedType {
                full_name: decl.full_name.clone(),
                base_types: decl.base_types.iter().map(|b| simple_type_name(b)).collect(),
                properties: decl
                    .properties
                    .iter()
                    .map(|p| (p.name.clone(), p.type_text.clone()))
                    .collect(),
            };
            self.types.entry(decl.name.clone()).or_default().push(indexed);
        }
    }

    /// Fold another index in; used to combine per-file indexes
    pub fn merge(&mut self, other: TypeIndex) {
        for (name, mut entries) in other.types {
            self.types.entry(name).or_default().append(&mut entries);
        }
    }

    pub fn len(&self) -> usize {
        self.types.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// True when any of `base_types` is, or transitively derives from, one of `targets`.
    ///
    /// Names compare as simple names, generic arity ignored. Cycles terminate.
    pub fn derives_from(&self, base_types: &[String], targets: &[String]) -> bool {
        if targets.is_empty() {
            return false;
        }
        let mut visited = BTreeSet::new();
        let mut pending: Vec<String> = base_types.iter().map(|b| simple_type_name(b)).collect();

        while let Some(current) = pending.pop() {
            if targets.iter().any(|t| *t == current) {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            for entry in self.types.get(&current).into_iter().flatten() {
                pending.extend(entry.base_types.iter().cloned());
            }
        }
        false
    }

    /// True when the type named `simple_name` derives from one of `targets`
    pub fn is_entity(&self, simple_name: &str, targets: &[String]) -> bool {
        self.types
            .get(simple_name)
            .into_iter()
            .flatten()
            .any(|entry| self.derives_from(&entry.base_types, targets))
    }

    /// Declared type of `property` on `type_name` or one of its bases
    pub fn property_type(&self, type_name: &str, property: &str) -> Option<String> {
        let mut visited = BTreeSet::new();
        let mut pending = vec![simple_type_name(type_name)];

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for entry in self.types.get(&current).into_iter().flatten() {
                if let Some(found) = entry.properties.get(property) {
                    return Some(found.clone());
                }
                pending.extend(entry.base_types.iter().cloned());
            }
        }
        None
    }

    /// Full name of the first indexed type with this simple name
    pub fn resolve_full_name(&self, simple_name: &str) -> Option<String> {
        self.types
            .get(&simple_type_name(simple_name))
            .and_then(|entries| entries.first())
            .map(|entry| entry.full_name.clone())
    }
}

/// `ICollection<Order>` -> `Order`, `Order[]` -> `Order`, `Customer?` -> `Customer`
pub fn element_type(type_text: &str) -> String {
    let text = type_text.trim().trim_end_matches("[]");
    if let Some((outer, rest)) = text.split_once('<') {
        if COLLECTION_TYPES.contains(&simple_type_name(outer).as_str()) {
            let inner = rest.rsplit_once('>').map(|(inner, _)| inner).unwrap_or(rest);
            return simple_type_name(inner);
        }
    }
    simple_type_name(text)
}

/// First generic argument of `Outer<Arg, ...>`, as a simple name
pub fn generic_argument(type_text: &str) -> Option<String> {
    let (_, rest) = type_text.split_once('<')?;
    let inner = rest.rsplit_once('>').map(|(inner, _)| inner).unwrap_or(rest);
    let first = inner.split(',').next()?.trim();
    (!first.is_empty()).then(|| simple_type_name(first))
}
