// Constant string resolution
//
// Reduces an expression to a compile-time string where the source allows it:
// literals, `+` concatenation, parentheses, `nameof(...)`, and identifiers
// traced to a local, field, const or property initializer. Anything else
// (method calls, runtime values) is not resolvable.

use super::{CSharpSource, STRING_LITERAL_KINDS, TYPE_DECLARATION_KINDS, decode_string_literal};
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

const MAX_DEPTH: u32 = 8;

pub struct ConstantResolver<'s> {
    source: &'s CSharpSource,
    symbols: BTreeMap<String, String>,
    claimed: BTreeSet<usize>,
}

impl<'s> ConstantResolver<'s> {
    pub fn new(source: &'s CSharpSource) -> Self {
        Self {
            source,
            symbols: BTreeMap::new(),
            claimed: BTreeSet::new(),
        }
    }

    /// Bind an identifier to a known value; consulted before any declaration lookup
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.symbols.insert(name.into(), value.into());
    }

    pub fn symbols(&self) -> &BTreeMap<String, String> {
        &self.symbols
    }

    /// Start bytes of every literal that fed a successful resolution
    pub fn claimed(&self) -> &BTreeSet<usize> {
        &self.claimed
    }

    pub fn resolve(&mut self, expr: Node<'s>) -> Option<String> {
        let mut used = BTreeSet::new();
        let value = self.resolve_at(expr, 0, &mut used)?;
        self.claimed.extend(used);
        Some(value)
    }

    fn resolve_at(&self, expr: Node<'s>, depth: u32, used: &mut BTreeSet<usize>) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        let source = self.source;

        match expr.kind() {
            kind if STRING_LITERAL_KINDS.contains(&kind) => {
                let value = decode_string_literal(source.text_ref(&expr))?;
                used.insert(expr.start_byte());
                Some(value)
            }
            "binary_expression" => {
                if binary_operator(source, &expr)? != "+" {
                    return None;
                }
                let left = self.resolve_at(expr.child_by_field_name("left")?, depth + 1, used)?;
                let right = self.resolve_at(expr.child_by_field_name("right")?, depth + 1, used)?;
                Some(left + &right)
            }
            "parenthesized_expression" => {
                self.resolve_at(expr.named_child(0)?, depth + 1, used)
            }
            "identifier" => self.resolve_identifier(expr, depth, used),
            "member_access_expression" => self.resolve_member(expr, depth, used),
            "invocation_expression" => nameof_value(source, &expr),
            _ => None,
        }
    }

    fn resolve_identifier(&self, node: Node<'s>, depth: u32, used: &mut BTreeSet<usize>) -> Option<String> {
        let source = self.source;
        let name = source.text_ref(&node);
        if let Some(value) = self.symbols.get(name) {
            return Some(value.clone());
        }

        if let Some(value) = self.find_local(node, name) {
            return self.resolve_at(value, depth + 1, used);
        }

        let owner = source.enclosing_type(&node)?;
        let value = self.find_member(owner, name)?;
        self.resolve_at(value, depth + 1, used)
    }

    /// `this.Sql`, `Queries.Customers`
    fn resolve_member(&self, node: Node<'s>, depth: u32, used: &mut BTreeSet<usize>) -> Option<String> {
        let source = self.source;
        let receiver = source.text_ref(&node.child_by_field_name("expression")?);
        let name = source.text_ref(&node.child_by_field_name("name")?);

        let owner = if receiver == "this" {
            source.enclosing_type(&node)?
        } else {
            let receiver = receiver.rsplit('.').next().unwrap_or(receiver);
            source
                .base()
                .find_nodes_by_types(&source.root(), TYPE_DECLARATION_KINDS)
                .into_iter()
                .find(|t| source.declared_name(t).as_deref() == Some(receiver))?
        };
        let value = self.find_member(owner, name)?;
        self.resolve_at(value, depth + 1, used)
    }

    /// Closest preceding local declarator named `name` in an enclosing block
    fn find_local(&self, usage: Node<'s>, name: &str) -> Option<Node<'s>> {
        let source = self.source;
        let base = source.base();
        let mut current = usage.parent();

        while let Some(scope) = current {
            if TYPE_DECLARATION_KINDS.contains(&scope.kind()) {
                break;
            }
            let mut found = None;
            for stmt in base.find_children_by_type(&scope, "local_declaration_statement") {
                if stmt.end_byte() > usage.start_byte() {
                    continue;
                }
                for declarator in base.find_nodes_by_type(&stmt, "variable_declarator") {
                    if source.declarator_name(&declarator).as_deref() == Some(name) {
                        found = source.declarator_value(&declarator).or(found);
                    }
                }
            }
            if found.is_some() {
                return found;
            }
            current = scope.parent();
        }
        None
    }

    /// Initializer of a field, const or property declared in `owner`
    fn find_member(&self, owner: Node<'s>, name: &str) -> Option<Node<'s>> {
        let source = self.source;
        let base = source.base();
        let body = source.type_body(&owner)?;

        for field in base.find_children_by_type(&body, "field_declaration") {
            for declarator in base.find_nodes_by_type(&field, "variable_declarator") {
                if source.declarator_name(&declarator).as_deref() == Some(name) {
                    return source.declarator_value(&declarator);
                }
            }
        }

        for property in base.find_children_by_type(&body, "property_declaration") {
            if source.declared_name(&property).as_deref() != Some(name) {
                continue;
            }
            if let Some(value) = property.child_by_field_name("value") {
                return Some(value);
            }
            return base
                .find_child_by_type(&property, "arrow_expression_clause")
                .and_then(|arrow| arrow.named_child(0));
        }
        None
    }
}

/// Operator token of a binary expression
pub(crate) fn binary_operator<'t>(source: &'t CSharpSource, expr: &Node<'t>) -> Option<&'t str> {
    if let Some(op) = expr.child_by_field_name("operator") {
        return Some(source.text_ref(&op));
    }
    let mut cursor = expr.walk();
    let op = expr.children(&mut cursor).find(|c| !c.is_named());
    op.map(|op| source.text_ref(&op))
}

/// `nameof(Models.Product)` -> `Product`
fn nameof_value(source: &CSharpSource, call: &Node) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    if source.text_ref(&function) != "nameof" {
        return None;
    }
    let argument = source.arguments(call).into_iter().next()?;
    rightmost_identifier(source.text_ref(&argument.value))
}

/// Last dotted identifier of an expression, generic arguments dropped
pub(crate) fn rightmost_identifier(text: &str) -> Option<String> {
    let without_generics = text.split('<').next().unwrap_or(text);
    let last = without_generics.rsplit('.').next()?.trim();
    (!last.is_empty()).then(|| last.to_string())
}
