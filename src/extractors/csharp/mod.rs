// C# syntax provider
//
// Parses one source file with tree-sitter-c-sharp and answers the structural
// questions the inline, ORM and migration extractors ask: namespace/type
// nesting, base-type lists, attributes with their arguments, method spans and
// bodies, call sites with ordered arguments, and string literal values.

mod chain;
mod constants;
mod literals;

pub use chain::{ChainSegment, callee_name, flatten_member_chain, is_chain_root};
pub use constants::ConstantResolver;
pub(crate) use constants::{binary_operator, rightmost_identifier};
pub use literals::decode_string_literal;

use crate::extractors::base::BaseExtractor;
use tree_sitter::{Node, Parser, Tree};
use tracing::warn;

pub const TYPE_DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "record_declaration",
    "record_struct_declaration",
    "interface_declaration",
];

pub const METHOD_DECLARATION_KINDS: &[&str] = &["method_declaration", "constructor_declaration"];

pub const STRING_LITERAL_KINDS: &[&str] = &[
    "string_literal",
    "verbatim_string_literal",
    "raw_string_literal",
    "interpolated_string_expression",
];

const NAMESPACE_KINDS: &[&str] = &["namespace_declaration", "file_scoped_namespace_declaration"];

const CALL_KINDS: &[&str] = &["invocation_expression", "object_creation_expression"];

/// An argument at a call or attribute site: `name: value`, `Name = value` or positional
#[derive(Debug, Clone, Copy)]
pub struct CallArgument<'t> {
    pub name: Option<&'t str>,
    pub value: Node<'t>,
}

/// `[Table("Product", Schema = "dbo")]`
#[derive(Debug, Clone)]
pub struct AttributeUse<'t> {
    /// As written, possibly namespace-qualified
    pub name: String,
    pub arguments: Vec<CallArgument<'t>>,
    pub line: u32,
}

impl AttributeUse<'_> {
    /// `System.ComponentModel.DataAnnotations.Schema.TableAttribute` -> `Table`
    pub fn simple_name(&self) -> &str {
        let last = self.name.rsplit('.').next().unwrap_or(&self.name);
        last.strip_suffix("Attribute")
            .filter(|s| !s.is_empty())
            .unwrap_or(last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub type_text: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct TypeDecl<'t> {
    pub node: Node<'t>,
    pub name: String,
    pub full_name: String,
    pub namespace: Option<String>,
    /// Base-list entries as written (`BaseEntity<int>`, `IEntityTypeConfiguration<Order>`)
    pub base_types: Vec<String>,
    pub attributes: Vec<AttributeUse<'t>>,
    pub properties: Vec<PropertyDecl>,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone)]
pub struct MethodDecl<'t> {
    pub node: Node<'t>,
    pub name: String,
    /// `Namespace.Type.Method`
    pub full_name: String,
    pub type_full_name: Option<String>,
    /// Block or expression body
    pub body: Option<Node<'t>>,
    pub start_line: u32,
    pub end_line: u32,
}

/// A parsed C# file
pub struct CSharpSource {
    base: BaseExtractor,
    tree: Tree,
}

impl CSharpSource {
    /// Parse `content`; `None` only when tree-sitter itself gives up
    pub fn parse(file_path: &str, content: &str) -> Option<Self> {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&tree_sitter_c_sharp::LANGUAGE.into()) {
            warn!("Error loading C# grammar: {}", e);
            return None;
        }
        let tree = parser.parse(content, None)?;

        Some(Self {
            base: BaseExtractor::new(file_path.to_string(), content.to_string()),
            tree,
        })
    }

    pub fn file_path(&self) -> &str {
        &self.base.file_path
    }

    pub fn content(&self) -> &str {
        &self.base.content
    }

    pub fn base(&self) -> &BaseExtractor {
        &self.base
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: &Node) -> String {
        self.base.get_node_text(node)
    }

    /// Borrowed text of a node, for short-lived names
    pub fn text_ref<'t>(&'t self, node: &Node<'t>) -> &'t str {
        self.content()
            .get(node.start_byte()..node.end_byte())
            .unwrap_or("")
    }

    pub fn line(&self, node: &Node) -> u32 {
        self.base.start_line(node)
    }

    /// Every class/struct/record/interface, outer types first
    pub fn types(&self) -> Vec<TypeDecl<'_>> {
        self.base
            .find_nodes_by_types(&self.root(), TYPE_DECLARATION_KINDS)
            .into_iter()
            .filter_map(|node| self.type_decl(node))
            .collect()
    }

    fn type_decl<'t>(&'t self, node: Node<'t>) -> Option<TypeDecl<'t>> {
        let name = self.declared_name(&node)?;
        let namespace = self.namespace_of(&node);
        Some(TypeDecl {
            full_name: self.type_full_name(&node)?,
            name,
            namespace,
            base_types: self.base_types(&node),
            attributes: self.attributes(&node),
            properties: self.properties(&node),
            start_line: self.base.start_line(&node),
            end_line: self.base.end_line(&node),
            node,
        })
    }

    /// Every method and constructor, in source order
    pub fn methods(&self) -> Vec<MethodDecl<'_>> {
        self.base
            .find_nodes_by_types(&self.root(), METHOD_DECLARATION_KINDS)
            .into_iter()
            .filter_map(|node| self.method_decl(node))
            .collect()
    }

    fn method_decl<'t>(&'t self, node: Node<'t>) -> Option<MethodDecl<'t>> {
        let name = self.method_name(&node)?;
        let type_full_name = self
            .enclosing_type(&node)
            .and_then(|t| self.type_full_name(&t));
        let full_name = match &type_full_name {
            Some(owner) => format!("{}.{}", owner, name),
            None => match self.namespace_of(&node) {
                Some(ns) => format!("{}.{}", ns, name),
                None => name.clone(),
            },
        };
        let body = node
            .child_by_field_name("body")
            .or_else(|| self.base.find_child_by_types(&node, &["block", "arrow_expression_clause"]));

        Some(MethodDecl {
            name,
            full_name,
            type_full_name,
            body,
            start_line: self.base.start_line(&node),
            end_line: self.base.end_line(&node),
            node,
        })
    }

    fn method_name(&self, node: &Node) -> Option<String> {
        if let Some(name) = self.base.get_field_text(node, "name") {
            return Some(name);
        }
        // Name is the last identifier before the parameter list
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        let param_list_index = children.iter().position(|c| c.kind() == "parameter_list")?;
        children[..param_list_index]
            .iter()
            .rev()
            .find(|c| c.kind() == "identifier")
            .map(|n| self.text(n))
    }

    /// Innermost method whose line span contains `line`
    pub fn enclosing_method<'m, 't>(methods: &'m [MethodDecl<'t>], line: u32) -> Option<&'m MethodDecl<'t>> {
        methods
            .iter()
            .filter(|m| m.start_line <= line && line <= m.end_line)
            .min_by_key(|m| m.end_line - m.start_line)
    }

    pub fn enclosing_type<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        self.base.find_parent_of_types(node, TYPE_DECLARATION_KINDS)
    }

    /// Name of a type, method or namespace declaration
    pub fn declared_name(&self, node: &Node) -> Option<String> {
        self.base
            .get_field_text(node, "name")
            .or_else(|| {
                self.base
                    .find_child_by_types(node, &["identifier", "qualified_name"])
                    .map(|n| self.text(&n))
            })
            .filter(|n| !n.is_empty())
    }

    /// `Namespace.Outer.Inner` for a type declaration node
    pub fn type_full_name(&self, type_node: &Node) -> Option<String> {
        let mut parts = vec![self.declared_name(type_node)?];
        let mut current = type_node.parent();
        while let Some(parent) = current {
            if TYPE_DECLARATION_KINDS.contains(&parent.kind()) {
                if let Some(name) = self.declared_name(&parent) {
                    parts.push(name);
                }
            }
            current = parent.parent();
        }
        if let Some(ns) = self.namespace_of(type_node) {
            parts.push(ns);
        }
        parts.reverse();
        Some(parts.join("."))
    }

    /// Dotted namespace enclosing `node`, including a file-scoped namespace
    pub fn namespace_of(&self, node: &Node) -> Option<String> {
        let mut parts = Vec::new();
        let mut inside_file_scoped = false;
        let mut current = node.parent();
        while let Some(parent) = current {
            if NAMESPACE_KINDS.contains(&parent.kind()) {
                if parent.kind() == "file_scoped_namespace_declaration" {
                    inside_file_scoped = true;
                }
                if let Some(name) = self.declared_name(&parent) {
                    parts.push(name);
                }
            }
            current = parent.parent();
        }

        // Grammar versions that keep file-scoped members as siblings
        if !inside_file_scoped {
            let root = self.root();
            let file_scoped = self
                .base
                .find_children_by_type(&root, "file_scoped_namespace_declaration")
                .into_iter()
                .filter(|ns| ns.start_byte() < node.start_byte())
                .last();
            if let Some(name) = file_scoped.and_then(|ns| self.declared_name(&ns)) {
                parts.push(name);
            }
        }

        if parts.is_empty() {
            return None;
        }
        parts.reverse();
        Some(parts.join("."))
    }

    /// Base-list entries with primary-constructor arguments dropped
    pub fn base_types(&self, type_node: &Node) -> Vec<String> {
        let Some(base_list) = self.base.find_child_by_type(type_node, "base_list") else {
            return Vec::new();
        };
        let mut cursor = base_list.walk();
        base_list
            .children(&mut cursor)
            .filter(|c| c.is_named() && c.kind() != "comment")
            .map(|c| {
                let text = self.text(&c);
                match text.find('(') {
                    Some(idx) => text[..idx].trim().to_string(),
                    None => text.trim().to_string(),
                }
            })
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Attributes applied directly to a declaration
    pub fn attributes<'t>(&'t self, decl: &Node<'t>) -> Vec<AttributeUse<'t>> {
        let mut result = Vec::new();
        for list in self.base.find_children_by_type(decl, "attribute_list") {
            for attribute in self.base.find_children_by_type(&list, "attribute") {
                let name = attribute
                    .child_by_field_name("name")
                    .or_else(|| attribute.named_child(0))
                    .map(|n| self.text(&n))
                    .unwrap_or_default();
                let arguments = self
                    .base
                    .find_child_by_type(&attribute, "attribute_argument_list")
                    .map(|args| {
                        self.base
                            .find_children_by_type(&args, "attribute_argument")
                            .into_iter()
                            .filter_map(|arg| self.split_argument(arg))
                            .collect()
                    })
                    .unwrap_or_default();
                result.push(AttributeUse {
                    name,
                    arguments,
                    line: self.base.start_line(&attribute),
                });
            }
        }
        result
    }

    /// Properties declared directly in a type body
    pub fn properties(&self, type_node: &Node) -> Vec<PropertyDecl> {
        let Some(body) = self.type_body(type_node) else {
            return Vec::new();
        };
        self.base
            .find_children_by_type(&body, "property_declaration")
            .into_iter()
            .filter_map(|prop| {
                let name = self.declared_name(&prop)?;
                let type_text = prop
                    .child_by_field_name("type")
                    .map(|t| self.text(&t))
                    .or_else(|| self.first_type_child(&prop))?;
                Some(PropertyDecl {
                    name,
                    type_text,
                    line: self.base.start_line(&prop),
                })
            })
            .collect()
    }

    fn first_type_child(&self, node: &Node) -> Option<String> {
        self.base
            .find_child_by_types(
                node,
                &[
                    "predefined_type",
                    "identifier",
                    "qualified_name",
                    "generic_name",
                    "array_type",
                    "nullable_type",
                ],
            )
            .map(|n| self.text(&n))
    }

    pub fn type_body<'t>(&self, type_node: &Node<'t>) -> Option<Node<'t>> {
        type_node
            .child_by_field_name("body")
            .or_else(|| self.base.find_child_by_type(type_node, "declaration_list"))
    }

    /// `(name, type)` pairs of a method's parameter list
    pub fn parameters(&self, method: &Node) -> Vec<(String, String)> {
        let Some(list) = method
            .child_by_field_name("parameters")
            .or_else(|| self.base.find_child_by_type(method, "parameter_list"))
        else {
            return Vec::new();
        };
        self.base
            .find_children_by_type(&list, "parameter")
            .into_iter()
            .filter_map(|param| {
                let name = self.declared_name(&param)?;
                let type_text = param
                    .child_by_field_name("type")
                    .map(|t| self.text(&t))
                    .or_else(|| {
                        let mut cursor = param.walk();
                        param
                            .named_children(&mut cursor)
                            .find(|c| c.kind() != "attribute_list" && c.kind() != "modifier" && self.text(c) != name)
                            .map(|c| self.text(&c))
                    })
                    .unwrap_or_default();
                Some((name, type_text))
            })
            .collect()
    }

    /// Invocations and object creations, in source order
    pub fn call_sites(&self) -> Vec<Node<'_>> {
        self.base.find_nodes_by_types(&self.root(), CALL_KINDS)
    }

    pub fn string_literals(&self) -> Vec<Node<'_>> {
        self.base.find_nodes_by_types(&self.root(), STRING_LITERAL_KINDS)
    }

    /// Arguments of an invocation or object creation
    pub fn arguments<'t>(&'t self, call: &Node<'t>) -> Vec<CallArgument<'t>> {
        let Some(list) = call
            .child_by_field_name("arguments")
            .or_else(|| self.base.find_child_by_type(call, "argument_list"))
        else {
            return Vec::new();
        };
        self.base
            .find_children_by_type(&list, "argument")
            .into_iter()
            .filter_map(|arg| self.split_argument(arg))
            .collect()
    }

    /// Split `name: value` / `Name = value` / `value`
    fn split_argument<'t>(&'t self, arg: Node<'t>) -> Option<CallArgument<'t>> {
        let mut cursor = arg.walk();
        let children: Vec<Node<'t>> = arg.children(&mut cursor).collect();
        let mut name = None;
        let mut value = None;

        for (i, child) in children.iter().enumerate() {
            match child.kind() {
                "name_colon" | "name_equals" => {
                    name = self
                        .base
                        .find_child_by_type(child, "identifier")
                        .map(|id| self.text_ref(&id));
                }
                "identifier"
                    if children
                        .get(i + 1)
                        .is_some_and(|next| next.kind() == ":" || next.kind() == "=") =>
                {
                    name = Some(self.text_ref(child));
                }
                "comment" => {}
                _ if child.is_named() => value = Some(*child),
                _ => {}
            }
        }

        value.map(|value| CallArgument { name, value })
    }

    /// Local variable declarators visible in `scope`, in source order
    pub fn local_declarators<'t>(&'t self, scope: &Node<'t>) -> Vec<(String, Node<'t>)> {
        self.base
            .find_nodes_by_type(scope, "local_declaration_statement")
            .into_iter()
            .flat_map(|stmt| self.base.find_nodes_by_type(&stmt, "variable_declarator"))
            .filter_map(|decl| {
                let name = self.declarator_name(&decl)?;
                let value = self.declarator_value(&decl)?;
                Some((name, value))
            })
            .collect()
    }

    pub fn declarator_name(&self, declarator: &Node) -> Option<String> {
        declarator
            .child_by_field_name("name")
            .or_else(|| self.base.find_child_by_type(declarator, "identifier"))
            .map(|n| self.text(&n))
    }

    /// Initializer expression of `x = value`
    pub fn declarator_value<'t>(&self, declarator: &Node<'t>) -> Option<Node<'t>> {
        if let Some(clause) = self.base.find_child_by_type(declarator, "equals_value_clause") {
            return clause.named_child(0);
        }
        let mut seen_equals = false;
        let mut cursor = declarator.walk();
        for child in declarator.children(&mut cursor) {
            if child.kind() == "=" {
                seen_equals = true;
            } else if seen_equals && child.is_named() {
                return Some(child);
            }
        }
        None
    }
}
