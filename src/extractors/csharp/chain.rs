// Member-access chain flattening
//
// `Create.Table("Product").InSchema("sales")` becomes
// [Create, Table("Product"), InSchema("sales")], receiver first.

use super::{CSharpSource, CallArgument};
use tree_sitter::Node;

#[derive(Debug, Clone)]
pub struct ChainSegment<'t> {
    pub name: String,
    /// Type arguments of a generic segment (`Entity<Order>` -> ["Order"])
    pub generic_args: Vec<String>,
    /// `None` when the segment is a plain member or receiver, not a call
    pub arguments: Option<Vec<CallArgument<'t>>>,
    pub node: Node<'t>,
}

impl<'t> ChainSegment<'t> {
    pub fn is_call(&self) -> bool {
        self.arguments.is_some()
    }

    pub fn args(&self) -> &[CallArgument<'t>] {
        self.arguments.as_deref().unwrap_or(&[])
    }

    /// Argument by name (case-insensitive), else the `position`-th positional one
    pub fn arg(&self, name: &str, position: usize) -> Option<Node<'t>> {
        let args = self.args();
        args.iter()
            .find(|a| a.name.is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .or_else(|| args.iter().filter(|a| a.name.is_none()).nth(position))
            .map(|a| a.value)
    }

    pub fn named_arg(&self, name: &str) -> Option<Node<'t>> {
        self.args()
            .iter()
            .find(|a| a.name.is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .map(|a| a.value)
    }

    pub fn first_arg(&self) -> Option<Node<'t>> {
        self.args().first().map(|a| a.value)
    }
}

/// Flatten the invocation/member-access chain rooted at `node`
pub fn flatten_member_chain<'t>(source: &'t CSharpSource, node: Node<'t>) -> Vec<ChainSegment<'t>> {
    let mut segments = Vec::new();
    flatten_into(source, node, &mut segments);
    segments
}

fn flatten_into<'t>(source: &'t CSharpSource, node: Node<'t>, out: &mut Vec<ChainSegment<'t>>) {
    match node.kind() {
        "invocation_expression" => {
            let Some(function) = node.child_by_field_name("function").or_else(|| node.named_child(0)) else {
                return;
            };
            flatten_into(source, function, out);
            let arguments = source.arguments(&node);
            if let Some(last) = out.last_mut() {
                last.arguments = Some(arguments);
            }
        }
        "member_access_expression" => {
            if let Some(expression) = node.child_by_field_name("expression") {
                flatten_into(source, expression, out);
            }
            if let Some(name) = node.child_by_field_name("name") {
                out.push(segment(source, name));
            }
        }
        "identifier" | "generic_name" => out.push(segment(source, node)),
        "this_expression" | "this" => out.push(opaque(node, "this")),
        "base_expression" | "base" => out.push(opaque(node, "base")),
        "object_creation_expression" => {
            let mut creation = opaque(node, "new");
            creation.arguments = Some(source.arguments(&node));
            out.push(creation);
        }
        _ => out.push(opaque(node, &source.text(&node))),
    }
}

fn segment<'t>(source: &'t CSharpSource, name_node: Node<'t>) -> ChainSegment<'t> {
    if name_node.kind() == "generic_name" {
        let name = source
            .base()
            .find_child_by_type(&name_node, "identifier")
            .map(|n| source.text(&n))
            .unwrap_or_else(|| source.text(&name_node));
        let generic_args = source
            .base()
            .find_child_by_type(&name_node, "type_argument_list")
            .map(|list| {
                let mut cursor = list.walk();
                list.named_children(&mut cursor)
                    .map(|t| source.text(&t))
                    .collect()
            })
            .unwrap_or_default();
        return ChainSegment {
            name,
            generic_args,
            arguments: None,
            node: name_node,
        };
    }
    opaque(name_node, &source.text(&name_node))
}

fn opaque<'t>(node: Node<'t>, name: &str) -> ChainSegment<'t> {
    ChainSegment {
        name: name.to_string(),
        generic_args: Vec::new(),
        arguments: None,
        node,
    }
}

/// True when no enclosing member access or call continues this invocation's chain
pub fn is_chain_root(node: &Node) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    let continues = match parent.kind() {
        "member_access_expression" => parent.child_by_field_name("expression"),
        "invocation_expression" => parent.child_by_field_name("function"),
        _ => None,
    };
    continues.is_none_or(|child| child.id() != node.id())
}

/// Final name token of a call site: method name, or constructed type name
pub fn callee_name(source: &CSharpSource, call: &Node) -> Option<String> {
    match call.kind() {
        "invocation_expression" => {
            let function = call.child_by_field_name("function").or_else(|| call.named_child(0))?;
            let segments = flatten_member_chain(source, function);
            segments.last().map(|s| s.name.clone())
        }
        "object_creation_expression" => {
            let type_node = call.child_by_field_name("type")?;
            let text = source.text(&type_node);
            let without_generics = text.split('<').next().unwrap_or(&text);
            without_generics.rsplit('.').next().map(|s| s.trim().to_string())
        }
        _ => None,
    }
}
