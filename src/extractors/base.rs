// Shared tree-sitter helpers for the source extractors
//
// Everything here is read-only over one file's text: node text slicing, child
// and descendant lookups, and 1-based line numbers.

use tree_sitter::Node;

/// One file's path and text, plus the node helpers every extractor leans on
#[derive(Debug, Clone)]
pub struct BaseExtractor {
    pub file_path: String,
    pub content: String,
}

impl BaseExtractor {
    pub fn new(file_path: String, content: String) -> Self {
        Self { file_path, content }
    }

    /// Source text covered by `node`
    pub fn get_node_text(&self, node: &Node) -> String {
        let start_byte = node.start_byte();
        let end_byte = node.end_byte();

        // Byte slice with lossy UTF-8 at the edges
        let content_bytes = self.content.as_bytes();
        if start_byte < content_bytes.len() && end_byte <= content_bytes.len() {
            String::from_utf8_lossy(&content_bytes[start_byte..end_byte]).to_string()
        } else {
            String::new()
        }
    }

    pub fn get_field_text(&self, node: &Node, field_name: &str) -> Option<String> {
        node.child_by_field_name(field_name)
            .map(|field_node| self.get_node_text(&field_node))
    }

    /// 1-based line of the node's first character
    pub fn start_line(&self, node: &Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    /// 1-based line of the node's last character
    pub fn end_line(&self, node: &Node) -> u32 {
        node.end_position().row as u32 + 1
    }

    pub fn walk_tree<F>(&self, node: &Node, visitor: &mut F, depth: u32)
    where
        F: FnMut(&Node, u32),
    {
        visitor(node, depth);

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                self.walk_tree(&child, visitor, depth + 1);
            }
        }
    }

    /// Every descendant (and `node` itself) of the given kind, in source order
    pub fn find_nodes_by_type<'a>(&self, node: &Node<'a>, node_type: &str) -> Vec<Node<'a>> {
        self.find_nodes_by_types(node, &[node_type])
    }

    pub fn find_nodes_by_types<'a>(&self, node: &Node<'a>, types: &[&str]) -> Vec<Node<'a>> {
        let mut nodes = Vec::new();
        Self::collect_by_types(node, types, &mut nodes);
        nodes
    }

    fn collect_by_types<'a>(node: &Node<'a>, types: &[&str], nodes: &mut Vec<Node<'a>>) {
        if types.contains(&node.kind()) {
            nodes.push(*node);
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::collect_by_types(&child, types, nodes);
            }
        }
    }

    pub fn find_parent_of_type<'a>(&self, node: &Node<'a>, parent_type: &str) -> Option<Node<'a>> {
        self.find_parent_of_types(node, &[parent_type])
    }

    pub fn find_parent_of_types<'a>(&self, node: &Node<'a>, types: &[&str]) -> Option<Node<'a>> {
        let mut current = node.parent();
        while let Some(parent) = current {
            if types.contains(&parent.kind()) {
                return Some(parent);
            }
            current = parent.parent();
        }
        None
    }

    pub fn has_error(&self, node: &Node) -> bool {
        node.has_error() || node.kind() == "ERROR"
    }

    pub fn find_child_by_type<'a>(&self, node: &Node<'a>, child_type: &str) -> Option<Node<'a>> {
        self.find_child_by_types(node, &[child_type])
    }

    pub fn find_children_by_type<'a>(&self, node: &Node<'a>, child_type: &str) -> Vec<Node<'a>> {
        let mut results = Vec::new();
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                if child.kind() == child_type {
                    results.push(child);
                }
            }
        }
        results
    }

    pub fn find_child_by_types<'a>(&self, node: &Node<'a>, types: &[&str]) -> Option<Node<'a>> {
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                if types.contains(&child.kind()) {
                    return Some(child);
                }
            }
        }
        None
    }

    /// Named children, skipping comments
    pub fn named_children<'a>(&self, node: &Node<'a>) -> Vec<Node<'a>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    #[test]
    fn test_node_helpers_on_csharp_tree() {
        let code = "namespace Shop { class Repo { void Load() { var x = 1; } } }";
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .expect("Error loading C# grammar");
        let tree = parser.parse(code, None).unwrap();
        let base = BaseExtractor::new("Repo.cs".to_string(), code.to_string());
        let root = tree.root_node();

        let methods = base.find_nodes_by_type(&root, "method_declaration");
        assert_eq!(methods.len(), 1);
        assert_eq!(base.start_line(&methods[0]), 1);

        let class = base.find_parent_of_type(&methods[0], "class_declaration").unwrap();
        assert!(base.get_node_text(&class).starts_with("class Repo"));
        assert!(!base.has_error(&root));
    }
}
