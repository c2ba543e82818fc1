// Canonical node keys
//
// Database objects are keyed `<schema>.<name>|<KIND>`, code constructs
// `code:<full.name>|<KIND>`. Lookups go through `lookup_key`, which folds case.

use super::NodeKind;

/// Prefix that keeps code keys apart from database keys with the same short name
pub const CODE_KEY_PREFIX: &str = "code:";

/// A possibly schema-qualified database object name with delimiters removed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema
                .map(unquote_identifier)
                .filter(|s| !s.is_empty()),
            name: unquote_identifier(name),
        }
    }

    /// Parse `name`, `schema.name`, `[db].[schema].[name]` and friends.
    ///
    /// Three- and four-part names keep only the last two parts. Returns `None` for
    /// empty input or a trailing empty part.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts = split_name_parts(raw.trim());
        let mut parts: Vec<String> = parts.iter().map(|p| unquote_identifier(p)).collect();
        let name = parts.pop().filter(|n| !n.is_empty())?;
        let schema = parts.pop().filter(|s| !s.is_empty());
        Some(Self { schema, name })
    }

    /// Schema to use in keys, falling back to the run's default schema
    pub fn schema_or<'a>(&'a self, default_schema: &'a str) -> &'a str {
        self.schema.as_deref().unwrap_or(default_schema)
    }

    pub fn display(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// Split a dotted name on dots that are not inside `[...]` or `"..."`
fn split_name_parts(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_bracket = false;
    let mut in_quote = false;

    for ch in raw.chars() {
        match ch {
            '[' if !in_quote => {
                in_bracket = true;
                current.push(ch);
            }
            ']' if !in_quote => {
                in_bracket = false;
                current.push(ch);
            }
            '"' if !in_bracket => {
                in_quote = !in_quote;
                current.push(ch);
            }
            '.' if !in_bracket && !in_quote => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// Strip `[x]`, `"x"` and `` `x` `` delimiters from one identifier part
pub fn unquote_identifier(part: &str) -> String {
    let trimmed = part.trim();
    let stripped = if trimmed.len() >= 2
        && ((trimmed.starts_with('[') && trimmed.ends_with(']'))
            || (trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('`') && trimmed.ends_with('`')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    stripped.trim().to_string()
}

/// Key for a database object: `dbo.Customer|TABLE`
pub fn db_key(schema: &str, name: &str, kind: NodeKind) -> String {
    format!("{}.{}|{}", schema, name, kind.as_str())
}

/// Key for a code construct: `code:Shop.Models.Product|ENTITY`
pub fn code_key(full_name: &str, kind: NodeKind) -> String {
    format!("{}{}|{}", CODE_KEY_PREFIX, full_name, kind.as_str())
}

/// Case-folded form used for every map lookup
pub fn lookup_key(key: &str) -> String {
    key.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bracketed_three_part_name() {
        let name = QualifiedName::parse("[Sales].[dbo].[Order Lines]").unwrap();
        assert_eq!(name.schema.as_deref(), Some("dbo"));
        assert_eq!(name.name, "Order Lines");
    }

    #[test]
    fn test_parse_unqualified_name_has_no_schema() {
        let name = QualifiedName::parse("Customer").unwrap();
        assert_eq!(name.schema, None);
        assert_eq!(name.schema_or("dbo"), "dbo");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(QualifiedName::parse("").is_none());
        assert!(QualifiedName::parse("dbo.").is_none());
    }

    #[test]
    fn test_database_and_code_keys_never_collide() {
        let db = db_key("dbo", "Product", NodeKind::Table);
        let code = code_key("Product", NodeKind::Table);
        assert_eq!(db, "dbo.Product|TABLE");
        assert_ne!(lookup_key(&db), lookup_key(&code));
    }
}
