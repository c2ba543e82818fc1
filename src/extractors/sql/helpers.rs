// Pattern helpers for T-SQL text
//
// Used where the SQL grammar cannot help: batch splitting on `GO`, header and
// reference scans for batches the parser rejects, and statement-verb lookups.

use crate::graph::QualifiedName;
use regex::Regex;
use std::sync::LazyLock;

/// One- to four-part object name, bracketed, quoted or bare
macro_rules! object_name {
    () => {
        r#"(?:\[[^\]]+\]|"[^"]+"|[A-Za-z_#@][\w$#@]*)(?:\s*\.\s*(?:\[[^\]]+\]|"[^"]+"|[A-Za-z_][\w$#@]*)){0,3}"#
    };
}

static GO_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*GO(?:\s+\d+)?\s*;?\s*$").unwrap());

pub(crate) static OBJECT_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(CREATE(?:\s+OR\s+(?:ALTER|REPLACE))?|ALTER)\s+(TABLE|VIEW|PROCEDURE|PROC|FUNCTION|TRIGGER|SEQUENCE|TYPE|SYNONYM)\s+(",
        object_name!(),
        ")"
    ))
    .unwrap()
});

pub(crate) static REFERENCES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(r"(?i)\bREFERENCES\s+(", object_name!(), ")")).unwrap()
});

pub(crate) static TRIGGER_ON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\bTRIGGER\s+",
        object_name!(),
        r"\s+ON\s+(",
        object_name!(),
        ")"
    ))
    .unwrap()
});

pub(crate) static SYNONYM_FOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\bSYNONYM\s+",
        object_name!(),
        r"\s+FOR\s+(",
        object_name!(),
        ")"
    ))
    .unwrap()
});

pub(crate) static TABLE_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(DELETE\s+FROM|MERGE(?:\s+INTO)?|INSERT\s+INTO|FROM|JOIN|INTO|UPDATE)\s+(",
        object_name!(),
        ")"
    ))
    .unwrap()
});

pub(crate) static WRITE_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:INSERT\s+(?:INTO\s+)?|UPDATE\s+|DELETE\s+(?:FROM\s+)?|MERGE\s+(?:INTO\s+)?)(",
        object_name!(),
        ")"
    ))
    .unwrap()
});

pub(crate) static TABLE_ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:FROM|JOIN)\s+(",
        object_name!(),
        r")(?:\s+AS)?\s+([A-Za-z_]\w*)"
    ))
    .unwrap()
});

pub(crate) static EXEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\bEXEC(?:UTE)?\s+(?:@\w+\s*=\s*)?(",
        object_name!(),
        ")"
    ))
    .unwrap()
});

static CTE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bWITH|,)\s*(\[[^\]]+\]|[A-Za-z_]\w*)\s*(?:\([^)]*\))?\s*AS\s*\(").unwrap()
});

/// Words the reference patterns can pick up that never name an object
const NOT_OBJECT_NAMES: &[&str] = &[
    "ACTION", "AS", "CASCADE", "DEFAULT", "DELETED", "DISTINCT", "INSERTED", "NO", "NULL",
    "ON", "OUTPUT", "SELECT", "SET", "STATISTICS", "TOP", "VALUES", "WHERE", "WITH",
];

/// Words that can follow a table reference without being its alias
const NOT_ALIASES: &[&str] = &[
    "APPLY", "AS", "BEGIN", "CROSS", "DECLARE", "DELETE", "ELSE", "END", "EXCEPT", "EXEC",
    "EXECUTE", "FOR", "FULL", "GO", "GROUP", "HAVING", "IF", "INNER", "INSERT", "INTERSECT",
    "INTO", "JOIN", "LEFT", "MERGE", "ON", "OPTION", "ORDER", "OUTER", "OUTPUT", "PIVOT",
    "PRINT", "RETURN", "RIGHT", "SELECT", "SET", "TABLESAMPLE", "THEN", "UNION", "UNPIVOT",
    "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WHILE", "WITH",
];

/// Procedures whose argument is itself statement text
const DYNAMIC_SQL_PROCS: &[&str] = &["sp_executesql"];

/// One `GO`-delimited batch of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub text: String,
    /// 1-based line of the batch's first line
    pub start_line: u32,
}

/// Split a script on `GO` separator lines
pub fn split_batches(script: &str) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current = String::new();
    let mut start_line = 1u32;

    for (index, line) in script.lines().enumerate() {
        let line_number = index as u32 + 1;
        if GO_LINE_RE.is_match(line) {
            if !current.trim().is_empty() {
                batches.push(Batch {
                    text: std::mem::take(&mut current),
                    start_line,
                });
            }
            current.clear();
            start_line = line_number + 1;
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        batches.push(Batch {
            text: current,
            start_line,
        });
    }
    batches
}

/// Replace comments and string literal contents with spaces, keeping byte offsets and newlines
pub fn blank_comments_and_strings(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let mut depth = 0usize;
                while i < bytes.len() {
                    if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                        depth += 1;
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        continue;
                    }
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        depth -= 1;
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        if depth == 0 {
                            break;
                        }
                        continue;
                    }
                    if bytes[i] != b'\n' {
                        out[i] = b' ';
                    }
                    i += 1;
                }
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) == Some(&b'\'') {
                            out[i] = b' ';
                            out[i + 1] = b' ';
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    if bytes[i] != b'\n' {
                        out[i] = b' ';
                    }
                    i += 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    // Blanked runs are ASCII-delimited, so whole characters were replaced
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Blanked text with `[ident]` rewritten as `"ident"`, same length
pub fn normalize_for_parse(text: &str) -> String {
    let mut out = blank_comments_and_strings(text).into_bytes();
    let mut open: Option<usize> = None;
    for i in 0..out.len() {
        match (out[i], open) {
            (b'[', None) => open = Some(i),
            (b']', Some(start)) => {
                out[start] = b'"';
                out[i] = b'"';
                open = None;
            }
            (b'\n', Some(_)) => open = None,
            _ => {}
        }
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// 0-based line index of a byte offset
pub fn line_offset(text: &str, byte_offset: usize) -> u32 {
    text.as_bytes()[..byte_offset.min(text.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count() as u32
}

/// Parse a referenced name, dropping temp tables, variables and stray keywords
pub fn object_reference_name(raw: &str) -> Option<QualifiedName> {
    let trimmed = raw.trim();
    if trimmed.starts_with('#') || trimmed.starts_with('@') {
        return None;
    }
    let name = QualifiedName::parse(trimmed)?;
    if name.schema.is_none()
        && NOT_OBJECT_NAMES
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&name.name))
    {
        return None;
    }
    Some(name)
}

/// Case-folded names of CTEs declared in `text`
pub fn cte_names(text: &str) -> Vec<String> {
    CTE_NAME_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| crate::graph::keys::unquote_identifier(m.as_str()).to_lowercase())
        .collect()
}

/// Targets of `EXEC proc` calls
pub fn exec_targets(text: &str) -> Vec<QualifiedName> {
    EXEC_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| object_reference_name(m.as_str()))
        .filter(|name| {
            !DYNAMIC_SQL_PROCS
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&name.name))
        })
        .collect()
}

/// `FROM|JOIN <name> [AS] <alias>` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAlias {
    /// Byte offset of the declaring `FROM`/`JOIN`
    pub offset: usize,
    /// Case-folded
    pub alias: String,
    pub target: QualifiedName,
}

/// Table aliases declared in `text`, in source order
pub fn table_aliases(text: &str) -> Vec<TableAlias> {
    let mut aliases = Vec::new();
    for caps in TABLE_ALIAS_RE.captures_iter(text) {
        let (Some(whole), Some(raw), Some(alias)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let alias = alias.as_str();
        if NOT_ALIASES.iter().any(|k| k.eq_ignore_ascii_case(alias)) {
            continue;
        }
        let Some(target) = object_reference_name(raw.as_str()) else {
            continue;
        };
        if target.schema.is_none() && target.name.eq_ignore_ascii_case(alias) {
            continue;
        }
        aliases.push(TableAlias {
            offset: whole.start(),
            alias: alias.to_lowercase(),
            target,
        });
    }
    aliases
}

/// Whether a bare `name` is one of the declared aliases
pub fn is_alias(name: &QualifiedName, aliases: &[TableAlias]) -> bool {
    name.schema.is_none() && {
        let folded = name.name.to_lowercase();
        aliases.iter().any(|a| a.alias == folded)
    }
}

/// Object a bare alias used at `offset` stands for.
///
/// `UPDATE c ... FROM t c` declares the alias after its use, so the nearest
/// declaration following `offset` wins, then any earlier one.
pub fn resolve_alias(name: QualifiedName, offset: usize, aliases: &[TableAlias]) -> QualifiedName {
    if name.schema.is_some() {
        return name;
    }
    let folded = name.name.to_lowercase();
    let folded = folded.as_str();
    let matching = || aliases.iter().filter(move |a| a.alias == folded);
    matching()
        .find(|a| a.offset > offset)
        .or_else(|| matching().last())
        .map(|a| a.target.clone())
        .unwrap_or(name)
}

/// Case-folded display names of INSERT/UPDATE/DELETE/MERGE targets, aliases resolved
pub fn write_targets(text: &str, aliases: &[TableAlias]) -> Vec<String> {
    WRITE_TARGET_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| {
            object_reference_name(m.as_str()).map(|name| resolve_alias(name, m.start(), aliases))
        })
        .map(|name| name.display().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_batches_tracks_start_lines() {
        let script = "CREATE TABLE a(id INT)\nGO\n\nCREATE TABLE b(id INT)\ngo 2\n";
        let batches = split_batches(script);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].start_line, 1);
        assert_eq!(batches[1].start_line, 3);
        assert!(batches[1].text.contains("CREATE TABLE b"));
    }

    #[test]
    fn test_blanking_keeps_offsets() {
        let text = "SELECT 'FROM x' -- FROM y\nFROM /* JOIN z */ t";
        let blanked = blank_comments_and_strings(text);
        assert_eq!(blanked.len(), text.len());
        assert!(!blanked.contains("FROM x"));
        assert!(!blanked.contains("JOIN"));
        assert!(blanked.contains("FROM"));
        assert_eq!(line_offset(&blanked, blanked.rfind('t').unwrap()), 1);
    }

    #[test]
    fn test_reference_names_skip_temp_tables_and_keywords() {
        assert!(object_reference_name("#staging").is_none());
        assert!(object_reference_name("@rows").is_none());
        assert!(object_reference_name("inserted").is_none());
        assert_eq!(object_reference_name("[dbo].[Order]").unwrap().display(), "dbo.Order");
    }

    #[test]
    fn test_table_aliases_skip_keywords_and_resolve_forward() {
        let text = "UPDATE c SET Active = 0 FROM dbo.Customer c WHERE c.Id = 1;\n\
                    DELETE c FROM dbo.Cart AS c JOIN dbo.Item i ON i.CartId = c.Id;\n\
                    SELECT * FROM dbo.Audit WHERE 1 = 1";
        let aliases = table_aliases(text);
        let declared: Vec<(&str, String)> = aliases
            .iter()
            .map(|a| (a.alias.as_str(), a.target.display()))
            .collect();
        assert_eq!(
            declared,
            vec![
                ("c", "dbo.Customer".to_string()),
                ("c", "dbo.Cart".to_string()),
                ("i", "dbo.Item".to_string()),
            ]
        );

        assert_eq!(write_targets(text, &aliases), vec!["dbo.customer", "dbo.cart"]);
        assert!(is_alias(&QualifiedName::new(None, "C"), &aliases));
        assert!(!is_alias(&QualifiedName::new(Some("dbo"), "c"), &aliases));
    }
}
