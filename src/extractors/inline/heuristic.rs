// "Looks like a statement" gate for string literals outside hot call sites

pub const MIN_STATEMENT_LENGTH: usize = 12;

const VERB_TOKENS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "EXEC", "EXECUTE", "CREATE", "ALTER", "DROP",
];

const STRUCTURAL_TOKENS: &[&str] = &["FROM", "WHERE", "JOIN", "INTO", "TABLE"];

/// Collapse whitespace runs to one space and uppercase
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// True when `text` carries a statement verb and a structural keyword as whole words
pub fn looks_like_statement(text: &str) -> bool {
    let normalized = normalize(text);
    if normalized.chars().count() < MIN_STATEMENT_LENGTH {
        return false;
    }

    let spaced: String = normalized
        .chars()
        .map(|c| if matches!(c, '(' | ')' | ',' | ';') { ' ' } else { c })
        .collect();
    let padded = format!(" {} ", spaced);
    let has = |tokens: &[&str]| tokens.iter().any(|t| padded.contains(&format!(" {} ", t)));

    has(VERB_TOKENS) && has(STRUCTURAL_TOKENS)
}
