// String literal decoding
//
// Handles regular, verbatim (`@"..."`), raw (`"""..."""`) and interpolated
// (`$"..."`, `$@"..."`, `$$"""..."""`) literals. Interpolation holes become
// positional placeholders `@p0`, `@p1`, ... so the text still parses as a
// statement.

/// Decoded value of a C# string literal, or `None` if `raw` is not one
pub fn decode_string_literal(raw: &str) -> Option<String> {
    let text = raw.trim();
    let text = text.strip_suffix("u8").unwrap_or(text);

    let mut dollars = 0usize;
    let mut verbatim = false;
    let mut rest = text;
    loop {
        if let Some(r) = rest.strip_prefix('$') {
            dollars += 1;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('@') {
            verbatim = true;
            rest = r;
        } else {
            break;
        }
    }

    let quotes = rest.chars().take_while(|c| *c == '"').count();
    if quotes == 0 || !rest.ends_with('"') {
        return None;
    }

    if quotes >= 3 && !verbatim {
        let body = rest.get(quotes..rest.len().checked_sub(quotes)?)?;
        let body = strip_raw_indentation(body);
        return Some(if dollars > 0 {
            replace_holes(&body, dollars, true)
        } else {
            body
        });
    }

    let body = rest.get(1..rest.len().checked_sub(1)?)?;
    let body = if dollars > 0 {
        replace_holes(body, 1, false)
    } else {
        body.to_string()
    };

    Some(if verbatim {
        body.replace("\"\"", "\"")
    } else {
        unescape(&body)
    })
}

/// Multi-line raw literals drop the delimiter lines and the closing line's indentation
fn strip_raw_indentation(body: &str) -> String {
    if !body.contains('\n') {
        return body.to_string();
    }

    let lines: Vec<&str> = body.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let last = lines.last().copied().unwrap_or("");
    let indent = if last.trim().is_empty() { last } else { "" };

    let start = usize::from(lines.first().is_some_and(|l| l.trim().is_empty()));
    let end = if last.trim().is_empty() {
        lines.len() - 1
    } else {
        lines.len()
    };
    if start >= end {
        return String::new();
    }

    lines[start..end]
        .iter()
        .map(|line| line.strip_prefix(indent).unwrap_or(line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `{expr}` holes with `@pN`; doubled braces are literal in non-raw strings
fn replace_holes(body: &str, brace_run: usize, raw: bool) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    let mut hole = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '{' {
            let run = chars[i..].iter().take_while(|c| **c == '{').count();
            if !raw && run >= 2 {
                out.push('{');
                i += 2;
                continue;
            }
            if run < brace_run {
                out.extend(std::iter::repeat_n('{', run));
                i += run;
                continue;
            }
            // Literal braces preceding the opening run stay in the text
            out.extend(std::iter::repeat_n('{', run - brace_run));
            i += run;
            let mut depth = 1usize;
            while i < chars.len() && depth > 0 {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                i += 1;
            }
            // Closing run of a raw hole
            while raw && i < chars.len() && chars[i] == '}' && brace_run > 1 {
                i += 1;
            }
            out.push_str(&format!("@p{}", hole));
            hole += 1;
            continue;
        }
        if ch == '}' && !raw && chars.get(i + 1) == Some(&'}') {
            out.push('}');
            i += 2;
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_and_verbatim_literals() {
        assert_eq!(
            decode_string_literal(r#""SELECT \"Id\"\tFROM t""#).as_deref(),
            Some("SELECT \"Id\"\tFROM t")
        );
        assert_eq!(
            decode_string_literal(r#"@"SELECT * FROM ""Order""
WHERE 1 = 1""#)
            .as_deref(),
            Some("SELECT * FROM \"Order\"\nWHERE 1 = 1")
        );
    }

    #[test]
    fn test_raw_literal_strips_indentation() {
        let raw = "\"\"\"\n        SELECT Id\n          FROM dbo.Customer\n        \"\"\"";
        assert_eq!(
            decode_string_literal(raw).as_deref(),
            Some("SELECT Id\n  FROM dbo.Customer")
        );
    }

    #[test]
    fn test_interpolation_holes_become_placeholders() {
        assert_eq!(
            decode_string_literal(r#"$"SELECT * FROM {table} WHERE Id = {id} AND x = '{{a}}'""#).as_deref(),
            Some("SELECT * FROM @p0 WHERE Id = @p1 AND x = '{a}'")
        );
        assert_eq!(
            decode_string_literal("$$\"\"\"SELECT {x} FROM t WHERE id = {{id}}\"\"\"").as_deref(),
            Some("SELECT {x} FROM t WHERE id = @p0")
        );
    }

    #[test]
    fn test_non_literal_is_rejected() {
        assert_eq!(decode_string_literal("sql"), None);
        assert_eq!(decode_string_literal("'c'"), None);
    }
}
