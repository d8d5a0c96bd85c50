// ABOUTME: Best-effort repair of malformed literals in hand-edited SQL dumps
// ABOUTME: Quotes bare timestamps and bare JSON objects outside of string literals

use once_cell::sync::Lazy;
use regex::Regex;

/// Bare `YYYY-MM-DD HH:MM:SS...` value, up to the next quote, comma or paren
static BARE_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}[^',)]*)").unwrap());

/// Bare `{...}` object sitting directly in a VALUES list
static BARE_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,(])\s*(\{[^}]*\})\s*([,)])").unwrap());

/// Repair a single statement
///
/// Only text outside single-quoted literals is rewritten, so values that are
/// already quoted are left alone. Bare timestamps become
/// `'2024-01-01 10:00:00'` and bare objects such as `, {"a": 1})` become
/// `,'{"a": 1}')`.
///
/// # Examples
///
/// ```
/// # use postgres_mirror::dump::repair_literals;
/// let fixed = repair_literals("INSERT INTO t VALUES (1, 2024-01-05 10:30:00)");
/// assert_eq!(fixed, "INSERT INTO t VALUES (1, '2024-01-05 10:30:00')");
/// ```
pub fn repair_literals(statement: &str) -> String {
    let mut output = String::with_capacity(statement.len() + 16);
    let mut bare = String::new();
    let mut in_literal = false;

    // Double quotes are left to the regexes: JSON keys use them
    for ch in statement.chars() {
        if in_literal {
            in_literal = ch != '\'';
            output.push(ch);
        } else if ch == '\'' {
            output.push_str(&repair_bare_segment(&bare));
            bare.clear();
            in_literal = true;
            output.push(ch);
        } else {
            bare.push(ch);
        }
    }

    output.push_str(&repair_bare_segment(&bare));
    output
}

fn repair_bare_segment(segment: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }
    let quoted_timestamps = BARE_TIMESTAMP.replace_all(segment, "'$1'");
    BARE_OBJECT
        .replace_all(&quoted_timestamps, "$1'$2'$3")
        .into_owned()
}
