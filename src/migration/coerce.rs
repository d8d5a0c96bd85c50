// ABOUTME: Type-directed coercion of raw row values before insertion
// ABOUTME: Renders array literals and JSON payloads for the target column types

use super::schema::ColumnDescriptor;
use serde_json::Value as JsonValue;

/// A raw row: one JSON value per column, in column order
pub type RawRow = Vec<JsonValue>;

/// A row after coercion, ready to bind
pub type CoercedRow = Vec<CoercedValue>;

/// A value in the form it will be bound into an insert
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
    Null,
    /// Sent as-is (text, number, boolean)
    Passthrough(JsonValue),
    /// Brace-delimited PostgreSQL array literal, e.g. `{a,b\,c}`
    ArrayLiteral(String),
    /// Structured value serialized as JSON
    Json(JsonValue),
    /// Text already known to be valid JSON
    JsonText(String),
}

impl CoercedValue {
    /// Text form bound as a query parameter; `None` binds SQL NULL
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            CoercedValue::Null => None,
            CoercedValue::Passthrough(JsonValue::Null) => None,
            CoercedValue::Passthrough(JsonValue::String(s)) => Some(s.clone()),
            CoercedValue::Passthrough(JsonValue::Bool(b)) => Some(b.to_string()),
            CoercedValue::Passthrough(JsonValue::Number(n)) => Some(n.to_string()),
            CoercedValue::Passthrough(other) => Some(other.to_string()),
            CoercedValue::ArrayLiteral(literal) => Some(literal.clone()),
            CoercedValue::Json(value) => Some(value.to_string()),
            CoercedValue::JsonText(text) => Some(text.clone()),
        }
    }
}

/// Coerce one value for the given column
///
/// Rules, first match wins:
/// 1. array column, or a list headed for a non-JSON column: array literal
///    (a string holding a JSON array is parsed first, and passed through
///    untouched if it does not parse)
/// 2. mapping or list: JSON
/// 3. JSON column: valid JSON text passes through, invalid text becomes a
///    JSON string, anything else is JSON-encoded
/// 4. everything else passes through
///
/// Without a descriptor the value's own shape decides.
pub fn coerce_value(value: &JsonValue, column: Option<&ColumnDescriptor>) -> CoercedValue {
    if value.is_null() {
        return CoercedValue::Null;
    }

    let json_column = column.is_some_and(ColumnDescriptor::is_json);
    let array_column = column.is_some_and(ColumnDescriptor::is_array);

    if array_column || (value.is_array() && !json_column) {
        return match value {
            JsonValue::Array(items) => CoercedValue::ArrayLiteral(render_array_literal(items)),
            JsonValue::String(s) if s.starts_with('[') && s.ends_with(']') => {
                match serde_json::from_str::<JsonValue>(s) {
                    Ok(JsonValue::Array(items)) => {
                        CoercedValue::ArrayLiteral(render_array_literal(&items))
                    }
                    _ => CoercedValue::Passthrough(value.clone()),
                }
            }
            other => CoercedValue::Passthrough(other.clone()),
        };
    }

    if value.is_object() || value.is_array() {
        return CoercedValue::Json(value.clone());
    }

    if json_column {
        return match value {
            JsonValue::String(s) => {
                if serde_json::from_str::<JsonValue>(s).is_ok() {
                    CoercedValue::JsonText(s.clone())
                } else {
                    CoercedValue::Json(value.clone())
                }
            }
            other => CoercedValue::Json(other.clone()),
        };
    }

    CoercedValue::Passthrough(value.clone())
}

/// Coerce a whole row against its column descriptors
///
/// Missing trailing values bind as NULL.
pub fn coerce_row(row: &[JsonValue], columns: &[ColumnDescriptor]) -> CoercedRow {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| match row.get(idx) {
            Some(value) => coerce_value(value, Some(column)),
            None => CoercedValue::Null,
        })
        .collect()
}

/// Render a list as a PostgreSQL array literal
///
/// # Examples
///
/// ```
/// # use postgres_mirror::migration::coerce::render_array_literal;
/// # use serde_json::json;
/// assert_eq!(render_array_literal(&[]), "{}");
/// assert_eq!(render_array_literal(&[json!(1), json!(2), json!(3)]), "{1,2,3}");
/// assert_eq!(render_array_literal(&[json!("a,b"), json!("c")]), "{a\\,b,c}");
/// ```
pub fn render_array_literal(items: &[JsonValue]) -> String {
    let elements: Vec<String> = items.iter().map(render_array_element).collect();
    format!("{{{}}}", elements.join(","))
}

fn render_array_element(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Array(inner) => render_array_literal(inner),
        JsonValue::Object(_) => escape_element(&value.to_string()),
        JsonValue::String(s) => {
            if s.is_empty()
                || s.eq_ignore_ascii_case("null")
                || s.starts_with(char::is_whitespace)
                || s.ends_with(char::is_whitespace)
            {
                quote_element(s)
            } else {
                escape_element(s)
            }
        }
    }
}

/// Backslash-escape the characters that delimit unquoted array elements
fn escape_element(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '\\' | ',' | '"' | '{' | '}') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn quote_element(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for ch in s.chars() {
        if matches!(ch, '\\' | '"') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
