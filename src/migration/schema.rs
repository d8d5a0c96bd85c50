// ABOUTME: Schema model for mirrored tables: columns, enums, sequences
// ABOUTME: Renders the DDL used to recreate enum types and tables on the target

use crate::utils::{quote_ident, quote_literal};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static NEXTVAL_SEQUENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"nextval\('([^']+)'(?:::regclass)?\)").unwrap());

/// A whole default of the form `'label'::Type` or `'label'::"Type"`
static LABEL_CAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^'((?:[^']|'')*)'::(?:"([^"\[\]()]+)"|([A-Za-z_][A-Za-z0-9_$]*))$"#).unwrap()
});

/// How a column's values must be encoded before insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    #[default]
    Scalar,
    Json,
    Array,
    Enum,
}

impl ColumnKind {
    /// Parse the classification computed by the catalog query
    pub fn from_catalog(kind: &str) -> Self {
        match kind {
            "json" => ColumnKind::Json,
            "array" => ColumnKind::Array,
            "enum" => ColumnKind::Enum,
            _ => ColumnKind::Scalar,
        }
    }

    /// Classify from type names alone, for descriptors built without a catalog
    ///
    /// PostgreSQL array types carry a leading underscore in `udt_name`
    /// (`_text`) and render with a `[]` suffix. Enums are recognised by the
    /// capitalized-name convention only.
    pub fn infer(udt_name: &str) -> Self {
        let lower = udt_name.to_lowercase();
        if lower == "json" || lower == "jsonb" {
            ColumnKind::Json
        } else if udt_name.ends_with("[]") || udt_name.starts_with('_') || lower.contains("_array")
        {
            ColumnKind::Array
        } else if looks_like_enum_type(udt_name) {
            ColumnKind::Enum
        } else {
            ColumnKind::Scalar
        }
    }
}

/// Capitalized type names are treated as enums when the catalog can't say
pub fn looks_like_enum_type(type_name: &str) -> bool {
    type_name
        .trim_matches('"')
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Underlying type name (`int4`, `_text`, `Role`)
    pub udt_name: String,
    /// Type as rendered by the catalog (`integer`, `text[]`, `"Role"`)
    pub sql_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    #[serde(default)]
    pub kind: ColumnKind,
}

impl ColumnDescriptor {
    /// Nullable column with no default, classified from its type name
    pub fn new(name: impl Into<String>, udt_name: impl Into<String>) -> Self {
        let udt_name = udt_name.into();
        Self {
            name: name.into(),
            kind: ColumnKind::infer(&udt_name),
            sql_type: udt_name.clone(),
            udt_name,
            nullable: true,
            default: None,
            max_length: None,
        }
    }

    pub fn with_kind(mut self, kind: ColumnKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_sql_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = sql_type.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_max_length(mut self, max_length: i32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_json(&self) -> bool {
        self.kind == ColumnKind::Json
    }

    pub fn is_array(&self) -> bool {
        self.kind == ColumnKind::Array
    }

    /// Type to use in DDL and in insert casts
    ///
    /// Prefers the catalog rendering. Without one, enum names are quoted and
    /// the character length is appended.
    pub fn type_sql(&self) -> String {
        if !self.sql_type.is_empty() && self.sql_type != self.udt_name {
            return self.sql_type.clone();
        }

        let base = if self.kind == ColumnKind::Enum || looks_like_enum_type(&self.udt_name) {
            quote_ident(self.udt_name.trim_matches('"'))
        } else {
            self.udt_name.clone()
        };

        match self.max_length {
            Some(length) => format!("{}({})", base, length),
            None => base,
        }
    }

    fn render_definition(&self) -> String {
        let mut definition = format!("    {} {}", quote_ident(&self.name), self.type_sql());
        if !self.nullable {
            definition.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            definition.push_str(" DEFAULT ");
            definition.push_str(default);
        }
        definition
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    /// Labels in the source's sort order
    pub labels: Vec<String>,
}

impl EnumType {
    pub fn render_create(&self) -> String {
        let labels: Vec<String> = self.labels.iter().map(|l| quote_literal(l)).collect();
        format!(
            "CREATE TYPE {} AS ENUM ({});",
            quote_ident(&self.name),
            labels.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    pub name: String,
    pub last_value: i64,
    pub is_called: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Rewrite enum-cast defaults into `'value'::"Type"` form
    pub fn with_enum_defaults(mut self, enum_names: &BTreeSet<String>) -> Self {
        for column in &mut self.columns {
            if let Some(default) = column.default.take() {
                column.default = Some(rewrite_enum_default(&default, enum_names));
            }
        }
        self
    }

    pub fn render_drop(&self) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE;", quote_ident(&self.name))
    }

    pub fn render_create(&self) -> String {
        let definitions: Vec<String> = self
            .columns
            .iter()
            .map(ColumnDescriptor::render_definition)
            .collect();
        format!(
            "CREATE TABLE {} (\n{}\n);",
            quote_ident(&self.name),
            definitions.join(",\n")
        )
    }

    /// Sequences named in `nextval(...)` defaults, in column order
    ///
    /// Dropping a table with CASCADE also drops the sequences it owns, so these
    /// have to be recreated before the table itself.
    pub fn referenced_sequences(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut sequences = Vec::new();
        for default in self.columns.iter().filter_map(|c| c.default.as_deref()) {
            for caps in NEXTVAL_SEQUENCE.captures_iter(default) {
                let name = caps[1].to_string();
                if seen.insert(name.clone()) {
                    sequences.push(name);
                }
            }
        }
        sequences
    }
}

/// Rewrite a default that casts to an enum into the target's cast syntax
///
/// `'ADMIN'::Role` and `'ADMIN'::"Role"` both become `'ADMIN'::"Role"`.
/// Only a single quoted label cast to a plain type name is rewritten. Array
/// casts, function calls and casts to types that are neither known enums nor
/// capitalized come back unchanged.
pub fn rewrite_enum_default(default: &str, enum_names: &BTreeSet<String>) -> String {
    let Some(caps) = LABEL_CAST.captures(default.trim()) else {
        return default.to_string();
    };

    let Some(type_name) = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str()) else {
        return default.to_string();
    };
    if !(enum_names.contains(type_name) || looks_like_enum_type(type_name)) {
        return default.to_string();
    }

    let label = caps[1].replace("''", "'");
    format!("{}::{}", quote_literal(&label), quote_ident(type_name))
}
