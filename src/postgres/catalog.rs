// ABOUTME: Reads enum types, tables, columns, rows and sequences from a PostgreSQL schema
// ABOUTME: Column kinds come straight from pg_type so coercion never has to guess

use super::connection::describe_db_error;
use crate::migration::{
    ColumnDescriptor, ColumnKind, EnumType, RawRow, SequenceState, SourceCatalog,
};
use crate::utils::{quote_ident, quote_literal};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{pin_mut, TryStreamExt};
use serde_json::Value as JsonValue;
use tokio_postgres::Client;

const ENUMS_SQL: &str = "\
    SELECT t.typname::text, array_agg(e.enumlabel::text ORDER BY e.enumsortorder) \
    FROM pg_catalog.pg_type t \
    JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid \
    JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
    WHERE n.nspname = $1 \
    GROUP BY t.typname \
    ORDER BY t.typname";

const TABLES_SQL: &str = "\
    SELECT tablename::text FROM pg_catalog.pg_tables \
    WHERE schemaname = $1 \
    ORDER BY tablename";

// Generated columns come back without a default so their values are copied
// into a plain column.
const COLUMNS_SQL: &str = "\
    SELECT a.attname::text, \
           t.typname::text, \
           pg_catalog.format_type(a.atttypid, a.atttypmod), \
           NOT a.attnotnull, \
           CASE WHEN a.attgenerated = '' THEN pg_catalog.pg_get_expr(d.adbin, d.adrelid) END, \
           CASE WHEN t.typname IN ('varchar', 'bpchar') AND a.atttypmod > 4 \
                THEN a.atttypmod - 4 END, \
           CASE WHEN t.typname IN ('json', 'jsonb') THEN 'json' \
                WHEN t.typcategory = 'A' THEN 'array' \
                WHEN t.typtype = 'e' THEN 'enum' \
                ELSE 'scalar' END \
    FROM pg_catalog.pg_attribute a \
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
    JOIN pg_catalog.pg_type t ON t.oid = a.atttypid \
    LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
    WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped \
    ORDER BY a.attnum";

const SEQUENCES_SQL: &str = "\
    SELECT sequencename::text, COALESCE(last_value, start_value), last_value IS NOT NULL \
    FROM pg_catalog.pg_sequences \
    WHERE schemaname = $1 \
    ORDER BY sequencename";

/// Pairs per `jsonb_build_object` call, which takes at most 100 arguments
const OVERRIDES_PER_OBJECT: usize = 50;

/// Row query producing one JSON object per row
///
/// `numeric` values would lose digits as JSON numbers, so those columns are
/// overlaid as text (`numeric[]` as `text[]`) and bound back through a cast.
fn row_select_sql(qualified_table: &str, columns: &[ColumnDescriptor]) -> String {
    let overrides: Vec<String> = columns
        .iter()
        .filter_map(|c| {
            let cast = match c.udt_name.as_str() {
                "numeric" => "text",
                "_numeric" => "text[]",
                _ => return None,
            };
            Some(format!(
                "{}, t.{}::{}",
                quote_literal(&c.name),
                quote_ident(&c.name),
                cast
            ))
        })
        .collect();

    let mut select = String::from("to_jsonb(t)");
    for chunk in overrides.chunks(OVERRIDES_PER_OBJECT) {
        select.push_str(&format!(" || jsonb_build_object({})", chunk.join(", ")));
    }
    format!("SELECT {} FROM {} AS t", select, qualified_table)
}

/// A live PostgreSQL database read as a copy source
pub struct PgSource {
    client: Client,
    schema: String,
}

impl PgSource {
    pub fn new(client: Client, schema: impl Into<String>) -> Self {
        Self {
            client,
            schema: schema.into(),
        }
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table))
    }
}

#[async_trait]
impl SourceCatalog for PgSource {
    async fn list_enums(&self) -> Result<Vec<EnumType>> {
        let rows = self
            .client
            .query(ENUMS_SQL, &[&self.schema])
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))
            .context("Failed to list enum types")?;

        Ok(rows
            .iter()
            .map(|row| EnumType {
                name: row.get(0),
                labels: row.get(1),
            })
            .collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(TABLES_SQL, &[&self.schema])
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))
            .with_context(|| format!("Failed to list tables in schema '{}'", self.schema))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .client
            .query(COLUMNS_SQL, &[&self.schema, &table])
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))
            .with_context(|| format!("Failed to read columns of '{}'", table))?;

        Ok(rows
            .iter()
            .map(|row| {
                let kind: String = row.get(6);
                ColumnDescriptor {
                    name: row.get(0),
                    udt_name: row.get(1),
                    sql_type: row.get(2),
                    nullable: row.get(3),
                    default: row.get(4),
                    max_length: row.get(5),
                    kind: ColumnKind::from_catalog(&kind),
                }
            })
            .collect())
    }

    async fn fetch_rows(&self, table: &str, columns: &[ColumnDescriptor]) -> Result<Vec<RawRow>> {
        let sql = row_select_sql(&self.qualified(table), columns);
        tracing::debug!("{}", sql);

        let stream = self
            .client
            .query_raw(sql.as_str(), std::iter::empty::<String>())
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))
            .with_context(|| format!("Failed to read rows of '{}'", table))?;
        pin_mut!(stream);

        let mut rows = Vec::new();
        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))?
        {
            let record: JsonValue = row.get(0);
            rows.push(
                columns
                    .iter()
                    .map(|c| record.get(&c.name).cloned().unwrap_or(JsonValue::Null))
                    .collect(),
            );
        }

        Ok(rows)
    }

    async fn list_sequences(&self) -> Result<Vec<SequenceState>> {
        let rows = self
            .client
            .query(SEQUENCES_SQL, &[&self.schema])
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))
            .context("Failed to list sequences")?;

        Ok(rows
            .iter()
            .map(|row| SequenceState {
                name: row.get(0),
                last_value: row.get(1),
                is_called: row.get(2),
            })
            .collect())
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table));
        let row = self
            .client
            .query_one(sql.as_str(), &[])
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))
            .with_context(|| format!("Failed to count rows in '{}'", table))?;
        Ok(row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_select_without_numeric_columns() {
        let columns = vec![
            ColumnDescriptor::new("id", "int4"),
            ColumnDescriptor::new("name", "text"),
        ];
        assert_eq!(
            row_select_sql("\"public\".\"users\"", &columns),
            "SELECT to_jsonb(t) FROM \"public\".\"users\" AS t"
        );
    }

    #[test]
    fn test_row_select_reads_numerics_as_text() {
        let columns = vec![
            ColumnDescriptor::new("id", "int4"),
            ColumnDescriptor::new("amount", "numeric").with_sql_type("numeric(38,10)"),
            ColumnDescriptor::new("rates", "_numeric").with_sql_type("numeric[]"),
        ];
        assert_eq!(
            row_select_sql("\"public\".\"ledger\"", &columns),
            "SELECT to_jsonb(t) || jsonb_build_object('amount', t.\"amount\"::text, \
             'rates', t.\"rates\"::text[]) FROM \"public\".\"ledger\" AS t"
        );
    }

    #[test]
    fn test_row_select_splits_wide_overrides() {
        let columns: Vec<ColumnDescriptor> = (0..120)
            .map(|i| ColumnDescriptor::new(format!("n{}", i), "numeric"))
            .collect();
        let sql = row_select_sql("\"wide\"", &columns);
        assert_eq!(sql.matches("jsonb_build_object(").count(), 3);
        assert!(sql.contains("'n119', t.\"n119\"::text"));
    }
}
