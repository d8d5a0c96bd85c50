// ABOUTME: Writes mirrored schema and rows into a PostgreSQL target
// ABOUTME: Also executes restored dump statements, one savepoint per statement

use super::connection::describe_db_error;
use crate::dump::StatementExecutor;
use crate::migration::{
    CoercedRow, Destination, EnumType, InsertPlan, SequenceState, TableDefinition,
};
use crate::utils::quote_ident;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::future::Future;
use tokio_postgres::Client;

/// A PostgreSQL database receiving a mirror copy or a dump restore
///
/// Tables are addressed unqualified, so they land in the connection's
/// current schema (normally `public`).
pub struct PgDestination {
    client: Client,
}

impl PgDestination {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn run(&self, sql: &str) -> Result<()> {
        tracing::debug!("{}", sql);
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))
    }

    /// Run `action` so that its failure rolls back only its own work
    async fn in_savepoint<F>(&self, name: &str, action: F) -> Result<()>
    where
        F: Future<Output = Result<(), tokio_postgres::Error>> + Send,
    {
        self.run(&format!("SAVEPOINT {}", name)).await?;
        match action.await {
            Ok(()) => self.run(&format!("RELEASE SAVEPOINT {}", name)).await,
            Err(e) => {
                let message = describe_db_error(&e);
                self.run(&format!("ROLLBACK TO SAVEPOINT {}", name))
                    .await
                    .context("Failed to roll back to savepoint")?;
                Err(anyhow!(message))
            }
        }
    }

    async fn insert(&self, plan: &InsertPlan, rows: &[CoercedRow], savepoint: &str) -> Result<()> {
        let sql = plan.render_insert(rows.len());
        let params: Vec<Option<String>> = rows
            .iter()
            .flat_map(|row| row.iter().map(|value| value.to_sql_text()))
            .collect();

        self.in_savepoint(savepoint, async {
            self.client.execute_raw(sql.as_str(), params).await.map(|_| ())
        })
        .await
    }

    /// Statement-level access for ad hoc checks in tests and commands
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Destination for PgDestination {
    async fn type_exists(&self, name: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_type WHERE typname = $1)",
                &[&name],
            )
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))?;
        Ok(row.get(0))
    }

    async fn create_enum(&self, enum_type: &EnumType) -> Result<()> {
        self.run(&enum_type.render_create()).await
    }

    async fn recreate_table(&self, table: &TableDefinition) -> Result<()> {
        self.run(&table.render_drop()).await?;
        for sequence in table.referenced_sequences() {
            self.run(&format!("CREATE SEQUENCE IF NOT EXISTS {}", sequence))
                .await
                .with_context(|| format!("Failed to create sequence {}", sequence))?;
        }
        self.run(&table.render_create()).await
    }

    async fn begin_load(&self, _table: &str) -> Result<()> {
        self.run("BEGIN").await
    }

    async fn insert_batch(&self, plan: &InsertPlan, rows: &[CoercedRow]) -> Result<()> {
        self.insert(plan, rows, "mirror_batch").await
    }

    async fn insert_row(&self, plan: &InsertPlan, row: &CoercedRow) -> Result<()> {
        self.insert(plan, std::slice::from_ref(row), "mirror_row").await
    }

    async fn finish_load(&self, _table: &str) -> Result<()> {
        self.run("COMMIT").await
    }

    async fn abort_load(&self, _table: &str) -> Result<()> {
        self.run("ROLLBACK").await
    }

    async fn set_sequence(&self, sequence: &SequenceState) -> Result<()> {
        self.client
            .execute(
                "SELECT pg_catalog.setval($1::text::regclass, $2, $3)",
                &[
                    &quote_ident(&sequence.name),
                    &sequence.last_value,
                    &sequence.is_called,
                ],
            )
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))?;
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT tablename::text FROM pg_catalog.pg_tables \
                 WHERE schemaname = current_schema() ORDER BY tablename",
                &[],
            )
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let row = self
            .client
            .query_one(
                format!("SELECT COUNT(*) FROM {}", quote_ident(table)).as_str(),
                &[],
            )
            .await
            .map_err(|e| anyhow!(describe_db_error(&e)))?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl StatementExecutor for PgDestination {
    async fn begin(&self) -> Result<()> {
        self.run("BEGIN").await
    }

    async fn execute_statement(&self, sql: &str) -> Result<()> {
        self.in_savepoint("restore_stmt", self.client.batch_execute(sql))
            .await
    }

    async fn commit(&self) -> Result<()> {
        self.run("COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        self.run("ROLLBACK").await
    }
}
