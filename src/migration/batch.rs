// ABOUTME: Batched multi-row inserts with per-row fallback on failure
// ABOUTME: Trades throughput for resilience: bad rows are skipped, not fatal

use super::coerce::CoercedRow;
use super::schema::ColumnDescriptor;
use super::store::Destination;
use crate::utils::quote_ident;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 500;

/// PostgreSQL accepts at most this many bind parameters per statement
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Target table and columns for a load
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl InsertPlan {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    /// Rows that fit in one statement without exceeding the parameter limit
    pub fn max_rows_per_statement(&self) -> usize {
        (MAX_BIND_PARAMETERS / self.columns.len().max(1)).max(1)
    }

    /// Multi-row INSERT for `rows` rows
    ///
    /// Every value is bound as text and cast to the column type, so arrays,
    /// enums, JSON and timestamps all travel through the same parameter type.
    pub fn render_insert(&self, rows: usize) -> String {
        let column_list: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let casts: Vec<String> = self.columns.iter().map(|c| c.type_sql()).collect();

        let width = self.columns.len();
        let mut tuples = Vec::with_capacity(rows);
        for row in 0..rows {
            let placeholders: Vec<String> = casts
                .iter()
                .enumerate()
                .map(|(col, cast)| format!("${}::text::{}", row * width + col + 1, cast))
                .collect();
            tuples.push(format!("({})", placeholders.join(", ")));
        }

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(&self.table),
            column_list.join(", "),
            tuples.join(", ")
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Insert `rows` in batches, degrading to row-by-row inserts when a batch fails
///
/// Never fails: rows that cannot be inserted even on their own are logged and
/// counted in `skipped`.
pub async fn insert_with_fallback<D>(
    dest: &D,
    plan: &InsertPlan,
    rows: &[CoercedRow],
    batch_size: usize,
    progress_interval: usize,
) -> BatchStats
where
    D: Destination + ?Sized,
{
    let batch_size = batch_size.max(1).min(plan.max_rows_per_statement());
    let mut stats = BatchStats {
        total: rows.len(),
        ..Default::default()
    };

    for (batch_num, batch) in rows.chunks(batch_size).enumerate() {
        stats.batches += 1;

        match dest.insert_batch(plan, batch).await {
            Ok(()) => {
                stats.inserted += batch.len();
                if progress_interval > 0
                    && (stats.inserted % progress_interval == 0 || stats.inserted == stats.total)
                {
                    tracing::info!(
                        "    Progress: {}/{} rows copied...",
                        stats.inserted,
                        stats.total
                    );
                }
            }
            Err(e) => {
                stats.failed_batches += 1;
                tracing::warn!(
                    "    ⚠ Error copying batch {} ({} rows) into '{}': {:#}",
                    batch_num,
                    batch.len(),
                    plan.table,
                    e
                );

                for row in batch {
                    match dest.insert_row(plan, row).await {
                        Ok(()) => stats.inserted += 1,
                        Err(row_err) => {
                            stats.skipped += 1;
                            tracing::warn!("    ⚠ Skipped row due to error: {:#}", row_err);
                        }
                    }
                }
            }
        }
    }

    stats
}
