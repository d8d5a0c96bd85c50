// ABOUTME: Mirror copy pipeline: enums, tables, rows, sequences, verification
// ABOUTME: Works against any SourceCatalog/Destination pair and reports per-table results

use super::batch::{
    insert_with_fallback, BatchStats, InsertPlan, DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL,
};
use super::coerce::{coerce_row, CoercedRow};
use super::schema::TableDefinition;
use super::store::{Destination, SourceCatalog};
use anyhow::{Context, Result};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    pub batch_size: usize,
    pub progress_interval: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCopyReport {
    pub table: String,
    pub rows_read: usize,
    pub stats: BatchStats,
    /// Set when the table could not be recreated or loaded
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEntry {
    pub table: String,
    pub target_rows: i64,
    /// None when the table is absent from the source or could not be counted
    pub source_rows: Option<i64>,
}

impl VerificationEntry {
    pub fn matches(&self) -> bool {
        self.source_rows == Some(self.target_rows)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyReport {
    pub enums_created: Vec<String>,
    pub enums_existing: Vec<String>,
    pub enum_failures: Vec<String>,
    pub tables: Vec<TableCopyReport>,
    pub sequences_set: usize,
    pub sequence_failures: Vec<String>,
    pub verification: Vec<VerificationEntry>,
}

impl CopyReport {
    pub fn rows_inserted(&self) -> usize {
        self.tables.iter().map(|t| t.stats.inserted).sum()
    }

    pub fn rows_skipped(&self) -> usize {
        self.tables.iter().map(|t| t.stats.skipped).sum()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.error.is_some())
            .map(|t| t.table.as_str())
            .collect()
    }

    pub fn table(&self, name: &str) -> Option<&TableCopyReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn is_verified(&self) -> bool {
        self.verification.iter().all(VerificationEntry::matches)
    }
}

/// Replicate schema and data from `source` into `dest`
///
/// Only a failure to list the source tables aborts the run. Everything else
/// (enum creation, a single table, a sequence, a count) is logged and recorded
/// in the report, leaving a partial mirror behind.
pub async fn copy_database<S, D>(source: &S, dest: &D, options: &CopyOptions) -> Result<CopyReport>
where
    S: SourceCatalog + ?Sized,
    D: Destination + ?Sized,
{
    let mut report = CopyReport::default();

    tracing::info!("Step 1/4: Copying enum types...");
    let enum_names = copy_enums(source, dest, &mut report).await;

    tracing::info!("Step 2/4: Copying tables...");
    let tables = source
        .list_tables()
        .await
        .context("Failed to list source tables")?;
    tracing::info!("Found {} table(s) to copy", tables.len());

    for table in &tables {
        tracing::info!("Processing table: {}", table);
        let mut table_report = TableCopyReport {
            table: table.clone(),
            ..Default::default()
        };

        if let Err(e) = copy_table(
            source,
            dest,
            table,
            &enum_names,
            options,
            &mut table_report,
        )
        .await
        {
            tracing::error!("  ❌ Error processing table '{}': {:#}", table, e);
            if let Err(abort_err) = dest.abort_load(table).await {
                tracing::debug!("  Rollback after failure on '{}' failed: {:#}", table, abort_err);
            }
            table_report.error = Some(format!("{:#}", e));
        }

        report.tables.push(table_report);
    }

    tracing::info!("Step 3/4: Copying sequences...");
    copy_sequences(source, dest, &mut report).await;

    tracing::info!("Step 4/4: Verifying row counts...");
    report.verification = verify_counts(source, dest).await;

    tracing::info!(
        "✓ Copy complete: {} table(s), {} row(s) inserted, {} skipped",
        report.tables.len(),
        report.rows_inserted(),
        report.rows_skipped()
    );

    Ok(report)
}

async fn copy_enums<S, D>(source: &S, dest: &D, report: &mut CopyReport) -> BTreeSet<String>
where
    S: SourceCatalog + ?Sized,
    D: Destination + ?Sized,
{
    let enums = match source.list_enums().await {
        Ok(enums) => enums,
        Err(e) => {
            tracing::warn!("⚠ Could not list enum types: {:#}", e);
            return BTreeSet::new();
        }
    };

    let mut names = BTreeSet::new();
    for enum_type in &enums {
        names.insert(enum_type.name.clone());

        match dest.type_exists(&enum_type.name).await {
            Ok(true) => {
                tracing::info!("  Enum {} already exists", enum_type.name);
                report.enums_existing.push(enum_type.name.clone());
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("  ⚠ Could not check enum {}: {:#}", enum_type.name, e);
            }
        }

        match dest.create_enum(enum_type).await {
            Ok(()) => {
                tracing::info!("  ✓ Created enum {}", enum_type.name);
                report.enums_created.push(enum_type.name.clone());
            }
            Err(e) => {
                tracing::warn!("  ⚠ Enum {}: {:#}", enum_type.name, e);
                report.enum_failures.push(enum_type.name.clone());
            }
        }
    }

    names
}

async fn copy_table<S, D>(
    source: &S,
    dest: &D,
    table: &str,
    enum_names: &BTreeSet<String>,
    options: &CopyOptions,
    report: &mut TableCopyReport,
) -> Result<()>
where
    S: SourceCatalog + ?Sized,
    D: Destination + ?Sized,
{
    let columns = source
        .table_columns(table)
        .await
        .with_context(|| format!("Failed to read columns of '{}'", table))?;

    if columns.is_empty() {
        tracing::warn!("  ⚠ Table '{}' has no columns, skipping", table);
        return Ok(());
    }

    let definition = TableDefinition::new(table, columns.clone()).with_enum_defaults(enum_names);
    dest.recreate_table(&definition)
        .await
        .with_context(|| format!("Failed to recreate table '{}'", table))?;
    tracing::info!("  ✓ Table structure created");

    let rows = source
        .fetch_rows(table, &columns)
        .await
        .with_context(|| format!("Failed to read rows of '{}'", table))?;
    report.rows_read = rows.len();

    if rows.is_empty() {
        tracing::info!("  No data to copy");
        return Ok(());
    }
    tracing::info!("  Copying {} rows...", rows.len());

    let coerced: Vec<CoercedRow> = rows.iter().map(|row| coerce_row(row, &columns)).collect();
    let plan = InsertPlan::new(table, columns);

    dest.begin_load(table).await?;
    report.stats = insert_with_fallback(
        dest,
        &plan,
        &coerced,
        options.batch_size,
        options.progress_interval,
    )
    .await;
    dest.finish_load(table)
        .await
        .with_context(|| format!("Failed to commit rows of '{}'", table))?;

    if report.stats.skipped > 0 {
        tracing::warn!(
            "  ⚠ Copied {} rows, skipped {}",
            report.stats.inserted,
            report.stats.skipped
        );
    } else {
        tracing::info!("  ✓ Copied {} rows", report.stats.inserted);
    }

    Ok(())
}

async fn copy_sequences<S, D>(source: &S, dest: &D, report: &mut CopyReport)
where
    S: SourceCatalog + ?Sized,
    D: Destination + ?Sized,
{
    let sequences = match source.list_sequences().await {
        Ok(sequences) => sequences,
        Err(e) => {
            tracing::warn!("⚠ Could not list sequences: {:#}", e);
            return;
        }
    };

    for sequence in &sequences {
        match dest.set_sequence(sequence).await {
            Ok(()) => {
                tracing::debug!(
                    "  Sequence {} set to {} (is_called={})",
                    sequence.name,
                    sequence.last_value,
                    sequence.is_called
                );
                report.sequences_set += 1;
            }
            Err(e) => {
                tracing::warn!("  ⚠ Sequence {}: {:#}", sequence.name, e);
                report.sequence_failures.push(sequence.name.clone());
            }
        }
    }

    tracing::info!("  ✓ {} sequence(s) updated", report.sequences_set);
}

/// Count rows in every destination table and compare against the source
pub async fn verify_counts<S, D>(source: &S, dest: &D) -> Vec<VerificationEntry>
where
    S: SourceCatalog + ?Sized,
    D: Destination + ?Sized,
{
    let tables = match dest.list_tables().await {
        Ok(tables) => tables,
        Err(e) => {
            tracing::warn!("⚠ Could not list destination tables: {:#}", e);
            return Vec::new();
        }
    };

    let mut entries = Vec::with_capacity(tables.len());
    for table in tables {
        let target_rows = match dest.count_rows(&table).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("  ⚠ {}: could not count rows: {:#}", table, e);
                continue;
            }
        };
        let source_rows = source.count_rows(&table).await.ok();

        let entry = VerificationEntry {
            table,
            target_rows,
            source_rows,
        };
        match entry.source_rows {
            Some(source_rows) if entry.matches() => {
                tracing::info!("  ✓ {}: {}/{} rows", entry.table, entry.target_rows, source_rows)
            }
            Some(source_rows) => tracing::warn!(
                "  ⚠ {}: {}/{} rows",
                entry.table,
                entry.target_rows,
                source_rows
            ),
            None => tracing::info!("  {}: {} rows (not in source)", entry.table, entry.target_rows),
        }
        entries.push(entry);
    }

    entries
}
