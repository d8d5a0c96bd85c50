// ABOUTME: `copy` command: mirror enums, tables, rows and sequences between two databases
// ABOUTME: Validates and confirms before touching the target

use crate::config::MirrorConfig;
use crate::interactive::confirm_destructive;
use crate::migration::{copy_database, CopyOptions, CopyReport};
use crate::postgres::{connect, PgDestination, PgSource};
use crate::utils::{
    redact_url, validate_connection_string, validate_postgres_identifier,
    validate_source_target_different,
};
use anyhow::{Context, Result};

pub async fn copy(config: &MirrorConfig, yes: bool) -> Result<()> {
    let source_url = config.require_source_url()?;
    let target_url = config.require_target_url()?;
    let schema = config.source_schema();

    validate_connection_string(source_url).context("Invalid source connection string")?;
    validate_connection_string(target_url).context("Invalid target connection string")?;
    validate_source_target_different(source_url, target_url)?;
    validate_postgres_identifier(schema).context("Invalid source schema")?;

    tracing::info!("Starting database copy...");
    tracing::info!("  Source: {} (schema {})", redact_url(source_url), schema);
    tracing::info!("  Target: {}", redact_url(target_url));

    if !confirm_destructive("recreate every mirrored table", &redact_url(target_url), yes)? {
        tracing::info!("Copy cancelled");
        return Ok(());
    }

    tracing::info!("Connecting to source database...");
    let source = PgSource::new(
        connect(source_url)
            .await
            .context("Failed to connect to source database")?,
        schema,
    );
    tracing::info!("✓ Connected to source");

    tracing::info!("Connecting to target database...");
    let dest = PgDestination::new(
        connect(target_url)
            .await
            .context("Failed to connect to target database")?,
    );
    tracing::info!("✓ Connected to target");

    let options = CopyOptions {
        batch_size: config.batch_size.unwrap_or(CopyOptions::default().batch_size),
        ..Default::default()
    };
    let report = copy_database(&source, &dest, &options).await?;

    drop(source);
    drop(dest);

    log_summary(&report);
    Ok(())
}

/// Final summary shared by `copy` and `import`
pub(crate) fn log_summary(report: &CopyReport) {
    tracing::info!("");
    tracing::info!("========================================");
    tracing::info!("Copy summary");
    tracing::info!("========================================");
    tracing::info!(
        "  Enums: {} created, {} already present",
        report.enums_created.len(),
        report.enums_existing.len()
    );
    tracing::info!(
        "  Rows: {} inserted, {} skipped",
        report.rows_inserted(),
        report.rows_skipped()
    );
    tracing::info!("  Sequences: {} updated", report.sequences_set);

    let failed = report.failed_tables();
    if !failed.is_empty() {
        tracing::warn!("⚠ Tables that failed: {}", failed.join(", "));
    }
    if !report.enum_failures.is_empty() {
        tracing::warn!("⚠ Enums that failed: {}", report.enum_failures.join(", "));
    }
    if !report.sequence_failures.is_empty() {
        tracing::warn!("⚠ Sequences that failed: {}", report.sequence_failures.join(", "));
    }
    if report.is_verified() {
        tracing::info!("✓ Row counts match for all {} table(s)", report.verification.len());
    } else {
        tracing::warn!("⚠ Row counts differ for some tables, see verification output above");
    }
}
