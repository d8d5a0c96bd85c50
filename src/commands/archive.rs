// ABOUTME: `export` and `import` commands for the typed JSON-lines archive
// ABOUTME: Import reuses the copy pipeline with the archive as its source

use super::copy::log_summary;
use crate::archive::{write_archive, ArchiveSource};
use crate::config::MirrorConfig;
use crate::interactive::confirm_destructive;
use crate::migration::{copy_database, CopyOptions};
use crate::postgres::{connect, PgDestination, PgSource};
use crate::utils::{redact_url, validate_connection_string, validate_postgres_identifier};
use anyhow::{Context, Result};
use std::path::Path;

pub async fn export(config: &MirrorConfig, output: &Path) -> Result<()> {
    let source_url = config.require_source_url()?;
    let schema = config.source_schema();
    validate_connection_string(source_url).context("Invalid source connection string")?;
    validate_postgres_identifier(schema).context("Invalid source schema")?;

    tracing::info!("Exporting {} (schema {})...", redact_url(source_url), schema);
    let source = PgSource::new(
        connect(source_url)
            .await
            .context("Failed to connect to source database")?,
        schema,
    );

    write_archive(&source, output).await?;
    Ok(())
}

pub async fn import(config: &MirrorConfig, input: &Path, yes: bool) -> Result<()> {
    let target_url = config.require_target_url()?;
    validate_connection_string(target_url).context("Invalid target connection string")?;

    let archive = ArchiveSource::open(input)?;
    tracing::info!("✓ Loaded archive {}", input.display());

    if !confirm_destructive("recreate every archived table", &redact_url(target_url), yes)? {
        tracing::info!("Import cancelled");
        return Ok(());
    }

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
    let report = copy_database(&archive, &dest, &options).await?;
    drop(dest);

    log_summary(&report);
    Ok(())
}
