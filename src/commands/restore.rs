// ABOUTME: `restore` command: replay a SQL dump file into the target database
// ABOUTME: Missing file and connection failures abort; statement failures are counted

use crate::config::MirrorConfig;
use crate::dump::{restore_dump_file, RestoreOptions};
use crate::postgres::{connect, PgDestination};
use crate::utils::{redact_url, validate_connection_string};
use anyhow::{Context, Result};

pub async fn restore(config: &MirrorConfig, repair_literals: bool) -> Result<()> {
    let target_url = config.require_target_url()?;
    let backup_path = config.require_backup_path()?;
    validate_connection_string(target_url).context("Invalid target connection string")?;

    tracing::info!("Starting database restore...");
    tracing::info!("Connecting to {}...", redact_url(target_url));
    let dest = PgDestination::new(
        connect(target_url)
            .await
            .context("Failed to connect to target database")?,
    );
    tracing::info!("✓ Connected to target");

    if repair_literals {
        tracing::info!("Literal repair enabled: bare timestamps and objects will be quoted");
    }
    let options = RestoreOptions {
        repair_literals,
        ..Default::default()
    };
    let report = restore_dump_file(&dest, backup_path, &options).await?;
    drop(dest);

    if report.repaired > 0 {
        tracing::info!("  Repaired literals in {} statement(s)", report.repaired);
    }
    if report.transaction_control > 0 {
        tracing::info!(
            "  {} transaction control statement(s) from the dump were skipped",
            report.transaction_control
        );
    }
    if report.missing_on_drop > 0 {
        tracing::info!(
            "  {} drop(s) of objects that did not exist were ignored",
            report.missing_on_drop
        );
    }
    if !report.committed {
        tracing::warn!("⚠ Restore transaction was not committed; target is unchanged");
    }
    Ok(())
}
