// ABOUTME: Restores a plain SQL dump statement by statement
// ABOUTME: Tolerates idempotent drop failures and keeps going past broken statements

use super::repair::repair_literals;
use super::splitter::split_statements;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)CREATE\s+(?:UNLOGGED\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?((?:"[^"]+"|\w+)(?:\.(?:"[^"]+"|\w+))?)"#,
    )
    .unwrap()
});

/// Executes raw dump statements against a destination
///
/// `execute_statement` must be atomic: a failed statement leaves no partial
/// effects and does not poison the enclosing transaction.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn begin(&self) -> Result<()>;
    async fn execute_statement(&self, sql: &str) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Quote bare timestamps and objects before executing
    pub repair_literals: bool,
    /// Log progress every N statements
    pub progress_interval: usize,
    /// Only the first N failures are logged individually
    pub max_reported_errors: usize,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            repair_literals: false,
            progress_interval: 50,
            max_reported_errors: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub statements: usize,
    pub executed: usize,
    pub errors: usize,
    /// Drops of objects that were already gone, counted inside `executed`
    pub missing_on_drop: usize,
    /// `BEGIN`/`COMMIT`/`ROLLBACK` statements from the dump, skipped
    pub transaction_control: usize,
    pub repaired: usize,
    pub tables_created: Vec<String>,
    pub committed: bool,
}

/// Read a dump file from disk
///
/// A missing file is the one restore failure that aborts the run.
pub fn read_dump(path: &Path) -> Result<String> {
    if !path.exists() {
        bail!("Backup file '{}' not found", path.display());
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup file '{}'", path.display()))
}

/// Restore a dump file through `executor`
pub async fn restore_dump_file<E>(
    executor: &E,
    path: &Path,
    options: &RestoreOptions,
) -> Result<RestoreReport>
where
    E: StatementExecutor + ?Sized,
{
    tracing::info!("Restoring from backup: {}", path.display());
    let sql = read_dump(path)?;
    restore_statements(executor, &sql, options).await
}

/// Split `sql` into statements and execute them inside one transaction
///
/// Statement failures are logged and counted; only failing to open the
/// transaction is returned as an error.
pub async fn restore_statements<E>(
    executor: &E,
    sql: &str,
    options: &RestoreOptions,
) -> Result<RestoreReport>
where
    E: StatementExecutor + ?Sized,
{
    let statements = split_statements(sql);
    let total = statements.len();
    tracing::info!("Found {} SQL statements to execute", total);

    let mut report = RestoreReport {
        statements: total,
        ..Default::default()
    };

    executor
        .begin()
        .await
        .context("Failed to start restore transaction")?;

    for (idx, statement) in statements.into_iter().enumerate() {
        let number = idx + 1;
        let trimmed = statement.trim();
        if trimmed.is_empty() || trimmed == ";" {
            continue;
        }
        if is_transaction_control(trimmed) {
            tracing::debug!("Skipping transaction control statement {}: {}", number, trimmed);
            report.transaction_control += 1;
            continue;
        }

        let sql = if options.repair_literals {
            let fixed = repair_literals(&statement);
            if fixed != statement {
                tracing::debug!("Repaired literals in statement {}", number);
                report.repaired += 1;
            }
            fixed
        } else {
            statement
        };

        match executor.execute_statement(&sql).await {
            Ok(()) => {
                report.executed += 1;
                if let Some(table) = created_table_name(&sql) {
                    report.tables_created.push(table);
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if is_missing_object_on_drop(&sql, &message) {
                    report.executed += 1;
                    report.missing_on_drop += 1;
                } else {
                    if report.errors < options.max_reported_errors {
                        tracing::warn!(
                            "⚠ Warning on statement {}: {}",
                            number,
                            truncate_message(&message, 100)
                        );
                    }
                    report.errors += 1;
                }
            }
        }

        if options.progress_interval > 0 && number % options.progress_interval == 0 {
            tracing::info!("  Progress: {}/{} statements executed...", number, total);
        }
    }

    match executor.commit().await {
        Ok(()) => {
            report.committed = true;
            tracing::info!("✓ Restore completed");
            tracing::info!("  ✓ Executed: {} statements", report.executed);
            if report.errors > 0 {
                tracing::warn!(
                    "  ⚠ Errors: {} statements (some may be expected)",
                    report.errors
                );
            }
            if !report.tables_created.is_empty() {
                tracing::info!("  ✓ Tables created: {}", report.tables_created.len());
            }
        }
        Err(e) => {
            tracing::warn!("⚠ Commit warning: {:#}", e);
            if let Err(rollback_err) = executor.rollback().await {
                tracing::warn!("⚠ Rollback after failed commit also failed: {:#}", rollback_err);
            }
        }
    }

    Ok(report)
}

/// Name of the table a `CREATE TABLE` statement creates, if any
pub fn created_table_name(statement: &str) -> Option<String> {
    CREATE_TABLE
        .captures(statement)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a statement opens or ends a transaction
///
/// The restore runs inside its own transaction, and a dump's `COMMIT` would
/// end it early. `ROLLBACK TO SAVEPOINT` and prepared-transaction commands
/// are not matched.
pub fn is_transaction_control(statement: &str) -> bool {
    let upper = statement.trim().trim_end_matches(';').to_uppercase();
    let mut words = upper.split_whitespace();
    match words.next() {
        Some("BEGIN" | "END" | "ABORT") => true,
        Some("START") => words.next() == Some("TRANSACTION"),
        Some("COMMIT" | "ROLLBACK") => !matches!(words.next(), Some("TO" | "PREPARED")),
        _ => false,
    }
}

/// A "does not exist" failure on a DROP counts as success
pub fn is_missing_object_on_drop(statement: &str, error_message: &str) -> bool {
    error_message.to_lowercase().contains("does not exist")
        && statement.trim_start().to_uppercase().starts_with("DROP ")
}

fn truncate_message(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails any statement containing one of `failing` with the given message
    #[derive(Default)]
    struct ScriptedExecutor {
        failing: Vec<(&'static str, &'static str)>,
        executed: Mutex<Vec<String>>,
        commits: Mutex<usize>,
    }

    #[async_trait]
    impl StatementExecutor for ScriptedExecutor {
        async fn begin(&self) -> Result<()> {
            Ok(())
        }

        async fn execute_statement(&self, sql: &str) -> Result<()> {
            for (needle, message) in &self.failing {
                if sql.contains(needle) {
                    bail!("db error: ERROR: {}", message);
                }
            }
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        async fn commit(&self) -> Result<()> {
            *self.commits.lock().unwrap() += 1;
            Ok(())
        }

        async fn rollback(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_drop_of_missing_table_is_not_an_error() {
        let executor = ScriptedExecutor {
            failing: vec![("DROP TABLE", r#"table "missing_table" does not exist"#)],
            ..Default::default()
        };
        let dump = "DROP TABLE IF EXISTS missing_table;\n\
                    CREATE TABLE missing_table (id integer);\n";

        let report = restore_statements(&executor, dump, &RestoreOptions::default())
            .await
            .unwrap();

        assert_eq!(report.statements, 2);
        assert_eq!(report.errors, 0);
        assert_eq!(report.executed, 2);
        assert_eq!(report.missing_on_drop, 1);
        assert_eq!(report.tables_created, vec!["missing_table"]);
        assert!(report.committed);
        assert_eq!(
            *executor.executed.lock().unwrap(),
            vec!["CREATE TABLE missing_table (id integer);"]
        );
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_restore_continues() {
        let executor = ScriptedExecutor {
            failing: vec![("broken", "syntax error at or near \"broken\"")],
            ..Default::default()
        };
        let dump = "SELECT 1;\nSELECT broken;\nSELECT 2;\nINSERT INTO nothing VALUES (1) broken;\n";

        let report = restore_statements(&executor, dump, &RestoreOptions::default())
            .await
            .unwrap();

        assert_eq!(report.executed, 2);
        assert_eq!(report.errors, 2);
        assert_eq!(*executor.commits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_does_not_exist_outside_drop_is_an_error() {
        let executor = ScriptedExecutor {
            failing: vec![("INSERT", r#"relation "ghost" does not exist"#)],
            ..Default::default()
        };

        let report = restore_statements(
            &executor,
            "INSERT INTO ghost VALUES (1);",
            &RestoreOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(report.executed, 0);
    }

    #[tokio::test]
    async fn test_repair_is_applied_when_enabled() {
        let executor = ScriptedExecutor::default();
        let options = RestoreOptions {
            repair_literals: true,
            ..Default::default()
        };

        let report = restore_statements(
            &executor,
            "INSERT INTO events VALUES (1, 2024-03-01 09:00:00);",
            &options,
        )
        .await
        .unwrap();

        assert_eq!(report.repaired, 1);
        assert_eq!(
            *executor.executed.lock().unwrap(),
            vec!["INSERT INTO events VALUES (1, '2024-03-01 09:00:00');"]
        );
    }

    #[tokio::test]
    async fn test_transaction_control_in_dump_is_skipped() {
        let executor = ScriptedExecutor::default();
        let dump = "BEGIN;\n\
                    CREATE TABLE tx_first (id int);\n\
                    INSERT INTO tx_first VALUES (1);\n\
                    COMMIT;\n\
                    CREATE TABLE tx_after (id int);\n\
                    INSERT INTO tx_after VALUES (2);\n";

        let report = restore_statements(&executor, dump, &RestoreOptions::default())
            .await
            .unwrap();

        assert_eq!(report.statements, 6);
        assert_eq!(report.executed, 4);
        assert_eq!(report.errors, 0);
        assert_eq!(report.transaction_control, 2);
        assert_eq!(report.tables_created, vec!["tx_first", "tx_after"]);
        assert_eq!(*executor.commits.lock().unwrap(), 1);
    }

    #[test]
    fn test_transaction_control_detection() {
        for statement in [
            "BEGIN;",
            "begin transaction isolation level serializable;",
            "START TRANSACTION;",
            "COMMIT;",
            "commit work;",
            "END;",
            "ROLLBACK;",
            "ABORT;",
        ] {
            assert!(is_transaction_control(statement), "{}", statement);
        }
        for statement in [
            "ROLLBACK TO SAVEPOINT sp;",
            "COMMIT PREPARED 'tx1';",
            "SAVEPOINT sp;",
            "INSERT INTO commits VALUES (1);",
            "CREATE TABLE begin_log (id int);",
        ] {
            assert!(!is_transaction_control(statement), "{}", statement);
        }
    }

    #[test]
    fn test_read_dump_missing_file() {
        let err = read_dump(Path::new("/nonexistent/database_backup.sql")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_created_table_name_variants() {
        assert_eq!(
            created_table_name("CREATE TABLE users (id int);").as_deref(),
            Some("users")
        );
        assert_eq!(
            created_table_name("create table if not exists public.\"Account\" (id int);")
                .as_deref(),
            Some("public.\"Account\"")
        );
        assert_eq!(created_table_name("CREATE INDEX idx ON users (id);"), None);
    }

    #[test]
    fn test_missing_object_detection() {
        assert!(is_missing_object_on_drop(
            "DROP TYPE mood;",
            "ERROR: type \"mood\" does not exist"
        ));
        assert!(!is_missing_object_on_drop(
            "ALTER TABLE x ADD COLUMN y int;",
            "ERROR: relation \"x\" does not exist"
        ));
    }
}
