// ABOUTME: End-to-end tests of the mirror copy pipeline over in-memory stores
// ABOUTME: Covers enum creation, batching, row fallback, coercion, sequences and verification

mod common;

use common::{MemoryDestination, MemorySource};
use postgres_mirror::migration::{
    copy_database, ColumnDescriptor, ColumnKind, CoercedValue, CopyOptions,
};
use serde_json::json;

fn user_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "int4")
            .with_sql_type("integer")
            .not_null()
            .with_default("nextval('users_id_seq'::regclass)"),
        ColumnDescriptor::new("name", "text"),
        ColumnDescriptor::new("role", "Role")
            .with_sql_type("\"Role\"")
            .with_kind(ColumnKind::Enum)
            .with_default("'USER'::Role"),
    ]
}

fn users(count: usize) -> Vec<Vec<serde_json::Value>> {
    (1..=count)
        .map(|i| vec![json!(i), json!(format!("user{}", i)), json!("USER")])
        .collect()
}

#[tokio::test]
async fn test_copies_enum_table_and_rows_in_batches() {
    let source = MemorySource::default()
        .with_enum("Role", &["ADMIN", "USER"])
        .with_table("users", user_columns(), users(250))
        .with_sequence("users_id_seq", 250, true);
    let dest = MemoryDestination::default();

    let report = copy_database(&source, &dest, &CopyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.enums_created, vec!["Role"]);
    assert_eq!(report.rows_inserted(), 250);
    assert_eq!(report.rows_skipped(), 0);
    assert_eq!(report.sequences_set, 1);
    assert!(report.failed_tables().is_empty());

    assert_eq!(report.verification.len(), 1);
    assert_eq!(report.verification[0].table, "users");
    assert_eq!(report.verification[0].target_rows, 250);
    assert_eq!(report.verification[0].source_rows, Some(250));
    assert!(report.is_verified());

    let state = dest.state.lock().unwrap();
    assert_eq!(state.created_enums[0].labels, vec!["ADMIN", "USER"]);
    assert_eq!(state.batch_sizes, vec![100, 100, 50]);
    assert_eq!(state.row_inserts, 0);
    assert_eq!(state.rows["users"].len(), 250);
    assert_eq!(state.sequences[0].last_value, 250);

    // Enum defaults are rewritten before the table is created
    let definition = &state.definitions["users"];
    assert_eq!(
        definition.columns[2].default.as_deref(),
        Some("'USER'::\"Role\"")
    );
}

#[tokio::test]
async fn test_failed_batch_falls_back_to_single_rows() {
    let mut rows = users(5);
    rows[2][1] = json!("reject-me");
    let source = MemorySource::default().with_table("users", user_columns(), rows);
    let dest = MemoryDestination::rejecting("reject-me");

    let report = copy_database(&source, &dest, &CopyOptions::default())
        .await
        .unwrap();

    let table = report.table("users").unwrap();
    assert_eq!(table.rows_read, 5);
    assert_eq!(table.stats.inserted, 4);
    assert_eq!(table.stats.skipped, 1);
    assert_eq!(table.stats.failed_batches, 1);
    assert!(table.error.is_none());

    let state = dest.state.lock().unwrap();
    assert!(state.batch_sizes.is_empty());
    assert_eq!(state.row_inserts, 4);
    assert_eq!(state.rows["users"].len(), 4);

    // Verification reports the shortfall rather than failing
    assert!(!report.is_verified());
    assert_eq!(report.verification[0].target_rows, 4);
    assert_eq!(report.verification[0].source_rows, Some(5));
}

#[tokio::test]
async fn test_only_the_failing_batch_degrades() {
    let mut rows = users(7);
    rows[6][1] = json!("reject-me");
    let source = MemorySource::default().with_table("users", user_columns(), rows);
    let dest = MemoryDestination::rejecting("reject-me");

    let options = CopyOptions {
        batch_size: 3,
        progress_interval: 0,
    };
    let report = copy_database(&source, &dest, &options).await.unwrap();

    let stats = report.table("users").unwrap().stats;
    assert_eq!(stats.batches, 3);
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(stats.inserted, 6);
    assert_eq!(stats.skipped, 1);

    let state = dest.state.lock().unwrap();
    assert_eq!(state.batch_sizes, vec![3, 3]);
}

#[tokio::test]
async fn test_existing_enum_is_not_recreated() {
    let source = MemorySource::default()
        .with_enum("Role", &["ADMIN", "USER"])
        .with_table("users", user_columns(), users(1));
    let dest = MemoryDestination::default().with_existing_type("Role");

    let report = copy_database(&source, &dest, &CopyOptions::default())
        .await
        .unwrap();

    assert!(report.enums_created.is_empty());
    assert_eq!(report.enums_existing, vec!["Role"]);
    assert!(report.enum_failures.is_empty());
    assert!(dest.state.lock().unwrap().created_enums.is_empty());
}

#[tokio::test]
async fn test_table_failure_does_not_stop_the_run() {
    let source = MemorySource::default()
        .with_table("broken", user_columns(), users(3))
        .with_table("users", user_columns(), users(3));
    let mut dest = MemoryDestination::default();
    dest.broken_tables.insert("broken".to_string());

    let report = copy_database(&source, &dest, &CopyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.failed_tables(), vec!["broken"]);
    assert!(report
        .table("broken")
        .unwrap()
        .error
        .as_deref()
        .unwrap()
        .contains("Failed to recreate table 'broken'"));
    assert_eq!(report.table("users").unwrap().stats.inserted, 3);

    let state = dest.state.lock().unwrap();
    assert_eq!(state.aborted_loads, vec!["broken"]);
    assert_eq!(state.rows["users"].len(), 3);
}

#[tokio::test]
async fn test_empty_table_is_created_without_inserts() {
    let source = MemorySource::default().with_table("audit", user_columns(), vec![]);
    let dest = MemoryDestination::default();

    let report = copy_database(&source, &dest, &CopyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.table("audit").unwrap().stats.batches, 0);
    let state = dest.state.lock().unwrap();
    assert!(state.definitions.contains_key("audit"));
    assert!(state.batch_sizes.is_empty());
    assert!(report.is_verified());
}

#[tokio::test]
async fn test_values_are_coerced_by_column_kind() {
    let columns = vec![
        ColumnDescriptor::new("tags", "_text")
            .with_sql_type("text[]")
            .with_kind(ColumnKind::Array),
        ColumnDescriptor::new("meta", "jsonb").with_kind(ColumnKind::Json),
        ColumnDescriptor::new("note", "jsonb").with_kind(ColumnKind::Json),
        ColumnDescriptor::new("title", "text"),
    ];
    let rows = vec![vec![
        json!(["a", "b,c"]),
        json!({"k": 1}),
        json!("not json"),
        json!(null),
    ]];
    let source = MemorySource::default().with_table("posts", columns, rows);
    let dest = MemoryDestination::default();

    copy_database(&source, &dest, &CopyOptions::default())
        .await
        .unwrap();

    let state = dest.state.lock().unwrap();
    let row = &state.rows["posts"][0];
    assert_eq!(row[0], CoercedValue::ArrayLiteral("{a,b\\,c}".to_string()));
    assert_eq!(row[1].to_sql_text().as_deref(), Some("{\"k\":1}"));
    assert_eq!(row[2].to_sql_text().as_deref(), Some("\"not json\""));
    assert_eq!(row[3], CoercedValue::Null);
}
