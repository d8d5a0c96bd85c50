// ABOUTME: Source and destination seams for the mirror copy pipeline
// ABOUTME: Implemented by PostgreSQL clients, typed archives, and test doubles

use super::batch::InsertPlan;
use super::coerce::{CoercedRow, RawRow};
use super::schema::{ColumnDescriptor, EnumType, SequenceState, TableDefinition};
use anyhow::Result;
use async_trait::async_trait;

/// Read side of a copy: catalog metadata plus table contents
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Enum types with labels in sort order
    async fn list_enums(&self) -> Result<Vec<EnumType>>;

    /// Base tables, ordered by name
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of `table` in ordinal order
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// All rows of `table`, one value per entry of `columns`
    async fn fetch_rows(&self, table: &str, columns: &[ColumnDescriptor]) -> Result<Vec<RawRow>>;

    async fn list_sequences(&self) -> Result<Vec<SequenceState>>;

    async fn count_rows(&self, table: &str) -> Result<i64>;
}

/// Write side of a copy
///
/// Loads run between `begin_load` and `finish_load`/`abort_load`.
/// `insert_batch` and `insert_row` must each be atomic so a failed batch can
/// be retried row by row.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn type_exists(&self, name: &str) -> Result<bool>;

    async fn create_enum(&self, enum_type: &EnumType) -> Result<()>;

    /// Drop (cascading) and recreate `table`
    async fn recreate_table(&self, table: &TableDefinition) -> Result<()>;

    async fn begin_load(&self, table: &str) -> Result<()>;

    async fn insert_batch(&self, plan: &InsertPlan, rows: &[CoercedRow]) -> Result<()>;

    async fn insert_row(&self, plan: &InsertPlan, row: &CoercedRow) -> Result<()>;

    async fn finish_load(&self, table: &str) -> Result<()>;

    async fn abort_load(&self, table: &str) -> Result<()>;

    async fn set_sequence(&self, sequence: &SequenceState) -> Result<()>;

    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn count_rows(&self, table: &str) -> Result<i64>;
}
