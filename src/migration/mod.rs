// ABOUTME: Mirror copy module
// ABOUTME: Schema model, value coercion, batched inserts, and the copy pipeline

pub mod batch;
pub mod coerce;
pub mod copier;
pub mod schema;
pub mod store;

pub use batch::{insert_with_fallback, BatchStats, InsertPlan};
pub use coerce::{coerce_row, coerce_value, CoercedRow, CoercedValue, RawRow};
pub use copier::{
    copy_database, verify_counts, CopyOptions, CopyReport, TableCopyReport, VerificationEntry,
};
pub use schema::{ColumnDescriptor, ColumnKind, EnumType, SequenceState, TableDefinition};
pub use store::{Destination, SourceCatalog};
