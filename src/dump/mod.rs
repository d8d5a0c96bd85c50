// ABOUTME: Plain SQL dump handling: statement splitting, literal repair and restore
// ABOUTME: Used by the restore command to replay text dumps against PostgreSQL

pub mod repair;
pub mod restore;
pub mod splitter;

pub use repair::repair_literals;
pub use restore::{
    is_transaction_control, read_dump, restore_dump_file, restore_statements, RestoreOptions,
    RestoreReport, StatementExecutor,
};
pub use splitter::{split_statements, StatementSplitter};
