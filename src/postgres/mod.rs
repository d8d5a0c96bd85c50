// ABOUTME: PostgreSQL side of the mirror: connections, catalog reads, and writes
// ABOUTME: Implements the source/destination seams over tokio-postgres

pub mod catalog;
pub mod connection;
pub mod writer;

pub use catalog::PgSource;
pub use connection::connect;
pub use writer::PgDestination;
