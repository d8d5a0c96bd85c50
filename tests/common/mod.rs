// ABOUTME: In-memory source and destination used by the pipeline integration tests
// ABOUTME: Records every batch so tests can assert on batching and fallback behaviour

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use postgres_mirror::dump::StatementExecutor;
use postgres_mirror::migration::{
    ColumnDescriptor, CoercedRow, Destination, EnumType, InsertPlan, RawRow, SequenceState,
    SourceCatalog, TableDefinition,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub enums: Vec<EnumType>,
    pub tables: BTreeMap<String, (Vec<ColumnDescriptor>, Vec<RawRow>)>,
    pub sequences: Vec<SequenceState>,
}

impl MemorySource {
    pub fn with_table(
        mut self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<RawRow>,
    ) -> Self {
        self.tables.insert(name.to_string(), (columns, rows));
        self
    }

    pub fn with_enum(mut self, name: &str, labels: &[&str]) -> Self {
        self.enums.push(EnumType {
            name: name.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        });
        self
    }

    pub fn with_sequence(mut self, name: &str, last_value: i64, is_called: bool) -> Self {
        self.sequences.push(SequenceState {
            name: name.to_string(),
            last_value,
            is_called,
        });
        self
    }

    fn table(&self, name: &str) -> Result<&(Vec<ColumnDescriptor>, Vec<RawRow>)> {
        match self.tables.get(name) {
            Some(table) => Ok(table),
            None => bail!("relation \"{}\" does not exist", name),
        }
    }
}

#[async_trait]
impl SourceCatalog for MemorySource {
    async fn list_enums(&self) -> Result<Vec<EnumType>> {
        Ok(self.enums.clone())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.table(table)?.0.clone())
    }

    async fn fetch_rows(&self, table: &str, _columns: &[ColumnDescriptor]) -> Result<Vec<RawRow>> {
        Ok(self.table(table)?.1.clone())
    }

    async fn list_sequences(&self) -> Result<Vec<SequenceState>> {
        Ok(self.sequences.clone())
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        Ok(self.table(table)?.1.len() as i64)
    }
}

#[derive(Debug, Default)]
pub struct DestinationState {
    pub types: BTreeSet<String>,
    pub created_enums: Vec<EnumType>,
    pub definitions: BTreeMap<String, TableDefinition>,
    pub rows: BTreeMap<String, Vec<CoercedRow>>,
    pending: Vec<CoercedRow>,
    /// Size of every successful multi-row insert
    pub batch_sizes: Vec<usize>,
    pub row_inserts: usize,
    pub aborted_loads: Vec<String>,
    pub sequences: Vec<SequenceState>,
}

/// Destination that keeps tables in memory
///
/// Any insert containing `reject_value` fails, and so does recreating a table
/// listed in `broken_tables`.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    pub state: Mutex<DestinationState>,
    pub reject_value: Option<String>,
    pub broken_tables: BTreeSet<String>,
}

impl MemoryDestination {
    pub fn rejecting(value: &str) -> Self {
        Self {
            reject_value: Some(value.to_string()),
            ..Default::default()
        }
    }

    pub fn with_existing_type(self, name: &str) -> Self {
        self.state.lock().unwrap().types.insert(name.to_string());
        self
    }

    fn check_rows(&self, rows: &[CoercedRow]) -> Result<()> {
        if let Some(reject) = &self.reject_value {
            let poisoned = rows
                .iter()
                .flatten()
                .any(|value| value.to_sql_text().as_deref() == Some(reject.as_str()));
            if poisoned {
                bail!("invalid input syntax: \"{}\"", reject);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn type_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().types.contains(name))
    }

    async fn create_enum(&self, enum_type: &EnumType) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.types.insert(enum_type.name.clone()) {
            bail!("type \"{}\" already exists", enum_type.name);
        }
        state.created_enums.push(enum_type.clone());
        Ok(())
    }

    async fn recreate_table(&self, table: &TableDefinition) -> Result<()> {
        if self.broken_tables.contains(&table.name) {
            bail!("syntax error at or near \"{}\"", table.name);
        }
        let mut state = self.state.lock().unwrap();
        state.definitions.insert(table.name.clone(), table.clone());
        state.rows.insert(table.name.clone(), Vec::new());
        Ok(())
    }

    async fn begin_load(&self, _table: &str) -> Result<()> {
        self.state.lock().unwrap().pending.clear();
        Ok(())
    }

    async fn insert_batch(&self, _plan: &InsertPlan, rows: &[CoercedRow]) -> Result<()> {
        self.check_rows(rows)?;
        let mut state = self.state.lock().unwrap();
        state.batch_sizes.push(rows.len());
        state.pending.extend(rows.iter().cloned());
        Ok(())
    }

    async fn insert_row(&self, _plan: &InsertPlan, row: &CoercedRow) -> Result<()> {
        self.check_rows(std::slice::from_ref(row))?;
        let mut state = self.state.lock().unwrap();
        state.row_inserts += 1;
        state.pending.push(row.clone());
        Ok(())
    }

    async fn finish_load(&self, table: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let pending = std::mem::take(&mut state.pending);
        state.rows.entry(table.to_string()).or_default().extend(pending);
        Ok(())
    }

    async fn abort_load(&self, table: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pending.clear();
        state.aborted_loads.push(table.to_string());
        Ok(())
    }

    async fn set_sequence(&self, sequence: &SequenceState) -> Result<()> {
        self.state.lock().unwrap().sequences.push(sequence.clone());
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().rows.keys().cloned().collect())
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.get(table).map_or(0, |rows| rows.len() as i64))
    }
}

/// Statement executor that records what ran and fails on request
///
/// A statement fails when it contains one of the `failures` keys; the error
/// message is the mapped value.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub failures: Vec<(String, String)>,
    pub executed: Mutex<Vec<String>>,
    pub commits: Mutex<usize>,
}

impl RecordingExecutor {
    pub fn failing_on(failures: &[(&str, &str)]) -> Self {
        Self {
            failures: failures
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    async fn execute_statement(&self, sql: &str) -> Result<()> {
        if let Some((_, message)) = self
            .failures
            .iter()
            .find(|(key, _)| sql.contains(key.as_str()))
        {
            bail!("ERROR: {}", message);
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
