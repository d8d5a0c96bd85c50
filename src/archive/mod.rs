// ABOUTME: Typed JSON-lines archive of a mirrored schema and its rows
// ABOUTME: Export writes it atomically; import replays it through the copy pipeline

use crate::migration::{ColumnDescriptor, EnumType, RawRow, SequenceState, SourceCatalog};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub const ARCHIVE_VERSION: u32 = 1;

/// One line of an archive file
///
/// Column descriptors travel with the table record, so rows are decoded with
/// the same kinds the source catalog reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArchiveRecord {
    Header {
        version: u32,
        #[serde(default)]
        tool: String,
    },
    Enum(EnumType),
    Table {
        name: String,
        columns: Vec<ColumnDescriptor>,
    },
    Row {
        table: String,
        values: Vec<JsonValue>,
    },
    Sequence(SequenceState),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub enums: usize,
    pub tables: usize,
    pub rows: usize,
    pub sequences: usize,
}

/// Export everything `source` exposes into an archive at `path`
///
/// The file is written next to its final location and renamed into place, so
/// an interrupted export never leaves a truncated archive behind.
pub async fn write_archive<S>(source: &S, path: &Path) -> Result<ArchiveSummary>
where
    S: SourceCatalog + ?Sized,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp archive in {}", parent.display()))?;
    let mut writer = BufWriter::new(tmp);
    let mut summary = ArchiveSummary::default();

    write_record(
        &mut writer,
        &ArchiveRecord::Header {
            version: ARCHIVE_VERSION,
            tool: format!("postgres-mirror {}", env!("CARGO_PKG_VERSION")),
        },
    )?;

    for enum_type in source.list_enums().await? {
        write_record(&mut writer, &ArchiveRecord::Enum(enum_type))?;
        summary.enums += 1;
    }

    for table in source.list_tables().await? {
        let columns = source.table_columns(&table).await?;
        let rows = source.fetch_rows(&table, &columns).await?;
        tracing::info!("  Archiving {} ({} rows)", table, rows.len());

        write_record(
            &mut writer,
            &ArchiveRecord::Table {
                name: table.clone(),
                columns,
            },
        )?;
        for values in rows {
            write_record(
                &mut writer,
                &ArchiveRecord::Row {
                    table: table.clone(),
                    values,
                },
            )?;
            summary.rows += 1;
        }
        summary.tables += 1;
    }

    for sequence in source.list_sequences().await? {
        write_record(&mut writer, &ArchiveRecord::Sequence(sequence))?;
        summary.sequences += 1;
    }

    let tmp = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush archive")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to persist archive at {}", path.display()))?;

    tracing::info!(
        "✓ Archived {} table(s), {} row(s), {} enum(s), {} sequence(s) to {}",
        summary.tables,
        summary.rows,
        summary.enums,
        summary.sequences,
        path.display()
    );
    Ok(summary)
}

fn write_record<W: Write>(writer: &mut W, record: &ArchiveRecord) -> Result<()> {
    serde_json::to_writer(&mut *writer, record).context("Failed to serialize archive record")?;
    writer.write_all(b"\n").context("Failed to write archive")?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct ArchivedTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<RawRow>,
}

/// An archive loaded into memory, readable as a copy source
#[derive(Debug, Clone, Default)]
pub struct ArchiveSource {
    enums: Vec<EnumType>,
    tables: BTreeMap<String, ArchivedTable>,
    sequences: Vec<SequenceState>,
}

impl ArchiveSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Archive file '{}' not found", path.display());
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open archive '{}'", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid archive '{}'", path.display()))
    }

    /// Parse and validate archive lines
    ///
    /// The first record must be a header with a supported version. Rows must
    /// follow their table record and match its column count.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut archive = ArchiveSource::default();
        let mut saw_header = false;

        for (idx, line) in reader.lines().enumerate() {
            let number = idx + 1;
            let line = line.with_context(|| format!("Failed to read line {}", number))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ArchiveRecord = serde_json::from_str(&line)
                .with_context(|| format!("Malformed record on line {}", number))?;

            match record {
                ArchiveRecord::Header { version, .. } => {
                    if saw_header {
                        bail!("Duplicate header on line {}", number);
                    }
                    if version != ARCHIVE_VERSION {
                        bail!(
                            "Unsupported archive version {} (expected {})",
                            version,
                            ARCHIVE_VERSION
                        );
                    }
                    saw_header = true;
                }
                _ if !saw_header => bail!("Archive does not start with a header record"),
                ArchiveRecord::Enum(enum_type) => archive.enums.push(enum_type),
                ArchiveRecord::Table { name, columns } => {
                    archive.tables.insert(
                        name,
                        ArchivedTable {
                            columns,
                            rows: Vec::new(),
                        },
                    );
                }
                ArchiveRecord::Row { table, values } => {
                    let Some(entry) = archive.tables.get_mut(&table) else {
                        bail!("Row on line {} references undeclared table '{}'", number, table);
                    };
                    if values.len() != entry.columns.len() {
                        bail!(
                            "Row on line {} for '{}' has {} values, expected {}",
                            number,
                            table,
                            values.len(),
                            entry.columns.len()
                        );
                    }
                    entry.rows.push(values);
                }
                ArchiveRecord::Sequence(sequence) => archive.sequences.push(sequence),
            }
        }

        if !saw_header {
            bail!("Archive is empty");
        }
        Ok(archive)
    }

    fn table(&self, name: &str) -> Result<&ArchivedTable> {
        self.tables
            .get(name)
            .with_context(|| format!("Table '{}' is not in the archive", name))
    }
}

#[async_trait]
impl SourceCatalog for ArchiveSource {
    async fn list_enums(&self) -> Result<Vec<EnumType>> {
        Ok(self.enums.clone())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn fetch_rows(&self, table: &str, _columns: &[ColumnDescriptor]) -> Result<Vec<RawRow>> {
        Ok(self.table(table)?.rows.clone())
    }

    async fn list_sequences(&self) -> Result<Vec<SequenceState>> {
        Ok(self.sequences.clone())
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        Ok(self.table(table)?.rows.len() as i64)
    }
}
