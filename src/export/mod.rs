//! Index database export: connector tables to the unified record list.
//!
//! Every connector table holds a tree of entries. Files are flattened into
//! [`FileRecord`]s with their full path rebuilt from the parent chain; folders
//! are dropped. Entries that cannot be resolved are skipped and logged, so one
//! broken row never costs the rest of the table.

#![allow(missing_docs)]

pub mod connector;

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::Connection;

use crate::core::config::ExportConfig;
use crate::core::errors::{Result, StaleRankError};
use crate::dataset;
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use crate::scorer::record::FileRecord;

pub use connector::{
    ConnectorEntry, ConnectorTable, EntryMetadata, FsSizeSource, SizeSource, TableExport,
    open_index, parse_doc_updated_at,
};

/// File name of the merged record list inside the output directory.
pub const MERGED_FILE_NAME: &str = "items.json";

/// Load all rows of one connector table.
pub fn read_connector_table(conn: &Connection, table: &str) -> Result<ConnectorTable> {
    ConnectorTable::read(conn, table)
}

/// Read and flatten one connector table.
pub fn export_table(conn: &Connection, table: &str, sizes: &dyn SizeSource) -> Result<TableExport> {
    Ok(read_connector_table(conn, table)?.export(sizes))
}

/// Per-table counters of an export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: String,
    pub exported: usize,
    pub skipped: usize,
    pub folders: usize,
    pub output: Option<PathBuf>,
}

/// Result of [`export_all`].
#[derive(Debug)]
pub struct ExportSummary {
    pub tables: Vec<TableSummary>,
    /// Merged records, ascending by `last_modified`.
    pub records: Vec<FileRecord>,
    pub merged_path: PathBuf,
}

impl ExportSummary {
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.tables.iter().map(|t| t.skipped).sum()
    }
}

/// Export every configured table and write the merged `items.json`.
pub fn export_all(
    config: &ExportConfig,
    sizes: &dyn SizeSource,
    log: &mut JsonlWriter,
) -> Result<ExportSummary> {
    if config.connector_tables.is_empty() {
        return Err(StaleRankError::InvalidConfig {
            details: "no connector tables configured (export.connector_tables or --table)"
                .to_string(),
        });
    }
    let started = Instant::now();
    let conn = open_index(&config.db_path)?;

    let mut tables = Vec::with_capacity(config.connector_tables.len());
    let mut records = Vec::new();
    for table in &config.connector_tables {
        let export = export_table(&conn, table, sizes)?;
        for err in &export.skipped {
            log.write_entry(&LogEntry::from_error(err, Severity::Warning).with_command("export"));
        }

        let output = if config.write_per_table {
            let path = config.output_dir.join(format!("{table}.json"));
            dataset::write_records(&path, &export.records)?;
            Some(path)
        } else {
            None
        };

        let mut entry =
            LogEntry::new(EventType::ExportTable, Severity::Info).with_command("export");
        entry.table = Some(table.clone());
        entry.records_out = Some(export.records.len());
        entry.rejected = Some(export.skipped.len());
        entry.path = output.as_deref().map(|p| p.display().to_string());
        log.write_entry(&entry);

        tables.push(TableSummary {
            table: export.table,
            exported: export.records.len(),
            skipped: export.skipped.len(),
            folders: export.folders,
            output,
        });
        records.extend(export.records);
    }

    records.sort_by_key(FileRecord::last_modified);
    let merged_path = merged_path(&config.output_dir);
    dataset::write_records(&merged_path, &records)?;

    let summary = ExportSummary {
        tables,
        records,
        merged_path,
    };
    let mut entry = LogEntry::new(EventType::ExportComplete, Severity::Info).with_command("export");
    entry.records_out = Some(summary.records.len());
    entry.rejected = Some(summary.skipped());
    entry.path = Some(summary.merged_path.display().to_string());
    entry.duration_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
    entry.ok = Some(true);
    log.write_entry(&entry);

    Ok(summary)
}

fn merged_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MERGED_FILE_NAME)
}
