//! Connector tables: one tree of index entries per source, linked by `parent_id`.

#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::DateTime;
use rusqlite::{Connection, OpenFlags, params};
use serde::Deserialize;

use crate::core::config::validate_table_name;
use crate::core::errors::{Result, StaleRankError};
use crate::scorer::record::FileRecord;

/// Separator used when rebuilding index paths.
pub const INDEX_SEPARATOR: char = '\\';

/// Optional JSON blob stored per entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EntryMetadata {
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub hide_from_search: bool,
}

/// One row of a connector table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorEntry {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub doc_updated_at: String,
    pub metadata: Option<EntryMetadata>,
}

impl ConnectorEntry {
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.metadata.is_some_and(|meta| meta.is_folder)
    }
}

/// Resolves the on-disk size of an exported path.
pub trait SizeSource {
    fn size_of(&self, path: &str) -> std::io::Result<u64>;
}

/// Sizes from filesystem metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSizeSource;

impl SizeSource for FsSizeSource {
    fn size_of(&self, path: &str) -> std::io::Result<u64> {
        fs::metadata(path).map(|meta| meta.len())
    }
}

impl<S: std::hash::BuildHasher> SizeSource for HashMap<String, u64, S> {
    fn size_of(&self, path: &str) -> std::io::Result<u64> {
        self.get(path).copied().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("no size for {path}"))
        })
    }
}

/// All rows of one table, keyed by id, in table order.
#[derive(Debug, Clone)]
pub struct ConnectorTable {
    name: String,
    entries: HashMap<String, ConnectorEntry>,
    order: Vec<String>,
    /// Rows whose metadata column could not be decoded, as `(id, reason)`.
    invalid: Vec<(String, String)>,
}

/// Outcome of exporting one table.
#[derive(Debug)]
pub struct TableExport {
    pub table: String,
    pub records: Vec<FileRecord>,
    /// Entries that could not be turned into records.
    pub skipped: Vec<StaleRankError>,
    pub folders: usize,
}

/// Open the index database read-only.
pub fn open_index(path: &Path) -> Result<Connection> {
    if !path.exists() {
        return Err(StaleRankError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "index database not found"),
        ));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

impl ConnectorTable {
    /// Load every row of `table`.
    pub fn read(conn: &Connection, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, parent_id, title, doc_updated_at, metadata FROM \"{table}\""
        ))?;
        let rows = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut loaded = Self {
            name: table.to_string(),
            entries: HashMap::with_capacity(rows.len()),
            order: Vec::with_capacity(rows.len()),
            invalid: Vec::new(),
        };
        for (id, parent_id, title, doc_updated_at, raw_metadata) in rows {
            let metadata = match raw_metadata.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => match serde_json::from_str::<EntryMetadata>(raw) {
                    Ok(meta) => Some(meta),
                    Err(err) => {
                        loaded.invalid.push((id, format!("bad metadata: {err}")));
                        continue;
                    }
                },
            };
            if !loaded.entries.contains_key(&id) {
                loaded.order.push(id.clone());
            }
            loaded.entries.insert(
                id.clone(),
                ConnectorEntry {
                    id,
                    parent_id,
                    title,
                    doc_updated_at,
                    metadata,
                },
            );
        }
        Ok(loaded)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in table order.
    pub fn entries(&self) -> impl Iterator<Item = &ConnectorEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Full path of `id`: titles from the root down, joined with `\`.
    ///
    /// The root title usually carries its own trailing separator (`C:\`),
    /// which is dropped before joining.
    pub fn reconstruct_path(&self, id: &str) -> Result<String> {
        let mut components: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cursor = Some(id);

        while let Some(current) = cursor {
            if !seen.insert(current) {
                return Err(self.entry_error(id, format!("parent cycle through {current}")));
            }
            let entry = self
                .entries
                .get(current)
                .ok_or_else(|| self.entry_error(id, format!("dangling parent id {current}")))?;
            components.push(&entry.title);
            cursor = entry.parent_id.as_deref();
        }

        if let Some(root) = components.last_mut() {
            if let Some(stripped) = root.strip_suffix(INDEX_SEPARATOR) {
                *root = stripped;
            }
        }
        components.reverse();
        Ok(components.join(&INDEX_SEPARATOR.to_string()))
    }

    /// Turn every non-folder entry into a [`FileRecord`].
    pub fn export(&self, sizes: &dyn SizeSource) -> TableExport {
        let mut out = TableExport {
            table: self.name.clone(),
            records: Vec::new(),
            skipped: self
                .invalid
                .iter()
                .map(|(id, reason)| self.entry_error(id, reason.clone()))
                .collect(),
            folders: 0,
        };

        for entry in self.entries() {
            if entry.is_folder() {
                out.folders += 1;
                continue;
            }
            match self.entry_record(entry, sizes) {
                Ok(record) => out.records.push(record),
                Err(err) => out.skipped.push(err),
            }
        }
        out
    }

    fn entry_record(&self, entry: &ConnectorEntry, sizes: &dyn SizeSource) -> Result<FileRecord> {
        let path = self.reconstruct_path(&entry.id)?;
        let size = sizes
            .size_of(&path)
            .map_err(|err| self.entry_error(&entry.id, format!("size of {path}: {err}")))?;
        let last_modified = parse_doc_updated_at(&entry.doc_updated_at)
            .map_err(|reason| self.entry_error(&entry.id, reason))?;
        FileRecord::new(entry.title.clone(), path, size, last_modified)
            .map_err(|err| self.entry_error(&entry.id, err.to_string()))
    }

    fn entry_error(&self, id: &str, reason: String) -> StaleRankError {
        StaleRankError::IndexEntry {
            table: self.name.clone(),
            id: id.to_string(),
            reason,
        }
    }
}

/// Parse `doc_updated_at` (`2022-12-21 08:33:51.318090200+00:00` or RFC 3339) to Unix seconds.
pub fn parse_doc_updated_at(raw: &str) -> std::result::Result<i64, String> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .map(|parsed| parsed.timestamp())
        .map_err(|err| format!("unparseable doc_updated_at {raw:?}: {err}"))
}
