//! JSON persistence for record batches and ranked results.
//!
//! Reading is split in two levels: the document itself must be a readable
//! JSON array (anything else aborts the run), while each element is validated
//! on its own so a malformed record can be skipped without losing the batch.

#![allow(missing_docs)]

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::core::errors::{Result, StaleRankError};
use crate::scorer::record::{FileRecord, ScoredItem};

/// `Serialization` context for documents that could not be read.
pub const INPUT_CONTEXT: &str = "input";
/// `Serialization` context for results that could not be encoded.
pub const OUTPUT_CONTEXT: &str = "output";

/// How to treat elements that fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Skip the element and report it in [`LoadedRecords::rejected`].
    Lenient,
    /// Fail the whole batch on the first bad element.
    Strict,
}

impl Strictness {
    #[must_use]
    pub const fn from_flag(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Lenient }
    }
}

/// Records that passed validation plus the per-element rejections.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<FileRecord>,
    pub rejected: Vec<StaleRankError>,
}

impl LoadedRecords {
    /// Elements seen in the source document.
    #[must_use]
    pub fn total(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

/// Read a JSON array of records from `path`.
pub fn load_records(path: &Path, strictness: Strictness) -> Result<LoadedRecords> {
    let file = File::open(path).map_err(|source| StaleRankError::io(path, source))?;
    let document: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| json_error(INPUT_CONTEXT, path, err))?;
    parse_records(document, strictness)
}

/// Validate every element of an already-parsed document.
pub fn parse_records(document: Value, strictness: Strictness) -> Result<LoadedRecords> {
    let Value::Array(elements) = document else {
        return Err(StaleRankError::Serialization {
            context: INPUT_CONTEXT,
            details: format!(
                "expected a JSON array of records, found {}",
                value_kind(&document)
            ),
        });
    };

    let mut loaded = LoadedRecords {
        records: Vec::with_capacity(elements.len()),
        rejected: Vec::new(),
    };
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<FileRecord>(element) {
            Ok(record) => loaded.records.push(record),
            Err(err) => {
                let rejection = StaleRankError::MalformedRecord {
                    index,
                    reason: err.to_string(),
                };
                if strictness == Strictness::Strict {
                    return Err(rejection);
                }
                loaded.rejected.push(rejection);
            }
        }
    }
    Ok(loaded)
}

/// Write ranked items as a JSON array of `{path, score}` objects.
///
/// With `explain`, each object also carries its `factors`.
pub fn write_ranked(path: &Path, items: &[ScoredItem], explain: bool) -> Result<()> {
    if explain {
        write_json_atomic(path, items)
    } else {
        let plain: Vec<ScoredItem> = items
            .iter()
            .cloned()
            .map(ScoredItem::without_factors)
            .collect();
        write_json_atomic(path, &plain)
    }
}

/// Write a record batch in the same shape [`load_records`] reads.
pub fn write_records(path: &Path, records: &[FileRecord]) -> Result<()> {
    write_json_atomic(path, records)
}

/// Serialize to a sibling temp file, then rename over the target.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StaleRankError::io(parent, source))?;
    }
    let tmp = temp_sibling(path);
    let file = File::create(&tmp).map_err(|source| StaleRankError::io(&tmp, source))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .map_err(|err| json_error(OUTPUT_CONTEXT, &tmp, err))?;
    writer
        .flush()
        .map_err(|source| StaleRankError::io(&tmp, source))?;
    drop(writer);
    fs::rename(&tmp, path).map_err(|source| StaleRankError::io(path, source))
}

/// Read/write failures surfacing through serde stay I/O errors.
fn json_error(context: &'static str, path: &Path, err: serde_json::Error) -> StaleRankError {
    if err.is_io() {
        StaleRankError::io(path, io::Error::from(err))
    } else {
        StaleRankError::Serialization {
            context,
            details: err.to_string(),
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
