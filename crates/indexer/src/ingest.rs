//! Loading primary records into the store.
//!
//! Input is JSON lines: one movie object per line. Each object is stored
//! unchanged at `<prefix><id>`. Lines that are not objects or lack an `id`
//! or `title` are skipped, the rest of the file still loads.

use crate::error::Result;
use crate::parser::{ID_FIELD, TITLE_FIELD};
use record_store::RecordStore;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Outcome of a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Load a JSON-lines file from disk.
pub fn load_json_lines_file<S: RecordStore + ?Sized>(
    store: &S,
    path: &Path,
    prefix: &str,
) -> Result<LoadReport> {
    let file = File::open(path)?;
    info!("Loading movie records from {:?}", path);
    load_json_lines(store, BufReader::new(file), prefix)
}

/// Load JSON-lines records from any reader.
///
/// Only I/O and store failures are errors.
pub fn load_json_lines<S: RecordStore + ?Sized, R: BufRead>(
    store: &S,
    reader: R,
    prefix: &str,
) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let Some(id) = record_id(&line) else {
            warn!("Skipping line {}: not a movie object with id and title", line_no);
            report.skipped += 1;
            continue;
        };

        store.put(&format!("{}{}", prefix, id), line.trim().as_bytes().to_vec())?;
        report.loaded += 1;
    }

    info!("Loaded {} records ({} skipped)", report.loaded, report.skipped);
    Ok(report)
}

/// The id of a well-formed record line; `None` if the line must be skipped.
fn record_id(line: &str) -> Option<String> {
    let Value::Object(fields) = serde_json::from_str::<Value>(line).ok()? else {
        return None;
    };
    match fields.get(TITLE_FIELD) {
        None | Some(Value::Null) => return None,
        Some(_) => {}
    }
    match fields.get(ID_FIELD)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(|i| i.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
