//! Loading of the daily snapshot files written by the collector.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::observation::RawRecord;

/// A `<YYYY-MM-DD>.csv` (or `.csv.gz`) file of station rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DailyFile {
    pub date: NaiveDate,
    pub path: PathBuf,
}

impl DailyFile {
    pub fn is_gzip(&self) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some("gz")
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Returns the collection date encoded in a daily file name.
///
/// Station information files (`stations-<date>.csv`) and anything else that
/// is not exactly `<date>.csv` or `<date>.csv.gz` yield `None`.
pub fn daily_file_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .strip_suffix(".csv.gz")
        .or_else(|| file_name.strip_suffix(".csv"))?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// Lists the daily files in `dir`, sorted by date.
pub fn list_daily_files(dir: &Path) -> Result<Vec<DailyFile>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        match daily_file_date(name) {
            Some(date) => files.push(DailyFile {
                date,
                path: entry.path(),
            }),
            None => debug!(file = name, "Skipping non-daily file"),
        }
    }

    files.sort();
    Ok(files)
}

/// Reads every row of a single daily file.
pub fn read_daily_file(file: &DailyFile) -> Result<Vec<RawRecord>> {
    let handle =
        File::open(&file.path).with_context(|| format!("opening {}", file.path.display()))?;
    let reader: Box<dyn Read> = if file.is_gzip() {
        Box::new(GzDecoder::new(handle))
    } else {
        Box::new(handle)
    };

    // Short rows deserialize with empty columns and are charged to their
    // station later; only unreadable rows are dropped here.
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawRecord>() {
        match result {
            Ok(record) => rows.push(record),
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("reading {}", file.path.display()));
            }
            Err(e) => warn!(file = %file.file_name(), error = %e, "Skipping unreadable row"),
        }
    }

    Ok(rows)
}

/// Reads and concatenates all daily files in `dir`.
#[tracing::instrument(skip(dir), fields(dir = %dir.display()))]
pub fn load_records(dir: &Path) -> Result<Vec<RawRecord>> {
    let files = list_daily_files(dir)?;
    let mut records = Vec::new();

    for file in &files {
        let rows = read_daily_file(file)?;
        debug!(file = %file.file_name(), rows = rows.len(), "Daily file loaded");
        records.extend(rows);
    }

    info!(files = files.len(), rows = records.len(), "Recorded data loaded");
    Ok(records)
}
