//! CSV persistence for snapshots, regularized series and frames.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

use crate::frames::Frame;
use crate::location::Location;

/// Appends serialized records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist. Nothing is
/// written (and no file created) for an empty slice, so a later append still
/// starts with a header.
pub fn append_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes records to a fresh CSV file, replacing any existing one.
pub fn write_records<'a, T, I>(path: &Path, records: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);

    let mut count = 0;
    for record in records {
        writer.serialize(record)?;
        count += 1;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = count, "CSV written");
    Ok(count)
}

/// Writes station descriptions whose keys may differ from one station to
/// the next. The header is the sorted union of all keys; missing values are
/// left empty.
pub fn write_station_info(path: &Path, stations: &[BTreeMap<String, String>]) -> Result<()> {
    let headers: BTreeSet<&str> = stations
        .iter()
        .flat_map(|s| s.keys().map(String::as_str))
        .collect();

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);

    writer.write_record(&headers)?;
    for station in stations {
        writer.write_record(
            headers
                .iter()
                .map(|h| station.get(*h).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush()?;

    debug!(path = %path.display(), stations = stations.len(), "Station information written");
    Ok(())
}

/// Writes every station row of every frame.
pub fn write_frames(path: &Path, frames: &[Frame], location: &Location) -> Result<usize> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);

    let mut count = 0;
    for frame in frames {
        for row in frame.rows(location) {
            writer.serialize(row)?;
            count += 1;
        }
    }
    writer.flush()?;

    debug!(path = %path.display(), frames = frames.len(), rows = count, "Frames written");
    Ok(count)
}
