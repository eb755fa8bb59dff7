//! Dataset metadata describing the daily files for republication.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::loader::list_daily_files;

/// Name of the metadata document inside the data directory.
pub const METADATA_FILE: &str = "dataset-metadata.json";

/// `(name, description, type)` of each column of a daily file.
pub const SCHEMA_FIELDS: [(&str, &str, &str); 7] = [
    ("query_time", "Estimated time of when the data was queried", "datetime"),
    ("place_id", "A string identifier of the station", "string"),
    ("lat", "Latitude of the station", "number"),
    ("lon", "Longitude of the station", "number"),
    ("bikes", "Number of bikes at the station", "number"),
    ("empty_docks", "Number of empty docks at the station", "number"),
    ("docks", "Number of total docks at the station", "number"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaField {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub path: String,
    pub description: String,
    pub schema: Schema,
}

impl Resource {
    pub fn for_daily_file(file_name: &str, date: NaiveDate) -> Self {
        Resource {
            path: file_name.to_string(),
            description: format!("Station data for the {}", date.format("%B %d %Y")),
            schema: Schema {
                fields: SCHEMA_FIELDS
                    .iter()
                    .map(|(name, description, kind)| SchemaField {
                        name: name.to_string(),
                        description: description.to_string(),
                        kind: kind.to_string(),
                    })
                    .collect(),
            },
        }
    }
}

/// Outcome of [`build_metadata`].
#[derive(Debug)]
pub struct MetadataReport {
    pub metadata: Value,
    pub dates: Vec<NaiveDate>,
    /// Files still being collected, left out of the metadata.
    pub incomplete: Vec<PathBuf>,
}

impl MetadataReport {
    /// Version note for the dataset host, e.g. `Data from 2022-05-07 to 2022-05-14`.
    pub fn update_message(&self) -> Option<String> {
        let first = self.dates.iter().min()?;
        let last = self.dates.iter().max()?;
        Some(format!("Data from {first} to {last}"))
    }
}

/// Fills the `resources` of `template` with every completed daily file.
///
/// Files dated `today` or later are still being written; they are left out
/// and, with `remove_incomplete`, deleted so they are not republished.
/// Every other key of `template` is kept as is.
#[tracing::instrument(skip(template, data_dir), fields(data_dir = %data_dir.display()))]
pub fn build_metadata(
    template: Value,
    data_dir: &Path,
    today: NaiveDate,
    remove_incomplete: bool,
) -> Result<MetadataReport> {
    let Value::Object(mut metadata) = template else {
        bail!("dataset metadata template must be a JSON object");
    };

    let mut resources = Vec::new();
    let mut dates = Vec::new();
    let mut incomplete = Vec::new();

    for file in list_daily_files(data_dir)? {
        if file.date >= today {
            if remove_incomplete {
                warn!(file = %file.file_name(), "Removing incomplete daily file");
                fs::remove_file(&file.path)
                    .with_context(|| format!("removing {}", file.path.display()))?;
            } else {
                info!(file = %file.file_name(), "Skipping incomplete daily file");
            }
            incomplete.push(file.path);
            continue;
        }

        resources.push(Resource::for_daily_file(&file.file_name(), file.date));
        dates.push(file.date);
    }

    metadata.insert("resources".to_string(), serde_json::to_value(&resources)?);
    info!(resources = resources.len(), "Dataset metadata built");

    Ok(MetadataReport {
        metadata: Value::Object(metadata),
        dates,
        incomplete,
    })
}

/// Reads a metadata template from disk.
pub fn read_template(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes `metadata` as JSON indented by four spaces.
pub fn write_metadata(path: &Path, metadata: &Value) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    metadata.serialize(&mut ser)?;

    fs::write(path, buf).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::env;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed(dir: &Path) {
        for name in [
            "2022-05-08.csv",
            "2022-05-07.csv",
            "2022-05-09.csv",
            "stations-2022-05-07.csv",
        ] {
            fs::write(dir.join(name), "query_time,place_id\n").unwrap();
        }
    }

    #[test]
    fn test_resource_description() {
        let resource = Resource::for_daily_file("2022-05-07.csv", date(2022, 5, 7));
        assert_eq!(resource.description, "Station data for the May 07 2022");
        assert_eq!(resource.schema.fields.len(), 7);

        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["schema"]["fields"][0]["type"], "datetime");
    }

    #[test]
    fn test_build_metadata_skips_incomplete_files() {
        let dir = temp_dir("cycles_db_test_metadata_skip");
        seed(&dir);

        let template = json!({"title": "London bike sharing", "id": "user/london-bikes"});
        let report = build_metadata(template, &dir, date(2022, 5, 9), false).unwrap();

        let resources = report.metadata["resources"].as_array().unwrap();
        let paths: Vec<_> = resources.iter().map(|r| r["path"].as_str().unwrap()).collect();
        assert_eq!(paths, vec!["2022-05-07.csv", "2022-05-08.csv"]);
        assert_eq!(report.metadata["title"], "London bike sharing");
        assert_eq!(report.incomplete.len(), 1);
        assert!(dir.join("2022-05-09.csv").exists());
        assert_eq!(
            report.update_message().unwrap(),
            "Data from 2022-05-07 to 2022-05-08"
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_build_metadata_can_remove_incomplete_files() {
        let dir = temp_dir("cycles_db_test_metadata_remove");
        seed(&dir);

        build_metadata(json!({}), &dir, date(2022, 5, 8), true).unwrap();

        assert!(dir.join("2022-05-07.csv").exists());
        assert!(!dir.join("2022-05-08.csv").exists());
        assert!(!dir.join("2022-05-09.csv").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_template_must_be_an_object() {
        let dir = temp_dir("cycles_db_test_metadata_template");
        assert!(build_metadata(json!([]), &dir, date(2022, 5, 8), false).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_metadata_indents_four_spaces() {
        let dir = temp_dir("cycles_db_test_metadata_write");
        let path = dir.join(METADATA_FILE);

        write_metadata(&path, &json!({"title": "x"})).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\n    \"title\": \"x\"\n}");
        assert_eq!(read_template(&path).unwrap()["title"], "x");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_no_dates_no_message() {
        let report = MetadataReport {
            metadata: json!({}),
            dates: vec![],
            incomplete: vec![],
        };
        assert!(report.update_message().is_none());
    }
}
