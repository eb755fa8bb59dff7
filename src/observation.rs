//! Station occupancy observations as recorded by the collector.
//!
//! Rows are read from disk as [`RawRecord`]s, keeping every column as text,
//! and only coerced into typed [`Observation`]s once they have been grouped
//! by station. That way a malformed value is charged to the one station it
//! belongs to instead of failing the whole load.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Column order of the daily CSV files.
pub const HEADERS: [&str; 7] = [
    "query_time",
    "place_id",
    "lat",
    "lon",
    "bikes",
    "empty_docks",
    "docks",
];

/// Format used when writing `query_time`: naive ISO-8601 in UTC.
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A station-level fault found while coercing recorded values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataQualityError {
    #[error("station {place_id}: column `{column}` holds non-numeric value {value:?}")]
    NotNumeric {
        place_id: String,
        column: &'static str,
        value: String,
    },
    #[error("station {place_id}: cannot parse query_time {value:?}")]
    BadTimestamp { place_id: String, value: String },
}

impl DataQualityError {
    pub fn place_id(&self) -> &str {
        match self {
            DataQualityError::NotNumeric { place_id, .. }
            | DataQualityError::BadTimestamp { place_id, .. } => place_id,
        }
    }
}

/// One CSV row exactly as it was read. Columns missing from a short row
/// are empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub query_time: String,
    pub place_id: String,
    pub lat: String,
    pub lon: String,
    pub bikes: String,
    pub empty_docks: String,
    pub docks: String,
}

/// One station's occupancy reading at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    #[serde(serialize_with = "serialize_query_time")]
    pub query_time: DateTime<Utc>,
    pub place_id: String,
    pub lat: f64,
    pub lon: f64,
    pub bikes: u32,
    pub empty_docks: u32,
    pub docks: u32,
}

impl Observation {
    /// Fraction of the station's docks holding a bike.
    ///
    /// Not clamped: inconsistent upstream counts may push it outside
    /// `[0, 1]`, and a station reporting zero docks yields a non-finite value.
    pub fn proportion(&self) -> f64 {
        (self.docks as f64 - self.empty_docks as f64) / self.docks as f64
    }
}

impl TryFrom<&RawRecord> for Observation {
    type Error = DataQualityError;

    fn try_from(raw: &RawRecord) -> Result<Self, Self::Error> {
        let place_id = raw.place_id.trim();
        let query_time =
            parse_query_time(&raw.query_time).ok_or_else(|| DataQualityError::BadTimestamp {
                place_id: place_id.to_string(),
                value: raw.query_time.clone(),
            })?;

        Ok(Observation {
            query_time,
            place_id: place_id.to_string(),
            lat: parse_coordinate(place_id, "lat", &raw.lat)?,
            lon: parse_coordinate(place_id, "lon", &raw.lon)?,
            bikes: parse_count(place_id, "bikes", &raw.bikes)?,
            empty_docks: parse_count(place_id, "empty_docks", &raw.empty_docks)?,
            docks: parse_count(place_id, "docks", &raw.docks)?,
        })
    }
}

/// Parses a recorded timestamp.
///
/// Accepts RFC 3339, an offset-qualified `YYYY-MM-DD HH:MM:SS+HH:MM`, or a
/// naive ISO-8601 timestamp (`T` or space separated). Naive timestamps are
/// UTC, which is how the collector writes them.
pub fn parse_query_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn serialize_query_time<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format(QUERY_TIME_FORMAT))
}

fn parse_coordinate(
    place_id: &str,
    column: &'static str,
    value: &str,
) -> Result<f64, DataQualityError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| not_numeric(place_id, column, value))
}

/// Counts are integers, but files re-exported by dataframe tools may carry
/// them as `3.0`; integral floats are accepted.
fn parse_count(place_id: &str, column: &'static str, value: &str) -> Result<u32, DataQualityError> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<u32>() {
        return Ok(n);
    }

    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
            Ok(f as u32)
        }
        _ => Err(not_numeric(place_id, column, value)),
    }
}

fn not_numeric(place_id: &str, column: &'static str, value: &str) -> DataQualityError {
    DataQualityError::NotNumeric {
        place_id: place_id.to_string(),
        column,
        value: value.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn raw(query_time: &str, place_id: &str, empty_docks: &str, docks: &str) -> RawRecord {
        RawRecord {
            query_time: query_time.to_string(),
            place_id: place_id.to_string(),
            lat: "51.529163".to_string(),
            lon: "-0.10997".to_string(),
            bikes: "3".to_string(),
            empty_docks: empty_docks.to_string(),
            docks: docks.to_string(),
        }
    }

    #[test]
    fn test_parse_naive_query_time_as_utc() {
        let t = parse_query_time("2022-05-07T01:16:02.402817").unwrap();
        assert_eq!(
            t,
            Utc.with_ymd_and_hms(2022, 5, 7, 1, 16, 2).unwrap()
                + chrono::Duration::microseconds(402817)
        );

        let t = parse_query_time("2022-05-07 01:16:02").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2022, 5, 7, 1, 16, 2).unwrap());
    }

    #[test]
    fn test_parse_offset_query_time() {
        let t = parse_query_time("2022-05-07T02:16:02+01:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2022, 5, 7, 1, 16, 2).unwrap());

        let t = parse_query_time("2022-05-07 02:16:02+01:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2022, 5, 7, 1, 16, 2).unwrap());
    }

    #[test]
    fn test_parse_query_time_rejects_garbage() {
        assert!(parse_query_time("yesterday").is_none());
        assert!(parse_query_time("").is_none());
    }

    #[test]
    fn test_observation_from_raw() {
        let obs = Observation::try_from(&raw("2022-05-07T01:16:02", "BikePoints_87", "5", "10")).unwrap();
        assert_eq!(obs.place_id, "BikePoints_87");
        assert_eq!(obs.bikes, 3);
        assert_eq!(obs.empty_docks, 5);
        assert_eq!(obs.docks, 10);
        assert!((obs.proportion() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_integral_float_counts_are_accepted() {
        let obs = Observation::try_from(&raw("2022-05-07T01:16:02", "BikePoints_1", "5.0", "10.0")).unwrap();
        assert_eq!(obs.empty_docks, 5);
        assert_eq!(obs.docks, 10);
    }

    #[test]
    fn test_non_numeric_count_is_a_data_quality_fault() {
        let err = Observation::try_from(&raw("2022-05-07T01:16:02", "BikePoints_1", "five", "10")).unwrap_err();
        assert_eq!(
            err,
            DataQualityError::NotNumeric {
                place_id: "BikePoints_1".to_string(),
                column: "empty_docks",
                value: "five".to_string(),
            }
        );
        assert_eq!(err.place_id(), "BikePoints_1");
    }

    #[test]
    fn test_fractional_or_negative_counts_are_rejected() {
        assert!(Observation::try_from(&raw("2022-05-07T01:16:02", "B", "2.5", "10")).is_err());
        assert!(Observation::try_from(&raw("2022-05-07T01:16:02", "B", "-1", "10")).is_err());
    }

    #[test]
    fn test_bad_timestamp_is_a_data_quality_fault() {
        let err = Observation::try_from(&raw("not a time", "B", "1", "10")).unwrap_err();
        assert!(matches!(err, DataQualityError::BadTimestamp { .. }));
    }

    #[test]
    fn test_proportion_is_not_clamped() {
        let mut obs = Observation::try_from(&raw("2022-05-07T01:16:02", "B", "12", "10")).unwrap();
        assert!(obs.proportion() < 0.0);

        obs.docks = 0;
        assert!(!obs.proportion().is_finite());
    }

    #[test]
    fn test_query_time_serializes_naive_utc() {
        let obs = Observation::try_from(&raw("2022-05-07T01:16:02.5", "B", "1", "10")).unwrap();
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&obs).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), HEADERS.join(","));
        assert!(lines.next().unwrap().starts_with("2022-05-07T01:16:02.500000,B,"));
    }
}
