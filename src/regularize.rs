//! Resampling of irregular per-station observations onto a fixed cadence.
//!
//! Each observation is assigned to the slot its timestamp floors to. Slots
//! holding several observations are collapsed with a per-field median, and
//! empty slots between two populated ones are filled by linear
//! interpolation. Slots before the first or after the last populated slot
//! of a field cannot be interpolated and are left out of the output.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::observation::{DataQualityError, Observation, RawRecord};

/// Minutes between two consecutive slots of a regularized series.
pub const CADENCE_MINUTES: i64 = 15;

pub fn cadence() -> Duration {
    Duration::minutes(CADENCE_MINUTES)
}

/// Rounds `t` down to a multiple of `step` since the Unix epoch.
pub fn floor_to(t: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step_secs = step.num_seconds().max(1);
    let excess = t.timestamp().rem_euclid(step_secs);
    t - Duration::seconds(excess) - Duration::nanoseconds(t.timestamp_subsec_nanos() as i64)
}

/// Rounds `t` up to a multiple of `step` since the Unix epoch.
pub fn ceil_to(t: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let floored = floor_to(t, step);
    if floored == t { t } else { floored + step }
}

/// Inclusive time filter applied to floored observation times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub beginning: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.beginning.is_none_or(|b| t >= b) && self.end.is_none_or(|e| t <= e)
    }
}

/// One slot of a regularized series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegularizedObservation {
    pub query_time: DateTime<Utc>,
    pub place_id: String,
    pub lat: f64,
    pub lon: f64,
    pub bikes: f64,
    pub empty_docks: f64,
    pub docks: f64,
    pub proportion: f64,
}

/// A station's history at a fixed cadence with no internal gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegularizedSeries {
    pub place_id: String,
    pub rows: Vec<RegularizedObservation>,
}

impl RegularizedSeries {
    pub fn empty(place_id: &str) -> Self {
        Self {
            place_id: place_id.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of regularizing a whole dataset.
#[derive(Debug, Default)]
pub struct RegularizeReport {
    pub series: Vec<RegularizedSeries>,
    pub faults: Vec<DataQualityError>,
}

impl RegularizeReport {
    /// All rows of all stations, station by station.
    pub fn rows(&self) -> impl Iterator<Item = &RegularizedObservation> {
        self.series.iter().flat_map(|s| s.rows.iter())
    }
}

// lat, lon, bikes, empty_docks, docks, proportion
const FIELDS: usize = 6;

fn field_values(obs: &Observation) -> [f64; FIELDS] {
    [
        obs.lat,
        obs.lon,
        obs.bikes as f64,
        obs.empty_docks as f64,
        obs.docks as f64,
        obs.proportion(),
    ]
}

/// Median of the finite values, or `None` when there are none.
fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut finite: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);

    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}

/// Fills `None` entries lying between two known values by linear
/// interpolation over the slot index. Leading and trailing `None`s stay.
fn interpolate_linear(column: &mut [Option<f64>]) {
    let mut previous: Option<(usize, f64)> = None;

    for i in 0..column.len() {
        let Some(value) = column[i] else { continue };

        if let Some((start, start_value)) = previous {
            let span = (i - start) as f64;
            for (offset, slot) in column[start + 1..i].iter_mut().enumerate() {
                let t = (offset + 1) as f64 / span;
                *slot = Some(start_value + (value - start_value) * t);
            }
        }
        previous = Some((i, value));
    }
}

/// Regularizes the observations of one station onto `cadence`.
///
/// Observations need not be sorted and may share timestamps. An empty input
/// yields an empty series.
pub fn regularize(
    place_id: &str,
    observations: &[Observation],
    cadence: Duration,
) -> RegularizedSeries {
    let mut sorted: Vec<&Observation> = observations.iter().collect();
    sorted.sort_by_key(|o| o.query_time);

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return RegularizedSeries::empty(place_id);
    };

    let step = cadence.num_seconds().max(1);
    let start = floor_to(first.query_time, cadence);
    let end = ceil_to(last.query_time, cadence);
    let slot_count = ((end - start).num_seconds() / step) as usize + 1;

    let mut buckets: Vec<Vec<[f64; FIELDS]>> = vec![Vec::new(); slot_count];
    for obs in &sorted {
        let index = (floor_to(obs.query_time, cadence) - start).num_seconds() / step;
        buckets[index as usize].push(field_values(obs));
    }

    let mut columns: Vec<Vec<Option<f64>>> = (0..FIELDS)
        .map(|field| {
            buckets
                .iter()
                .map(|bucket| median(bucket.iter().map(|values| values[field])))
                .collect()
        })
        .collect();
    for column in &mut columns {
        interpolate_linear(column);
    }

    let rows = (0..slot_count)
        .filter_map(|slot| {
            let [lat, lon, bikes, empty_docks, docks, proportion] = [
                columns[0][slot]?,
                columns[1][slot]?,
                columns[2][slot]?,
                columns[3][slot]?,
                columns[4][slot]?,
                columns[5][slot]?,
            ];
            Some(RegularizedObservation {
                query_time: start + Duration::seconds(step * slot as i64),
                place_id: place_id.to_string(),
                lat,
                lon,
                bikes,
                empty_docks,
                docks,
                proportion,
            })
        })
        .collect();

    RegularizedSeries {
        place_id: place_id.to_string(),
        rows,
    }
}

/// Coerces one station's recorded rows and regularizes them.
///
/// Any value that cannot be coerced fails the whole station. Rows whose
/// floored time falls outside `window` are dropped before resampling.
pub fn regularize_station(
    place_id: &str,
    records: &[RawRecord],
    window: &TimeWindow,
) -> Result<RegularizedSeries, DataQualityError> {
    let observations = records
        .iter()
        .map(Observation::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let in_window: Vec<Observation> = observations
        .into_iter()
        .filter(|o| window.contains(floor_to(o.query_time, cadence())))
        .collect();

    Ok(regularize(place_id, &in_window, cadence()))
}

/// Groups recorded rows by the station identifiers present in the data.
pub fn group_by_station(records: Vec<RawRecord>) -> BTreeMap<String, Vec<RawRecord>> {
    let mut groups: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.place_id.trim().to_string())
            .or_default()
            .push(record);
    }
    groups
}

/// Regularizes every station in `records` independently.
///
/// Stations with data-quality faults are logged and left out; the rest of
/// the batch is unaffected. Series come back ordered by station identifier.
#[tracing::instrument(skip(records), fields(rows = records.len()))]
pub fn regularize_all(records: Vec<RawRecord>, window: &TimeWindow) -> RegularizeReport {
    let groups = group_by_station(records);
    let station_count = groups.len();

    let results: Vec<Result<RegularizedSeries, DataQualityError>> = groups
        .into_par_iter()
        .map(|(place_id, rows)| regularize_station(&place_id, &rows, window))
        .collect();

    let mut report = RegularizeReport::default();
    for result in results {
        match result {
            Ok(series) if series.is_empty() => {}
            Ok(series) => report.series.push(series),
            Err(fault) => {
                warn!(place_id = fault.place_id(), error = %fault, "Dropping station");
                report.faults.push(fault);
            }
        }
    }

    info!(
        stations = station_count,
        regularized = report.series.len(),
        faults = report.faults.len(),
        "Regularization complete"
    );
    report
}
