//! Joins regularized station data with daylight colours, one frame per
//! cadence step, ready for a renderer to draw.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::daylight::{ColorGradient, Palette, gradient_for_date};
use crate::location::Location;
use crate::regularize::{RegularizedObservation, RegularizedSeries};

/// Everything needed to draw one animation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub time: DateTime<Utc>,
    pub background: String,
    pub stations: Vec<RegularizedObservation>,
}

/// Flat CSV row of a frame, one per station.
#[derive(Debug, Serialize)]
pub struct FrameRow<'a> {
    pub query_time: String,
    pub place_id: &'a str,
    pub lat: f64,
    pub lon: f64,
    pub bikes: f64,
    pub empty_docks: f64,
    pub docks: f64,
    pub proportion: f64,
    pub background: &'a str,
}

impl Frame {
    /// Rows of this frame with the time rendered in the location's zone.
    pub fn rows<'a>(&'a self, location: &Location) -> impl Iterator<Item = FrameRow<'a>> {
        let query_time = location.to_local(self.time).to_rfc3339();
        self.stations.iter().map(move |s| FrameRow {
            query_time: query_time.clone(),
            place_id: &s.place_id,
            lat: s.lat,
            lon: s.lon,
            bikes: s.bikes,
            empty_docks: s.empty_docks,
            docks: s.docks,
            proportion: s.proportion,
            background: &self.background,
        })
    }
}

/// Groups rows by instant and attaches each instant's daylight colour.
///
/// Gradients are computed once per local date. Instants on dates whose
/// solar events cannot be computed are dropped.
#[tracing::instrument(skip(series, palette), fields(stations = series.len()))]
pub fn build_frames(
    series: &[RegularizedSeries],
    location: &Location,
    palette: &Palette,
) -> Vec<Frame> {
    let mut by_time: BTreeMap<DateTime<Utc>, Vec<RegularizedObservation>> = BTreeMap::new();
    for row in series.iter().flat_map(|s| s.rows.iter()) {
        by_time.entry(row.query_time).or_default().push(row.clone());
    }

    let mut gradients: HashMap<NaiveDate, Option<ColorGradient>> = HashMap::new();
    let mut frames = Vec::with_capacity(by_time.len());

    for (time, stations) in by_time {
        let date = location.local_date(time);
        let gradient = gradients.entry(date).or_insert_with(|| {
            match gradient_for_date(date, location, palette) {
                Ok(gradient) => Some(gradient),
                Err(e) => {
                    warn!(%date, error = %e, "No daylight gradient, skipping the date's frames");
                    None
                }
            }
        });

        let Some(background) = gradient.as_ref().and_then(|g| g.color_at(time)) else {
            debug!(%time, "No colour for instant");
            continue;
        };

        frames.push(Frame {
            time,
            background: background.to_string(),
            stations,
        });
    }

    frames
}
