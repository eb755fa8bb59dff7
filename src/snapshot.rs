//! Turns one poll of the BikePoint API into recordable rows.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::observation::Observation;
use crate::parser::{AdditionalProperty, BikePoint};

pub const BIKES_KEY: &str = "NbBikes";
pub const EMPTY_DOCKS_KEY: &str = "NbEmptyDocks";
pub const DOCKS_KEY: &str = "NbDocks";

/// A station whose counts could not be read from the API response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("station {place_id} has no `{key}` property")]
    Missing { place_id: String, key: &'static str },
    #[error("station {place_id} has {count} `{key}` properties")]
    Ambiguous {
        place_id: String,
        key: &'static str,
        count: usize,
    },
    #[error("station {place_id}: `{key}` is not a count: {value:?}")]
    NotNumeric {
        place_id: String,
        key: &'static str,
        value: String,
    },
}

impl PropertyError {
    pub fn place_id(&self) -> &str {
        match self {
            PropertyError::Missing { place_id, .. }
            | PropertyError::Ambiguous { place_id, .. }
            | PropertyError::NotNumeric { place_id, .. } => place_id,
        }
    }
}

/// Reads the single integer property named `key`.
pub fn get_number(
    place_id: &str,
    properties: &[AdditionalProperty],
    key: &'static str,
) -> Result<u32, PropertyError> {
    let matches: Vec<&AdditionalProperty> = properties.iter().filter(|p| p.key == key).collect();

    match matches.as_slice() {
        [] => Err(PropertyError::Missing {
            place_id: place_id.to_string(),
            key,
        }),
        [prop] => prop
            .value
            .trim()
            .parse()
            .map_err(|_| PropertyError::NotNumeric {
                place_id: place_id.to_string(),
                key,
                value: prop.value.clone(),
            }),
        many => Err(PropertyError::Ambiguous {
            place_id: place_id.to_string(),
            key,
            count: many.len(),
        }),
    }
}

/// The rows recorded from one poll, plus the stations that had to be skipped.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub rows: Vec<Observation>,
    pub faults: Vec<PropertyError>,
}

impl Snapshot {
    /// Extracts bike, empty-dock and dock counts from every station.
    ///
    /// A station with a missing or malformed count is skipped on its own;
    /// the other stations are still recorded.
    pub fn from_bike_points(bike_points: &[BikePoint], taken_at: DateTime<Utc>) -> Self {
        let mut snapshot = Snapshot {
            taken_at,
            ..Default::default()
        };

        for place in bike_points {
            match observation(place, taken_at) {
                Ok(row) => snapshot.rows.push(row),
                Err(e) => snapshot.faults.push(e),
            }
        }

        snapshot
    }
}

fn observation(place: &BikePoint, taken_at: DateTime<Utc>) -> Result<Observation, PropertyError> {
    let props = &place.additional_properties;
    Ok(Observation {
        query_time: taken_at,
        place_id: place.id.clone(),
        lat: place.lat,
        lon: place.lon,
        bikes: get_number(&place.id, props, BIKES_KEY)?,
        empty_docks: get_number(&place.id, props, EMPTY_DOCKS_KEY)?,
        docks: get_number(&place.id, props, DOCKS_KEY)?,
    })
}

/// `TerminalName` becomes `terminal_name`.
pub fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Static description of each station: its name, identifier and every
/// property other than the `Nb*` counts, with snake_case keys.
pub fn station_info(bike_points: &[BikePoint]) -> Vec<BTreeMap<String, String>> {
    bike_points
        .iter()
        .map(|place| {
            let mut info: BTreeMap<String, String> = place
                .additional_properties
                .iter()
                .filter(|p| !p.key.starts_with("Nb"))
                .map(|p| (snake_case(&p.key), p.value.clone()))
                .collect();
            info.insert("common_name".to_string(), place.common_name.clone());
            info.insert("place_id".to_string(), place.id.clone());
            info
        })
        .collect()
}
