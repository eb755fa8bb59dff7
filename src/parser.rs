//! JSON parser for the TfL BikePoint API.

use anyhow::Result;
use serde::Deserialize;

/// A key/value pair from a place's `additionalProperties`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalProperty {
    pub key: String,
    pub value: String,
}

/// One docking station as described by `GET /BikePoint`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BikePoint {
    pub id: String,
    #[serde(default)]
    pub common_name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub additional_properties: Vec<AdditionalProperty>,
}

/// Decodes the JSON array returned by `GET /BikePoint`.
///
/// # Errors
///
/// Returns an error if the bytes are not a JSON array of places.
pub fn parse_bike_points(bytes: &[u8]) -> Result<Vec<BikePoint>> {
    Ok(serde_json::from_slice(bytes)?)
}
