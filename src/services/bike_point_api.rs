//! Trait for sources of live station status.

use anyhow::Result;
use cycles_db::parser::BikePoint;

/// Abstraction over a bike-share status provider (e.g., TfL).
#[async_trait::async_trait]
pub trait BikePointApi: Send + Sync {
    /// Returns every docking station with its current counts.
    async fn list_bike_points(&self) -> Result<Vec<BikePoint>>;
}
