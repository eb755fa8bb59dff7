//! Transport for London unified API.
//!
//! [`TflConfig`] reads the endpoint and optional application key from the
//! environment; [`TflClient`] implements [`BikePointApi`](crate::services::bike_point_api::BikePointApi)
//! on top of it.

pub mod client;
pub mod config;

pub use client::TflClient;
pub use config::TflConfig;
