use anyhow::Result;
use async_trait::async_trait;
use cycles_db::fetch::auth::UrlParam;
use cycles_db::fetch::{BasicClient, HttpClient, fetch_bytes};
use cycles_db::parser::{BikePoint, parse_bike_points};
use tracing::debug;

use super::config::TflConfig;
use crate::services::bike_point_api::BikePointApi;

pub struct TflClient {
    http: Box<dyn HttpClient>,
    base_url: String,
}

impl TflClient {
    pub fn new(config: &TflConfig) -> Result<Self> {
        let basic = BasicClient::new()?;
        let http: Box<dyn HttpClient> = match &config.app_key {
            Some(key) => Box::new(UrlParam::app_key(basic, key.clone())),
            None => Box::new(basic),
        };

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl BikePointApi for TflClient {
    async fn list_bike_points(&self) -> Result<Vec<BikePoint>> {
        let url = format!("{}/BikePoint", self.base_url);

        let bytes = fetch_bytes(&self.http, &url).await?;
        debug!(bytes = bytes.len(), "BikePoint payload received");

        parse_bike_points(&bytes)
    }
}
