use anyhow::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.tfl.gov.uk";

/// Connection settings for the TfL API.
///
/// Read from the environment (a `.env` file is honoured):
/// - `TFL_BASE_URL`: API root, defaults to [`DEFAULT_BASE_URL`]
/// - `TFL_APP_KEY`: optional application key, sent as `app_key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TflConfig {
    pub base_url: String,
    pub app_key: Option<String>,
}

impl TflConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_vars(
            std::env::var("TFL_BASE_URL").ok(),
            std::env::var("TFL_APP_KEY").ok(),
        ))
    }

    fn from_vars(base_url: Option<String>, app_key: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let app_key = app_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Self { base_url, app_key }
    }
}
