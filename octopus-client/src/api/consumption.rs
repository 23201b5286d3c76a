use std::time::Duration;

use reqwest::Url;

use crate::{
    domain::{MeterPoint, ReadingBatch},
    error::ClientError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.octopus.energy";

/// Client for the consumption endpoints of the metering API.
///
/// Requests authenticate with HTTP Basic, using the API key as the username
/// and an empty password.
#[derive(Clone)]
pub struct ConsumptionClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl ConsumptionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// URL of the first consumption page for `meter`.
    pub fn consumption_url(&self, meter: &MeterPoint, page_size: u32) -> Result<Url, ClientError> {
        let raw = format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            meter.consumption_path()
        );
        let mut url = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("page_size", &page_size.to_string());
        Ok(url)
    }

    /// Whether `url` points at the configured API host. Credentials are only
    /// ever sent there, so pagination cursors elsewhere are not followed.
    pub fn is_same_origin(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| u.origin() == self.base_url.origin())
            .unwrap_or(false)
    }

    /// Fetch a single page. `url` is either built by [`Self::consumption_url`]
    /// or a `next` cursor from a previous page.
    pub async fn fetch_page(&self, url: &str) -> Result<ReadingBatch, ClientError> {
        tracing::debug!(%url, "fetching consumption page");

        let resp = self
            .http
            .get(url)
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.bytes().await?;
        let batch: ReadingBatch = serde_json::from_slice(&body)?;
        Ok(batch)
    }
}
