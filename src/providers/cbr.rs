use crate::core::config::FeedConfig;
use crate::core::currency::{FeedSnapshot, RateFeed};
use crate::core::error::{RateError, Result};
use crate::core::feed::parse_feed;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

// Central bank daily XML feed
pub struct CbrFeedProvider {
    url: String,
    timeout: Duration,
}

impl CbrFeedProvider {
    pub fn new(config: &FeedConfig) -> Self {
        CbrFeedProvider {
            url: format!("{}{}", config.base_url.trim_end_matches('/'), config.path),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let unavailable = |e: reqwest::Error| RateError::Fetch(format!("{e} ({})", self.url));

        let client = reqwest::Client::builder()
            .user_agent("kurs/1.0")
            .timeout(self.timeout)
            .build()
            .map_err(unavailable)?;

        let response = client.get(&self.url).send().await.map_err(unavailable)?;
        debug!(status = %response.status(), "Received feed response");

        if !response.status().is_success() {
            return Err(RateError::Fetch(format!(
                "HTTP error: {} ({})",
                response.status(),
                self.url
            )));
        }

        let body = response.bytes().await.map_err(unavailable)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl RateFeed for CbrFeedProvider {
    #[instrument(name = "CbrFeedFetch", skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<FeedSnapshot> {
        debug!("Requesting daily rates from {}", self.url);
        let body = self.download().await?;
        parse_feed(body.as_slice())
    }
}
