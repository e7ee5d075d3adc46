//! HTTP client construction and paced page retrieval

use crate::fetch::{FetchError, FetchResult, Outcome, Pacer};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Builds the shared HTTP client
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
/// * `timeout_secs` - Per-request timeout in seconds
pub fn build_http_client(user_agent: &str, timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A client paired with a per-source pacer
///
/// All page retrieval for one source goes through one `PacedClient`, so the
/// source's minimum inter-request interval holds across concurrent callers.
pub struct PacedClient {
    client: Client,
    pacer: Pacer,
}

impl PacedClient {
    pub fn new(client: Client, min_interval: Duration) -> Self {
        Self {
            client,
            pacer: Pacer::new(min_interval),
        }
    }

    /// Fetches a page body
    ///
    /// HTTP 404 is an authoritative negative answer and maps to `NotFound`;
    /// any other non-success status is a transient [`FetchError::Status`].
    pub async fn get(&self, url: &Url) -> FetchResult<Outcome<String>> {
        self.pacer.wait().await;

        debug!(url = %url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Outcome::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(Outcome::Found(body))
    }
}
