use crate::{FetchResponse, HarvestConfig, HarvestError, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::debug;

/// The fetch collaborator: a GET that either yields a status and body or fails.
///
/// Non-2xx responses are returned as `Ok`; deciding what a status means is
/// the caller's job. Implementations must be cheap to share across harvests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse>;
}

/// The `HttpFetcher` struct performs real HTTP GETs with a browser-like header set.
pub struct HttpFetcher {
    /// The HTTP client used for making requests.
    client: Client,
}

impl HttpFetcher {
    /// Creates a new `HttpFetcher` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the user agent and the default page timeout.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `HttpFetcher`, or an error if the client could not be created.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.page_timeout())
            .redirect(redirect::Policy::limited(10))
            .gzip(true)
            .build()
            .map_err(HarvestError::Request)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse> {
        debug!(%url, ?timeout, "Fetching");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5")
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .send()
            .await?;

        let status = response.status().as_u16();
        debug!(%url, status, "Response status");

        let body = response.text().await?;
        Ok(FetchResponse { status, body })
    }
}
