use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::errors::FetchError;
use crate::providers::PageFetcher;

/// Browser-like user agent; the catalog serves a reduced page to unknown clients
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// HTTP fetcher backed by a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError> {
        let url = Url::parse(locator)
            .map_err(|e| FetchError::InvalidLocator(format!("{}: {}", locator, e)))?;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| FetchError::RequestFailed {
                locator: locator.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                locator: locator.to_string(),
                status_code: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::RequestFailed {
            locator: locator.to_string(),
            message: format!("Failed to read response body: {}", e),
        })
    }
}
