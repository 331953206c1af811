//! Blocking HTTP fetch built on reqwest.

use std::time::Duration;

use cl_core::{Fetch, FetchError};
use tokio::runtime::Runtime;

/// Browser-like agent; some sites serve trimmed pages to unknown clients,
/// which would skew the probe comparison.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// HTTP fetcher driving an async client from synchronous callers.
pub struct HttpFetcher {
    runtime: Runtime,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let runtime =
            Runtime::new().map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("Failed to build http client: {}", e))?;
        Ok(Self { runtime, client })
    }

    /// Fetch a text resource, failing on non-success status. Used for list
    /// downloads.
    pub fn fetch_text(&self, url: &str) -> Result<String, String> {
        self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| format!("Failed to fetch '{}': {}", url, e))?;
            if !response.status().is_success() {
                return Err(format!("'{}' returned status {}", url, response.status()));
            }
            response
                .text()
                .await
                .map_err(|e| format!("Failed to read '{}': {}", url, e))
        })
    }
}

impl Fetch for HttpFetcher {
    /// Page fetch for probing. The body is returned regardless of status:
    /// an error page fetched for both baseline and candidate still
    /// compares meaningfully.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError(e.to_string()))?;
            Ok(bytes.to_vec())
        })
    }
}
