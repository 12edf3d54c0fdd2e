//! Cat fact API client
//!
//! This module provides the `Fetcher` seam the refetch controller drives,
//! plus the reqwest-backed `FactClient` that implements it against the
//! public cat fact endpoint.

use futures::future::BoxFuture;
use reqwest::Client;

use super::{Fact, FetchError};

/// Default endpoint for random cat facts
const CAT_FACT_URL: &str = "https://catfact.ninja/fact";

/// A single asynchronous fetch operation
///
/// Implementations perform exactly one attempt per call and never retry
/// internally; the retry policy lives in the refetch controller. The `key`
/// identifies the logical resource being fetched, letting one fetcher serve
/// several cache keys.
pub trait Fetcher<T>: Send + Sync {
    /// Runs one fetch attempt for `key`
    fn fetch(&self, key: &str) -> BoxFuture<'_, Result<T, FetchError>>;
}

/// Client for fetching cat facts over HTTP
#[derive(Debug, Clone)]
pub struct FactClient {
    client: Client,
    base_url: String,
}

impl Default for FactClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FactClient {
    /// Create a new FactClient pointed at the public cat fact API
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: CAT_FACT_URL.to_string(),
        }
    }

    /// Create a new FactClient with a custom HTTP client
    #[allow(dead_code)]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: CAT_FACT_URL.to_string(),
        }
    }

    /// Override the endpoint URL (useful for pointing tests at a local server)
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch a single random fact
    ///
    /// Issues one GET request with no parameters. A non-2xx status is
    /// reported as a network error; a body that is not the expected JSON
    /// shape is reported as a decode error.
    ///
    /// # Returns
    /// * `Ok(Fact)` - The fetched fact
    /// * `Err(FetchError)` - If the request or decoding fails
    pub async fn fetch_fact(&self) -> Result<Fact, FetchError> {
        let response = self.client.get(&self.base_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!(
                "unexpected HTTP status {}",
                status
            )));
        }

        let text = response.text().await?;
        let fact: Fact = serde_json::from_str(&text)?;
        Ok(fact)
    }
}

impl Fetcher<Fact> for FactClient {
    fn fetch(&self, _key: &str) -> BoxFuture<'_, Result<Fact, FetchError>> {
        Box::pin(self.fetch_fact())
    }
}
