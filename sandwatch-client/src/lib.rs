//! Sandwatch HTTP Client
//!
//! A small, type-safe HTTP client for the malware-analysis backend.
//!
//! The client performs exactly one request per call and never retries or
//! caches; retry policy belongs to the lifecycle tracker. Failures come back
//! as a [`FetchError`] that distinguishes network, 4xx, 5xx and decode errors.
//!
//! # Example
//!
//! ```no_run
//! use sandwatch_client::BackendClient;
//! use sandwatch_core::domain::job::JobId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BackendClient::new("http://localhost:8000");
//!
//!     let status = client.fetch_status(&JobId::new("abc")?).await?;
//!     println!("Job abc is {}", status.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod source;

// Re-export commonly used types
pub use error::{FetchError, Result};
pub use source::{JobControl, StatusSource};

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the analysis backend API
///
/// Endpoints are grouped as:
/// - Status polling (`GET /status/{id}`)
/// - Job control (create, restart, cancel)
/// - Listings, results and health
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Base URL of the backend (e.g., "http://localhost:8000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the backend API (e.g., "http://localhost:8000")
    ///
    /// # Example
    /// ```
    /// use sandwatch_client::BackendClient;
    ///
    /// let client = BackendClient::new("http://localhost:8000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new backend client whose requests give up after `timeout`
    ///
    /// A timed-out request is reported as [`FetchError::Network`].
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a new backend client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the backend API
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an endpoint URL from path segments
    ///
    /// Segments are percent-encoded, so opaque job ids cannot change the path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Non-success statuses are classified into 4xx/5xx errors; a body that
    /// does not match `T` is a decode error.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::from_status(status.as_u16(), error_text));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::Decode(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., 204 on cancel)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::from_status(status.as_u16(), error_text));
        }

        Ok(())
    }
}
