//! Share Store Client
//!
//! HTTP implementation of the [`ShareStore`] trait against the external
//! encrypted key-value secrets service. The service enforces
//! create-if-absent semantics server-side (409 on an existing name) and
//! handles encryption at rest; this client only moves opaque string values.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use tss_core::store::{Result, ShareStore, StoreError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP-backed secret store client
pub struct StoreClient {
    /// HTTP client
    client: Client,
    /// Store service base URL
    url: String,
    /// Optional bearer token
    token: Option<String>,
    /// Request timeout
    timeout: Duration,
}

impl StoreClient {
    /// Create a new store client
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the bearer token sent with every request
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Create a secret on the store service
    #[instrument(skip(self, value))]
    async fn create_secret(&self, name: &str, value: &str) -> Result<()> {
        let request = CreateSecretRequest {
            name: name.to_string(),
            value: value.to_string(),
        };

        let response = self
            .authorize(self.client.post(format!("{}/v1/secret", self.url)))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => {
                debug!(name, "secret stored");
                Ok(())
            }
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists(name.to_string())),
            status => Err(StoreError::Unavailable(format!(
                "secret create failed with status {status}"
            ))),
        }
    }

    /// Fetch a secret from the store service
    #[instrument(skip(self))]
    async fn fetch_secret(&self, name: &str) -> Result<String> {
        let response = self
            .authorize(self.client.get(format!("{}/v1/secret/{name}", self.url)))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => {
                let body: SecretResponse = response
                    .json()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                Ok(body.value)
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(name.to_string())),
            status => Err(StoreError::Unavailable(format!(
                "secret fetch failed with status {status}"
            ))),
        }
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Unavailable("store request timed out".to_string())
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl ShareStore for StoreClient {
    async fn put(&self, name: &str, value: &str) -> Result<()> {
        self.create_secret(name, value).await
    }

    async fn get(&self, name: &str) -> Result<String> {
        self.fetch_secret(name).await
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateSecretRequest {
    name: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretResponse {
    value: String,
}
