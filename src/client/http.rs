//! HTTP implementation of [`AnimalApi`].
//!
//! `ApiClient` is created once and cloned into fetch workers; clones share the
//! same reqwest connection pool.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::api::AnimalApi;
use super::constants::{
    ANIMALS_PATH, CONNECT_TIMEOUT_SECS, HOME_PATH, REQUEST_TIMEOUT_SECS, default_user_agent,
};
use super::error::{ApiError, RequestError};
use super::retry::{RetryPolicy, classify_error, run_with_retry};
use crate::model::{AnimalId, NormalizedRecord, Page, RawRecord};

/// Transport settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Total timeout for one request attempt.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Retry policy applied to every request.
    pub retry_policy: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// JSON client for the animals API with timeout and retry handling.
///
/// # Example
///
/// ```no_run
/// use animal_etl::client::{AnimalApi, ApiClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new("http://localhost:3123")?;
/// let page = client.fetch_page(1).await?;
/// println!("{} animals on page 1", page.items.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    retry_policy: RetryPolicy,
}

impl ApiClient {
    /// Creates a client for `base_url` with default timeouts and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` does not parse, or
    /// [`ApiError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_settings(base_url, ClientSettings::default())
    }

    /// Creates a client with explicit transport settings.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    #[instrument(level = "debug", skip(settings))]
    pub fn with_settings(base_url: &str, settings: ClientSettings) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|_| ApiError::InvalidUrl {
            url: base_url.to_string(),
        })?;

        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .map_err(ApiError::ClientBuild)?;

        debug!(
            base_url = %base_url,
            timeout_secs = settings.request_timeout.as_secs(),
            max_attempts = settings.retry_policy.max_attempts(),
            "created API client"
        );

        Ok(Self {
            client,
            base_url,
            retry_policy: settings.retry_policy,
        })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Sends `method path` with an optional JSON body and decodes the JSON response.
    ///
    /// An empty response body decodes as `null`. Transient failures are retried
    /// according to the client's [`RetryPolicy`].
    ///
    /// # Errors
    ///
    /// - [`ApiError::Transport`] when every attempt failed transiently
    /// - [`ApiError::Client`] for a non-retryable status
    /// - [`ApiError::Decode`] when the body is not JSON
    /// - [`ApiError::InvalidUrl`] when `path` cannot be joined to the base URL
    pub async fn request_json<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.endpoint(path)?;
        let url = url.as_str();
        let label = format!("{method} {path}");

        run_with_retry(&self.retry_policy, &label, classify_error, || {
            self.send_once(method.clone(), url, body)
        })
        .await
        .map_err(|(error, attempts)| ApiError::from_final_attempt(error, attempts))
    }

    async fn get_typed<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.request_json::<Value>(Method::GET, path, None).await?;
        serde_json::from_value(value).map_err(|e| ApiError::decode(self.display_url(path), e))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let joined = self.display_url(path);
        Url::parse(&joined).map_err(|_| ApiError::InvalidUrl { url: joined })
    }

    fn display_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn send_once<B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Value, RequestError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "request returned error status");
            return Err(RequestError::http_status(url, status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestError::from_reqwest(url, e))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| RequestError::decode(url, e))
    }
}

#[async_trait]
impl AnimalApi for ApiClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, page: u64) -> Result<Page, ApiError> {
        self.get_typed(&format!("{ANIMALS_PATH}?page={page}")).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_animal(&self, id: AnimalId) -> Result<RawRecord, ApiError> {
        self.get_typed(&format!("{ANIMALS_PATH}/{id}")).await
    }

    #[instrument(level = "debug", skip(self, batch), fields(batch_len = batch.len()))]
    async fn post_home(&self, batch: &[NormalizedRecord]) -> Result<(), ApiError> {
        self.request_json(Method::POST, HOME_PATH, Some(batch))
            .await
            .map(|_| ())
    }
}
