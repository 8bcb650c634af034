use crate::errors::ClientError;
use crate::models::BackendEnvelope;
use reqwest::RequestBuilder;
use serde::Serialize;
use std::time::Duration;

/// Header carrying the static API credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

pub const REGISTER_PATH: &str = "/api/sites/register";
pub const SETTINGS_PATH: &str = "/api/calculator/settings";
pub const SUBMIT_PATH: &str = "/api/calculator/ch7";

/// Per-operation request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub register: Duration,
    pub settings: Duration,
    pub submit: Duration,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            register: Duration::from_secs(30),
            settings: Duration::from_secs(15),
            submit: Duration::from_secs(30),
        }
    }
}

/// HTTP transport shared by the registration, settings and submission clients.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeouts: BackendTimeouts,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl BackendClient {
    /// Creates a new `BackendClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend host, with or without a trailing slash.
    /// * `api_key` - Value sent in the `X-API-Key` header.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            ClientError::TransportFailure(format!("Failed to create backend client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeouts: BackendTimeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: BackendTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeouts(&self) -> BackendTimeouts {
        self.timeouts
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Unauthenticated JSON POST.
    pub(crate) fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .timeout(timeout)
            .json(body)
    }

    /// JSON POST carrying the API key.
    pub(crate) fn post_json_authed<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> RequestBuilder {
        self.post_json(path, body, timeout)
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// GET carrying the API key.
    pub(crate) fn get_authed(
        &self,
        path: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .query(query)
            .timeout(timeout)
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Sends `request` once and decodes the `{success, data, message}` envelope.
    ///
    /// The HTTP status is not inspected: the backend reports rejections through
    /// the envelope, so only the body decides the outcome.
    pub(crate) async fn exchange(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<BackendEnvelope, ClientError> {
        let response = request.send().await.map_err(|e| {
            ClientError::TransportFailure(format!("{} request failed: {}", operation, e))
        })?;

        let status = response.status();
        tracing::debug!("{} responded with {}", operation, status);

        let body = response.text().await.map_err(|e| {
            ClientError::TransportFailure(format!("Failed to read {} response: {}", operation, e))
        })?;

        serde_json::from_str::<BackendEnvelope>(&body).map_err(|e| {
            ClientError::MalformedResponse(format!(
                "{} returned a non-JSON body (status {}): {}",
                operation, status, e
            ))
        })
    }
}
