//! HTTP client for the `ostor-usage` admin resource
//!
//! # Examples
//!
//! ```no_run
//! use ostor_usage_client::{ClientConfig, OstorClient};
//! use ostor_usage_core::UsageApi;
//!
//! # async fn example() -> ostor_usage_core::Result<()> {
//! let client = OstorClient::new(ClientConfig::new("https://s3.example.com:8443", "access", "secret"))?;
//! let listing = client.list_usage_objects().await?;
//! println!("{} usage objects pending", listing.items.len());
//! # Ok(())
//! # }
//! ```

use crate::error_body::decode_error_body;
use crate::signing::{RequestSigner, http_date, string_to_sign};
use async_trait::async_trait;
use chrono::Utc;
use ostor_usage_core::error::{Result, UsageError};
use ostor_usage_core::provider::UsageApi;
use ostor_usage_core::types::{ObjectName, UsageListing};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::{Method, Url};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Resource path every usage call is made against; also the signed resource
pub const USAGE_RESOURCE: &str = "/?ostor-usage";

/// Page size requested when listing and fetching usage objects
pub const USAGE_LIST_LIMIT: &str = "1000";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const JSON_CONTENT_TYPE: &str = "application/json";

/// Connection settings for [`OstorClient`]
#[derive(Clone)]
pub struct ClientConfig {
    /// Admin API endpoint, with or without scheme
    pub endpoint: String,
    /// Access key id
    pub access_key: String,
    /// Secret key
    pub secret_key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a config with the default timeout
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Normalize an endpoint: assume `https://` when no scheme is given and drop
/// trailing slashes
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(UsageError::Config("endpoint must not be empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    Url::parse(&with_scheme)
        .map_err(|e| UsageError::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
    Ok(with_scheme)
}

/// Successful response with its body read
#[derive(Debug)]
struct ApiResponse {
    content_type: String,
    body: String,
}

impl ApiResponse {
    fn into_json(self) -> Result<serde_json::Value> {
        if !self.content_type.contains(JSON_CONTENT_TYPE) {
            return Err(UsageError::UnexpectedResponse(format!(
                "expected JSON, got content type '{}'",
                self.content_type
            )));
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Signed client for the usage statistics admin API
#[derive(Debug, Clone)]
pub struct OstorClient {
    endpoint: String,
    signer: RequestSigner,
    http: reqwest::Client,
}

impl OstorClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Config`] for a missing key or an unparsable
    /// endpoint, and [`UsageError::Network`] if the HTTP client can't be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.access_key.is_empty() {
            return Err(UsageError::Config("access key must not be empty".to_string()));
        }
        if config.secret_key.is_empty() {
            return Err(UsageError::Config("secret key must not be empty".to_string()));
        }

        let endpoint = normalize_endpoint(&config.endpoint)?;
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            endpoint,
            signer: RequestSigner::new(config.access_key, config.secret_key),
            http,
        })
    }

    /// Normalized endpoint the client talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL of the usage resource with extra query pairs appended
    pub fn usage_url(&self, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.endpoint, USAGE_RESOURCE))
            .map_err(|e| UsageError::Config(format!("invalid usage URL: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url) -> Result<ApiResponse> {
        let date = http_date(Utc::now());
        let signature = self.signer.sign(&string_to_sign(
            method.as_str(),
            JSON_CONTENT_TYPE,
            &date,
            USAGE_RESOURCE,
        ))?;

        debug!("{} {}", method, url);
        let response = self
            .http
            .request(method, url)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(DATE, date)
            .header(AUTHORIZATION, self.signer.authorization(&signature))
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        if status.as_u16() > 204 {
            return Err(UsageError::Http {
                status: status.as_u16(),
                message: decode_error_body(&content_type, &body),
            });
        }

        Ok(ApiResponse { content_type, body })
    }
}

#[async_trait]
impl UsageApi for OstorClient {
    async fn list_usage_objects(&self) -> Result<UsageListing> {
        let url = self.usage_url(&[("limit", USAGE_LIST_LIMIT)])?;
        let document = self.send(Method::GET, url).await?.into_json()?;
        Ok(serde_json::from_value(document)?)
    }

    async fn fetch_usage_object(&self, object: &ObjectName) -> Result<serde_json::Value> {
        let url = self.usage_url(&[("limit", USAGE_LIST_LIMIT), ("obj", object.as_str())])?;
        self.send(Method::GET, url).await?.into_json()
    }

    async fn delete_usage_object(&self, object: &ObjectName) -> Result<()> {
        let url = self.usage_url(&[("obj", object.as_str())])?;
        self.send(Method::DELETE, url).await?;
        Ok(())
    }
}
