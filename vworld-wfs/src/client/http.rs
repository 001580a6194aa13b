//! HTTP page fetcher for a WFS 2.0 endpoint.
//!
//! One [`PageQuery`] becomes one `GetFeature` GET request. The fetcher
//! is purely functional given its inputs: no retries, no shared state
//! beyond the connection pool. The WFS protocol rejects requests that
//! carry both `BBOX` and `FILTER`, so when a layer has attribute
//! predicates the region restriction is folded into the filter as a
//! BBOX predicate instead.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use vworld_core::{BoundingBox, FeaturePage, FilterPredicate, LayerSpec, encode_filter};

use super::response::FeatureCollectionDocument;
use super::{PageQuery, PageSource};
use crate::error::RetrievalError;
use crate::retrieve::{LayerFetch, RetrievalConfig, fetch_layer};

/// Production VWorld WFS endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.vworld.kr/req/wfs";

/// Default user agent for WFS requests.
pub const DEFAULT_USER_AGENT: &str = "vworld-layers/0.1";

/// Default request timeout in seconds.
///
/// Whole-extent probes against the largest layers routinely take minutes
/// on the server side.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Error type for [`WfsClient`] construction failures.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime backing the blocking facade.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Configuration for [`WfsClient`].
#[derive(Debug, Clone)]
pub struct WfsClientConfig {
    /// Endpoint base URL.
    pub base_url: String,
    /// API key sent as the `key` query parameter, when required.
    pub api_key: Option<String>,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for WfsClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl WfsClientConfig {
    /// Create a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// HTTP-backed [`PageSource`] with a blocking download facade.
///
/// The async [`PageSource`] implementation drives single page requests.
/// [`WfsClient::download_layer`] bridges the whole retrieval loop into
/// synchronous callers by blocking on an internally owned runtime; when
/// called from inside a multi-threaded Tokio runtime it reuses that
/// runtime's handle via [`tokio::task::block_in_place`] instead.
pub struct WfsClient {
    client: Client,
    config: WfsClientConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for WfsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WfsClient")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl WfsClient {
    /// Create a client against the production VWorld endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to
    /// build.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientBuildError> {
        Self::with_config(WfsClientConfig::default().with_api_key(api_key))
    }

    /// Create a client with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to
    /// build.
    pub fn with_config(config: WfsClientConfig) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(ClientBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    /// Assemble the `GetFeature` query parameters for one page request.
    fn build_params(&self, query: &PageQuery<'_>) -> Vec<(&'static str, String)> {
        let spec = query.spec;
        let mut params = vec![
            ("SERVICE", "WFS".to_owned()),
            ("VERSION", "2.0.0".to_owned()),
            ("REQUEST", "GetFeature".to_owned()),
            ("TYPENAME", spec.type_name.clone()),
            ("SRSNAME", spec.response_srid.to_string()),
            ("OUTPUT", "application/json".to_owned()),
            ("COUNT", query.count.to_string()),
            ("STARTINDEX", query.start_index.to_string()),
        ];

        let mut predicates = spec.predicates.clone();
        if let Some(bbox) = query.bbox {
            if predicates.is_empty() {
                params.push(("BBOX", bbox_param(bbox, spec)));
            } else {
                predicates.push(FilterPredicate::BboxIntersects {
                    attribute: spec.geometry_attribute.clone(),
                    bbox: *bbox,
                    srid: spec.request_srid,
                });
            }
        }
        if let Some(filter) = encode_filter(&predicates) {
            params.push(("FILTER", filter));
        }
        if let Some(api_key) = &self.config.api_key {
            params.push(("key", api_key.clone()));
        }
        params
    }

    /// Download a complete layer, blocking until it is assembled.
    ///
    /// This is the synchronous entry point for CLI-style callers; async
    /// callers drive [`fetch_layer`] directly with the client as the
    /// page source.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal [`RetrievalError`] for the layer.
    pub fn download_layer(
        &self,
        spec: &LayerSpec,
        extent: Option<&BoundingBox>,
        config: &RetrievalConfig,
    ) -> Result<LayerFetch, RetrievalError> {
        let future = fetch_layer(self, spec, extent, config);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            // No runtime detected, or current_thread runtime: use our own.
            _ => self.runtime.block_on(future),
        }
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> RetrievalError {
        if error.is_timeout() {
            return RetrievalError::Network {
                url: url.to_owned(),
                message: format!(
                    "request timed out after {}s",
                    self.config.timeout.as_secs()
                ),
            };
        }
        if let Some(status) = error.status() {
            return RetrievalError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        RetrievalError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl PageSource for WfsClient {
    async fn fetch_page(&self, query: PageQuery<'_>) -> Result<FeaturePage, RetrievalError> {
        let params = self.build_params(&query);
        let url = self.config.base_url.clone();

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;

        let body = response
            .text()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;

        // VWorld reports some request errors as an XML document with a
        // 200 status; those surface here as a decode failure.
        let document: FeatureCollectionDocument =
            serde_json::from_str(&body).map_err(|err| RetrievalError::Malformed {
                url,
                message: format!("{err}; body starts with: {}", body_snippet(&body)),
            })?;
        Ok(document.into_page(query.spec))
    }
}

fn bbox_param(bbox: &BoundingBox, spec: &LayerSpec) -> String {
    format!(
        "{},{},{},{},{}",
        bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y, spec.request_srid
    )
}

fn body_snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
