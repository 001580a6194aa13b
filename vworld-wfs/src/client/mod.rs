//! Page-oriented access to a WFS endpoint.
//!
//! The [`PageSource`] trait is the seam between the retrieval
//! orchestrator and the network: one call, one `(bounding box, offset)`
//! pair, one decoded [`FeaturePage`]. The HTTP implementation is
//! [`WfsClient`]; tests substitute the scripted source from
//! `test_support` without touching the orchestrator.

mod http;
mod response;

use async_trait::async_trait;
use vworld_core::{BoundingBox, FeaturePage, LayerSpec};

use crate::error::RetrievalError;

pub use http::{ClientBuildError, DEFAULT_BASE_URL, DEFAULT_USER_AGENT, WfsClient, WfsClientConfig};

/// One page request.
#[derive(Debug, Clone, Copy)]
pub struct PageQuery<'a> {
    /// Layer being fetched.
    pub spec: &'a LayerSpec,
    /// Optional region restriction in the layer's request CRS.
    pub bbox: Option<&'a BoundingBox>,
    /// Pagination offset, a multiple of `count`.
    pub start_index: u64,
    /// Page size; the server's maximum efficient page size.
    pub count: u32,
}

/// Fetch one page of features for a query.
///
/// Implementations perform no retries and keep no per-layer state;
/// retry policy and accumulation belong to the orchestrator.
#[async_trait(?Send)]
pub trait PageSource {
    /// Perform one request and decode the response.
    async fn fetch_page(&self, query: PageQuery<'_>) -> Result<FeaturePage, RetrievalError>;
}
