//! Errors produced while retrieving a layer.
//!
//! The retry policy hangs off these kinds: network failures are retried
//! with backoff, protocol failures (bad status, malformed body) are
//! assumed deterministic and never retried, and the remaining variants
//! are configuration errors that abort the layer immediately.

use thiserror::Error;
use vworld_core::{BoundingBox, BoundingBoxError};

/// Errors that abort one layer's download.
///
/// In a multi-layer run these stay scoped to their layer; other layers
/// continue independently.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RetrievalError {
    /// The request failed to complete (timeout, connection failure).
    /// Retried up to the configured bound.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// The server returned a non-success status. Not retried.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The response body was not a feature collection. Not retried.
    #[error("malformed feature collection from {url}: {message}")]
    Malformed {
        /// Fully qualified request URL.
        url: String,
        /// Decode failure, with a snippet of the offending body.
        message: String,
    },
    /// Subdivision reached the depth bound without dropping under the
    /// pagination ceiling. The splitting strategy cannot make progress.
    #[error("bounding box {bbox} did not converge under the pagination ceiling within depth {max_depth}")]
    SplitConvergence {
        /// The region that kept overflowing.
        bbox: BoundingBox,
        /// Configured recursion bound that was exhausted.
        max_depth: u32,
    },
    /// A region overflowed but no extent is available to subdivide.
    #[error("layer {layer} overflows the pagination ceiling and has no extent to subdivide")]
    MissingExtent {
        /// Name of the affected layer.
        layer: String,
    },
    /// A degenerate or invalid bounding box reached the splitter.
    #[error(transparent)]
    Bbox(#[from] BoundingBoxError),
}

impl RetrievalError {
    /// Whether the retry policy applies to this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn only_network_errors_are_retryable() {
        let network = RetrievalError::Network {
            url: "https://api.vworld.kr/req/wfs".to_owned(),
            message: "connection reset".to_owned(),
        };
        let http = RetrievalError::Http {
            url: "https://api.vworld.kr/req/wfs".to_owned(),
            status: 502,
            message: "bad gateway".to_owned(),
        };

        assert!(network.is_retryable());
        assert!(!http.is_retryable());
    }
}
