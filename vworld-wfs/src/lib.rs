//! WFS retrieval and persistence for the VWorld layer engine.
//!
//! Responsibilities:
//! - Fetch feature pages from a WFS 2.0 endpoint ([`client`]).
//! - Reassemble complete layers under the server's pagination limits by
//!   adaptive bounding-box subdivision ([`retrieve`]).
//! - Parse wire geometries into typed values ([`materialise`]) and
//!   persist layers as GeoParquet ([`dataset`]).
//!
//! Boundaries:
//! - Domain types live in `vworld-core`; nothing here redefines them.
//! - Keep blocking I/O off async executors; the blocking facade owns
//!   its own runtime.
//!
//! Invariants:
//! - No global mutable state; each layer download owns its accumulator.

#![forbid(unsafe_code)]

pub mod client;
pub mod dataset;
mod error;
pub mod materialise;
pub mod retrieve;

#[doc(hidden)]
pub mod test_support;

pub use client::{ClientBuildError, PageQuery, PageSource, WfsClient, WfsClientConfig};
pub use dataset::{DatasetWriteError, write_layer_parquet};
pub use error::RetrievalError;
pub use materialise::materialise_layer;
pub use retrieve::{LayerFetch, RetrievalConfig, fetch_layer};
