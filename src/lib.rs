//! Facade crate for the VWorld layer retrieval engine.
//!
//! This crate re-exports the core domain types and the WFS retrieval
//! pipeline: bounded pagination with adaptive bounding-box subdivision,
//! keyed deduplication, geometry materialisation, and GeoParquet
//! persistence.

#![forbid(unsafe_code)]

pub use vworld_core::{
    BoundingBox, BoundingBoxError, Feature, FeaturePage, FetchSummary, FilterPredicate,
    LayerDataset, LayerSpec, RawFeature, SplitFactor, Srid, encode_filter,
};

pub use vworld_wfs::{
    ClientBuildError, DatasetWriteError, LayerFetch, PageQuery, PageSource, RetrievalConfig,
    RetrievalError, WfsClient, WfsClientConfig, fetch_layer, materialise_layer,
    write_layer_parquet,
};
