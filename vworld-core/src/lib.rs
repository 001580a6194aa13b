//! Core domain types for the VWorld layer retrieval engine.
//!
//! These models provide basic validation to keep downstream
//! components honest. Constructors return `Result` to surface
//! invalid input early. Network access and persistence live in
//! `vworld-wfs`; everything here is pure.

#![forbid(unsafe_code)]

mod bbox;
mod feature;
mod filter;
mod layer;

pub use bbox::{BoundingBox, BoundingBoxError, SplitFactor};
pub use feature::{Feature, FeaturePage, FetchSummary, LayerDataset, RawFeature};
pub use filter::encode_filter;
pub use layer::{FilterPredicate, LayerSpec, Srid};
