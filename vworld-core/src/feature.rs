//! Feature records as fetched from the wire and as materialised.
//!
//! [`RawFeature`] keeps the geometry payload in its wire encoding so the
//! retrieval loop stays free of geometry parsing; the materialiser in
//! `vworld-wfs` turns accumulated raw features into a typed
//! [`LayerDataset`].

use geo::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bbox::BoundingBox;
use crate::layer::Srid;

/// One feature as returned by the server, geometry still in wire encoding.
///
/// Identity invariant: within one layer, `id` uniquely determines a
/// feature regardless of how many overlapping bounding-box queries
/// returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    /// Server-assigned identity, unique per layer.
    pub id: String,
    /// Attribute mapping, values verbatim from the response document.
    pub attributes: Map<String, Value>,
    /// Geometry payload in the wire encoding, if the feature carried one.
    pub geometry: Option<Value>,
}

/// One page of a feature-collection response.
///
/// Ephemeral: consumed by the orchestrator as soon as it is decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePage {
    /// Features in server order.
    pub features: Vec<RawFeature>,
    /// Total matching features as reported by the server, when reported.
    pub total_hint: Option<u64>,
    /// Wire features dropped at decode for lack of a resolvable identity.
    #[serde(default)]
    pub missing_id: u64,
}

impl FeaturePage {
    /// Page with every decoded feature carrying an identity.
    #[must_use]
    pub fn new(features: Vec<RawFeature>, total_hint: Option<u64>) -> Self {
        Self {
            features,
            total_hint,
            missing_id: 0,
        }
    }

    /// Number of features on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the page carried no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// One feature with its geometry parsed into a typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identity carried over from the raw feature.
    pub id: String,
    /// Attribute mapping, preserved verbatim.
    pub attributes: Map<String, Value>,
    /// Parsed geometry.
    pub geometry: Geometry<f64>,
}

/// Counters and flags accumulated over one layer download.
///
/// Fatal errors abort the layer instead; everything here is a warning
/// surfaced once, at completion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchSummary {
    /// Pages requested from the server.
    pub requests: u64,
    /// Regions probed, including the initial whole-extent probe.
    pub regions: u64,
    /// Bounding-box splits performed.
    pub splits: u64,
    /// Duplicate returns discarded by the keyed merge.
    pub duplicates_discarded: u64,
    /// Discarded duplicates whose attributes differed from the kept copy.
    pub attribute_mismatches: u64,
    /// Wire features dropped for lack of a resolvable identity.
    pub missing_id: u64,
    /// Features dropped because their geometry payload did not parse.
    pub dropped_geometries: u64,
    /// Minimum-size regions accepted despite overflowing the pagination
    /// ceiling. Non-empty means the dataset is incomplete.
    pub partial_regions: Vec<BoundingBox>,
}

impl FetchSummary {
    /// Whether a minimum-size region was accepted despite overflow.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.partial_regions.is_empty()
    }

    /// Whether any warning counter is non-zero.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.is_partial()
            || self.attribute_mismatches > 0
            || self.missing_id > 0
            || self.dropped_geometries > 0
    }
}

/// Final materialised result for one layer.
///
/// Built once per layer-download invocation, handed to the dataset
/// writer, then discarded. Contains no duplicate identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDataset {
    /// Layer name, also the output file stem.
    pub name: String,
    /// Reference system of every geometry in `features`.
    pub srid: Srid,
    /// Features in first-seen order.
    pub features: Vec<Feature>,
    /// Warnings accumulated across retrieval and materialisation.
    pub summary: FetchSummary,
}

impl LayerDataset {
    /// Number of features in the dataset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the dataset holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn summary_is_clean_by_default() {
        let summary = FetchSummary::default();
        assert!(!summary.is_partial());
        assert!(!summary.has_warnings());
    }

    #[rstest]
    fn partial_region_flags_summary() {
        let summary = FetchSummary {
            partial_regions: vec![BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid box")],
            ..FetchSummary::default()
        };
        assert!(summary.is_partial());
        assert!(summary.has_warnings());
    }

    #[rstest]
    fn dropped_geometries_flag_warnings_without_partiality() {
        let summary = FetchSummary {
            dropped_geometries: 2,
            ..FetchSummary::default()
        };
        assert!(!summary.is_partial());
        assert!(summary.has_warnings());
    }
}
