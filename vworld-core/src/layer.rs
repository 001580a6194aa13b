//! Layer descriptors and server-side filter predicates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Spatial reference identifier in the EPSG namespace.
///
/// # Examples
///
/// ```
/// use vworld_core::Srid;
///
/// assert_eq!(Srid::KOREA_2000_CENTRAL.to_string(), "EPSG:5186");
/// assert_eq!(Srid::WGS84.code(), 4326);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Srid(u32);

impl Srid {
    /// EPSG:5186, Korea 2000 / Central Belt 2010. Metres.
    pub const KOREA_2000_CENTRAL: Self = Self(5186);
    /// EPSG:4326, WGS 84 longitude/latitude. Degrees.
    pub const WGS84: Self = Self(4326);

    /// Wrap a raw EPSG code.
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// The bare EPSG code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// One server-side predicate in a layer's filter.
///
/// Only the comparison kinds used by the retrieval workload are
/// supported; this is deliberately not a general filter language.
/// Attribute names are passed through unvalidated: an unknown attribute
/// is a server-side rejection surfaced by the page fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterPredicate {
    /// `attribute = literal`.
    Equals {
        /// Attribute name on the server schema.
        attribute: String,
        /// Literal compared verbatim.
        literal: String,
    },
    /// `attribute LIKE pattern`.
    ///
    /// The wildcard characters are declared by the caller and passed
    /// through verbatim; the caller owns server-specific wildcard syntax.
    Like {
        /// Attribute name on the server schema.
        attribute: String,
        /// Pattern containing the declared wildcard characters.
        pattern: String,
        /// Multi-character wildcard, typically `*`.
        wild_card: char,
        /// Single-character wildcard, typically `?`.
        single_char: char,
        /// Escape character, typically `\`.
        escape_char: char,
    },
    /// Bounding-box intersection against a named geometry attribute.
    BboxIntersects {
        /// Geometry attribute name, e.g. `ag_geom`.
        attribute: String,
        /// Query envelope in `srid` coordinates.
        bbox: BoundingBox,
        /// Reference system of `bbox`.
        srid: Srid,
    },
}

impl FilterPredicate {
    /// Equality predicate.
    #[must_use]
    pub fn equals(attribute: impl Into<String>, literal: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            literal: literal.into(),
        }
    }

    /// Wildcard predicate with the conventional `*`/`?`/`\` characters.
    #[must_use]
    pub fn like(attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            attribute: attribute.into(),
            pattern: pattern.into(),
            wild_card: '*',
            single_char: '?',
            escape_char: '\\',
        }
    }
}

/// Immutable descriptor of one downloadable layer.
///
/// Created at configuration time and never mutated; the retrieval
/// orchestrator reads it, the registry owns it.
///
/// # Examples
///
/// ```
/// use vworld_core::{FilterPredicate, LayerSpec, Srid};
///
/// let spec = LayerSpec::new("시군구", "lt_c_adsigg_info")
///     .with_id_attribute("sig_cd")
///     .with_predicate(FilterPredicate::like("sig_cd", "41*"))
///     .with_srids(Srid::KOREA_2000_CENTRAL, Srid::KOREA_2000_CENTRAL);
/// assert!(spec.requires_bbox);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Dataset name, also the output file stem.
    pub name: String,
    /// Feature type identifier on the server, e.g. `lt_c_adsigg_info`.
    pub type_name: String,
    /// Server-side predicates, AND-combined by the filter encoder.
    pub predicates: Vec<FilterPredicate>,
    /// Whether queries must carry a bounding-box restriction.
    pub requires_bbox: bool,
    /// Attribute carrying the feature identity, overriding the
    /// wire-level feature id when set (e.g. `sig_cd`).
    pub id_attribute: Option<String>,
    /// Geometry attribute targeted by bounding-box filter predicates.
    pub geometry_attribute: String,
    /// Reference system for request bounding boxes.
    pub request_srid: Srid,
    /// Reference system requested for response geometries.
    pub response_srid: Srid,
}

impl LayerSpec {
    /// Start a descriptor with VWorld defaults: bounding box required,
    /// EPSG:5186 on both sides, identity from the wire-level feature id.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            predicates: Vec::new(),
            requires_bbox: true,
            id_attribute: None,
            geometry_attribute: "ag_geom".to_owned(),
            request_srid: Srid::KOREA_2000_CENTRAL,
            response_srid: Srid::KOREA_2000_CENTRAL,
        }
    }

    /// Append a server-side predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: FilterPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Read feature identity from the named attribute.
    #[must_use]
    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = Some(attribute.into());
        self
    }

    /// Allow unrestricted (whole-extent) queries for this layer.
    #[must_use]
    pub fn without_bbox_requirement(mut self) -> Self {
        self.requires_bbox = false;
        self
    }

    /// Name the geometry attribute targeted by bbox filter predicates.
    #[must_use]
    pub fn with_geometry_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.geometry_attribute = attribute.into();
        self
    }

    /// Set the request and response reference systems.
    #[must_use]
    pub fn with_srids(mut self, request: Srid, response: Srid) -> Self {
        self.request_srid = request;
        self.response_srid = response;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn builder_accumulates_predicates() {
        let spec = LayerSpec::new("읍면동", "lt_c_ademd_info")
            .with_predicate(FilterPredicate::equals("emd_kor_nm", "양평읍"))
            .with_predicate(FilterPredicate::like("emd_cd", "41*"));

        assert_eq!(spec.predicates.len(), 2);
        assert_eq!(spec.request_srid, Srid::KOREA_2000_CENTRAL);
        assert!(spec.id_attribute.is_none());
    }

    #[rstest]
    fn like_uses_conventional_wildcards() {
        let FilterPredicate::Like {
            wild_card,
            single_char,
            escape_char,
            ..
        } = FilterPredicate::like("sig_cd", "41*")
        else {
            panic!("expected Like predicate");
        };
        assert_eq!(wild_card, '*');
        assert_eq!(single_char, '?');
        assert_eq!(escape_char, '\\');
    }

    #[rstest]
    fn srid_formats_as_epsg() {
        assert_eq!(Srid::new(3857).to_string(), "EPSG:3857");
    }
}
