//! Materialise raw features into a typed, CRS-tagged dataset.
//!
//! Geometry payloads arrive as GeoJSON values; each is parsed into a
//! [`geo::Geometry`] via the `geojson` conversions. A feature whose
//! payload is absent or unparseable is dropped and counted, never fatal:
//! the dataset is still produced and the caller sees the drop count in
//! the summary.

use geo::Geometry;
use vworld_core::{Feature, LayerDataset, LayerSpec, RawFeature};

use crate::retrieve::LayerFetch;

/// Build the final [`LayerDataset`] from a completed fetch.
///
/// Features keep their first-seen order; the dataset is tagged with the
/// layer's response CRS.
#[must_use]
pub fn materialise_layer(spec: &LayerSpec, fetch: LayerFetch) -> LayerDataset {
    let LayerFetch {
        features: raw,
        mut summary,
    } = fetch;

    let mut features = Vec::with_capacity(raw.len());
    for feature in raw {
        match parse_geometry(&feature) {
            Some(geometry) => features.push(Feature {
                id: feature.id,
                attributes: feature.attributes,
                geometry,
            }),
            None => {
                summary.dropped_geometries += 1;
                log::debug!(
                    "layer {}: dropping feature {} with unusable geometry payload",
                    spec.name,
                    feature.id
                );
            }
        }
    }

    if summary.dropped_geometries > 0 {
        log::warn!(
            "layer {}: dropped {} features with unparseable geometry",
            spec.name,
            summary.dropped_geometries
        );
    }

    LayerDataset {
        name: spec.name.clone(),
        srid: spec.response_srid,
        features,
        summary,
    }
}

fn parse_geometry(feature: &RawFeature) -> Option<Geometry<f64>> {
    let payload = feature.geometry.clone()?;
    let geojson_geometry: geojson::Geometry = serde_json::from_value(payload).ok()?;
    Geometry::try_from(geojson_geometry).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Map, json};
    use vworld_core::{FetchSummary, Srid};

    fn raw(id: &str, geometry: Option<serde_json::Value>) -> RawFeature {
        RawFeature {
            id: id.to_owned(),
            attributes: Map::new(),
            geometry,
        }
    }

    fn fetch_of(features: Vec<RawFeature>) -> LayerFetch {
        LayerFetch {
            features,
            summary: FetchSummary::default(),
        }
    }

    #[rstest]
    fn parses_point_and_multipolygon_payloads() {
        let spec = LayerSpec::new("시군구", "lt_c_adsigg_info");
        let fetch = fetch_of(vec![
            raw(
                "a",
                Some(json!({"type": "Point", "coordinates": [210000.0, 560000.0]})),
            ),
            raw(
                "b",
                Some(json!({
                    "type": "MultiPolygon",
                    "coordinates": [[[
                        [0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]
                    ]]]
                })),
            ),
        ]);

        let dataset = materialise_layer(&spec, fetch);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.srid, Srid::KOREA_2000_CENTRAL);
        assert!(matches!(dataset.features[0].geometry, Geometry::Point(_)));
        assert!(matches!(
            dataset.features[1].geometry,
            Geometry::MultiPolygon(_)
        ));
        assert_eq!(dataset.summary.dropped_geometries, 0);
    }

    #[rstest]
    fn unparseable_geometry_is_dropped_and_counted() {
        let spec = LayerSpec::new("읍면동", "lt_c_ademd_info");
        let fetch = fetch_of(vec![
            raw(
                "kept",
                Some(json!({"type": "Point", "coordinates": [1.0, 2.0]})),
            ),
            raw("no-payload", None),
            raw("bad-payload", Some(json!({"type": "Blob", "coordinates": []}))),
        ]);

        let dataset = materialise_layer(&spec, fetch);

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.features[0].id, "kept");
        assert_eq!(dataset.summary.dropped_geometries, 2);
        assert!(dataset.summary.has_warnings());
    }

    #[rstest]
    fn preserves_first_seen_order_and_attributes() {
        let spec = LayerSpec::new("리", "lt_c_adri_info");
        let mut attributes = Map::new();
        attributes.insert("li_cd".to_owned(), json!("4183025021"));
        let fetch = fetch_of(vec![
            RawFeature {
                id: "z".to_owned(),
                attributes: attributes.clone(),
                geometry: Some(json!({"type": "Point", "coordinates": [0.0, 0.0]})),
            },
            raw("a", Some(json!({"type": "Point", "coordinates": [1.0, 1.0]}))),
        ]);

        let dataset = materialise_layer(&spec, fetch);

        assert_eq!(dataset.features[0].id, "z");
        assert_eq!(dataset.features[1].id, "a");
        assert_eq!(
            dataset.features[0].attributes.get("li_cd"),
            Some(&json!("4183025021"))
        );
    }
}
