//! Wire decoding of WFS GeoJSON feature-collection documents.
//!
//! VWorld answers `OUTPUT=application/json` with a GeoJSON
//! `FeatureCollection` carrying a GeoServer-style `totalFeatures` count.
//! Geometry payloads stay as raw JSON values here; parsing them into
//! typed geometries is the materialiser's job.

use serde::Deserialize;
use serde_json::{Map, Value};
use vworld_core::{FeaturePage, LayerSpec, RawFeature};

#[derive(Debug, Deserialize)]
pub(super) struct FeatureCollectionDocument {
    #[serde(default)]
    features: Vec<FeatureDocument>,
    /// GeoServer reports `totalFeatures`; WFS 2.0 proper calls it
    /// `numberMatched` and may set it to the string `"unknown"`.
    #[serde(default, rename = "totalFeatures", alias = "numberMatched")]
    total_features: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FeatureDocument {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    geometry: Option<Value>,
}

impl FeatureDocument {
    /// Resolve the feature identity per the layer's configuration.
    ///
    /// A configured `id_attribute` wins over the wire-level feature id;
    /// numeric identities are stringified.
    fn resolve_id(&self, spec: &LayerSpec) -> Option<String> {
        let raw = match &spec.id_attribute {
            Some(attribute) => self.properties.get(attribute),
            None => self.id.as_ref(),
        }?;
        value_to_id(raw)
    }
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl FeatureCollectionDocument {
    /// Convert the document into a [`FeaturePage`], dropping and
    /// counting features with no resolvable identity.
    pub(super) fn into_page(self, spec: &LayerSpec) -> FeaturePage {
        let total_hint = self.total_features.as_ref().and_then(Value::as_u64);
        let mut features = Vec::with_capacity(self.features.len());
        let mut missing_id = 0u64;
        for document in self.features {
            match document.resolve_id(spec) {
                Some(id) => features.push(RawFeature {
                    id,
                    attributes: document.properties,
                    geometry: document.geometry,
                }),
                None => {
                    missing_id += 1;
                    log::debug!(
                        "layer {}: dropping wire feature without a resolvable identity",
                        spec.name
                    );
                }
            }
        }
        FeaturePage {
            features,
            total_hint,
            missing_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode(body: &str, spec: &LayerSpec) -> FeaturePage {
        let document: FeatureCollectionDocument =
            serde_json::from_str(body).expect("should deserialise");
        document.into_page(spec)
    }

    #[rstest]
    fn decodes_features_and_total() {
        let spec = LayerSpec::new("시군구", "lt_c_adsigg_info");
        let body = r#"{
            "type": "FeatureCollection",
            "totalFeatures": 228,
            "features": [
                {
                    "type": "Feature",
                    "id": "lt_c_adsigg_info.1",
                    "properties": {"sig_cd": "41650", "sig_kor_nm": "포천시"},
                    "geometry": {"type": "Point", "coordinates": [210000.0, 560000.0]}
                }
            ]
        }"#;

        let page = decode(body, &spec);

        assert_eq!(page.total_hint, Some(228));
        assert_eq!(page.len(), 1);
        assert_eq!(page.features[0].id, "lt_c_adsigg_info.1");
        assert_eq!(
            page.features[0].attributes.get("sig_cd"),
            Some(&Value::String("41650".to_owned()))
        );
        assert!(page.features[0].geometry.is_some());
        assert_eq!(page.missing_id, 0);
    }

    #[rstest]
    fn id_attribute_overrides_wire_id() {
        let spec = LayerSpec::new("시군구", "lt_c_adsigg_info").with_id_attribute("sig_cd");
        let body = r#"{
            "features": [
                {"id": "wire.7", "properties": {"sig_cd": "41650"}, "geometry": null}
            ]
        }"#;

        let page = decode(body, &spec);

        assert_eq!(page.features[0].id, "41650");
    }

    #[rstest]
    fn features_without_identity_are_dropped_and_counted() {
        let spec = LayerSpec::new("리", "lt_c_adri_info").with_id_attribute("li_cd");
        let body = r#"{
            "features": [
                {"id": "wire.1", "properties": {"li_cd": "4183025021"}, "geometry": null},
                {"id": "wire.2", "properties": {"emd_cd": "4183025"}, "geometry": null},
                {"id": "wire.3", "properties": {"li_cd": ""}, "geometry": null}
            ]
        }"#;

        let page = decode(body, &spec);

        assert_eq!(page.len(), 1);
        assert_eq!(page.missing_id, 2);
    }

    #[rstest]
    fn unknown_number_matched_yields_no_hint() {
        let spec = LayerSpec::new("읍면동", "lt_c_ademd_info");
        let body = r#"{"numberMatched": "unknown", "features": []}"#;

        let page = decode(body, &spec);

        assert_eq!(page.total_hint, None);
        assert!(page.is_empty());
    }

    #[rstest]
    fn numeric_wire_id_is_stringified() {
        let spec = LayerSpec::new("시군구", "lt_c_adsigg_info");
        let body = r#"{"features": [{"id": 42, "properties": {}, "geometry": null}]}"#;

        let page = decode(body, &spec);

        assert_eq!(page.features[0].id, "42");
    }
}
