//! Built-in layer registry for the VWorld administrative layers.
//!
//! The registry is an immutable configuration value handed to the
//! download loop, not ambient global state: callers construct it once
//! and pass it around explicitly.

use vworld_core::{BoundingBox, LayerSpec};

/// Immutable table of downloadable layers and the default extent their
/// queries start from.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    layers: Vec<LayerSpec>,
    default_extent: BoundingBox,
}

impl LayerRegistry {
    /// The VWorld administrative-boundary layers over the
    /// Seoul/Gyeonggi extent (EPSG:5186 metres).
    #[must_use]
    pub fn vworld() -> Self {
        let default_extent = BoundingBox::new(144_693.0, 477_383.0, 275_745.0, 633_107.0)
            .expect("constant extent is valid");
        Self {
            layers: vec![
                LayerSpec::new("시군구", "lt_c_adsigg_info").with_id_attribute("sig_cd"),
                LayerSpec::new("읍면동", "lt_c_ademd_info").with_id_attribute("emd_cd"),
                LayerSpec::new("리", "lt_c_adri_info").with_id_attribute("li_cd"),
            ],
            default_extent,
        }
    }

    /// Look up a layer by display name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// All registered layers, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.iter()
    }

    /// The extent used when a layer download gives no explicit region.
    #[must_use]
    pub fn default_extent(&self) -> &BoundingBox {
        &self.default_extent
    }
}
