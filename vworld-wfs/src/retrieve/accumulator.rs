//! Keyed feature accumulator with first-seen-wins deduplication.
//!
//! Features straddling a split boundary come back from every region
//! whose bounding box intersects them; the accumulator keeps exactly one
//! copy per identifier, in first-appearance order. First-seen-wins is
//! the documented tie-break, not an accident: the tests pin it down.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use vworld_core::RawFeature;

#[derive(Debug, Default)]
pub(super) struct FeatureAccumulator {
    seen: HashMap<String, usize>,
    features: Vec<RawFeature>,
    duplicates: u64,
    mismatches: u64,
}

impl FeatureAccumulator {
    /// Merge one feature, discarding it if the identifier is known.
    ///
    /// A duplicate whose attributes differ from the kept copy is a
    /// data-quality signal; it is counted and logged, never silently
    /// resolved in favour of either copy.
    pub(super) fn insert(&mut self, feature: RawFeature) {
        match self.seen.entry(feature.id.clone()) {
            Entry::Occupied(entry) => {
                self.duplicates += 1;
                let kept = &self.features[*entry.get()];
                if kept.attributes != feature.attributes {
                    self.mismatches += 1;
                    log::warn!(
                        "duplicate return for feature {} carries differing attributes; keeping the first-seen copy",
                        feature.id
                    );
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(self.features.len());
                self.features.push(feature);
            }
        }
    }

    pub(super) fn extend(&mut self, features: impl IntoIterator<Item = RawFeature>) {
        for feature in features {
            self.insert(feature);
        }
    }

    pub(super) fn len(&self) -> usize {
        self.features.len()
    }

    /// Deduplicated features in first-appearance order, with the
    /// duplicate and mismatch counts.
    pub(super) fn into_parts(self) -> (Vec<RawFeature>, u64, u64) {
        (self.features, self.duplicates, self.mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Map, Value};

    fn feature(id: &str, value: i64) -> RawFeature {
        let mut attributes = Map::new();
        attributes.insert("value".to_owned(), Value::from(value));
        RawFeature {
            id: id.to_owned(),
            attributes,
            geometry: None,
        }
    }

    #[rstest]
    fn keeps_first_seen_copy() {
        let mut accumulator = FeatureAccumulator::default();
        accumulator.insert(feature("a", 1));
        accumulator.insert(feature("b", 2));
        accumulator.insert(feature("a", 1));

        let (features, duplicates, mismatches) = accumulator.into_parts();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "a");
        assert_eq!(features[1].id, "b");
        assert_eq!(duplicates, 1);
        assert_eq!(mismatches, 0);
    }

    #[rstest]
    fn counts_attribute_mismatches_without_replacing() {
        let mut accumulator = FeatureAccumulator::default();
        accumulator.insert(feature("a", 1));
        accumulator.insert(feature("a", 9));

        let (features, duplicates, mismatches) = accumulator.into_parts();
        assert_eq!(features.len(), 1);
        // First-seen copy survives; the mismatch is a warning, not a merge.
        assert_eq!(features[0].attributes.get("value"), Some(&Value::from(1)));
        assert_eq!(duplicates, 1);
        assert_eq!(mismatches, 1);
    }

    #[rstest]
    fn merge_is_idempotent() {
        let fragments = vec![feature("a", 1), feature("b", 2), feature("c", 3)];

        let mut once = FeatureAccumulator::default();
        once.extend(fragments.clone());
        let count_once = once.len();

        let mut twice = FeatureAccumulator::default();
        twice.extend(fragments.clone());
        twice.extend(fragments);
        let count_twice = twice.len();

        assert_eq!(count_once, count_twice);
    }
}
