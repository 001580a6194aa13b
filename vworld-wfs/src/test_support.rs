//! Deterministic page sources for testing the retrieval loop.
//!
//! [`ScriptedPageSource`] behaves like a small WFS server over an
//! in-memory set of point features: it filters by bounding box
//! (edges inclusive, like a real intersection query), paginates, and
//! reports the matched total, all without a network. [`FlakyPageSource`]
//! and [`SaturatedPageSource`] script the failure modes the orchestrator
//! must survive.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use vworld_core::{BoundingBox, FeaturePage, RawFeature};

use crate::client::{PageQuery, PageSource};
use crate::error::RetrievalError;

/// One scripted point feature.
#[derive(Debug, Clone)]
pub struct ScriptedFeature {
    /// Feature identity as the server would report it.
    pub id: String,
    /// Point x coordinate.
    pub x: f64,
    /// Point y coordinate.
    pub y: f64,
    /// Attribute payload.
    pub attributes: Map<String, Value>,
}

impl ScriptedFeature {
    fn to_raw(&self) -> RawFeature {
        RawFeature {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
            geometry: Some(json!({
                "type": "Point",
                "coordinates": [self.x, self.y],
            })),
        }
    }
}

/// In-memory [`PageSource`] backed by a fixed feature set.
///
/// Bounding-box queries return the features whose point falls inside the
/// box, edges inclusive; features sitting exactly on a shared split edge
/// are therefore returned by every adjacent region, reproducing the
/// duplicate returns the orchestrator's merge must absorb.
#[derive(Debug)]
pub struct ScriptedPageSource {
    features: Vec<ScriptedFeature>,
    report_total: bool,
    requests: Cell<u64>,
    failure: Option<RetrievalError>,
}

impl ScriptedPageSource {
    /// A source over an explicit feature list.
    #[must_use]
    pub fn new(features: Vec<ScriptedFeature>) -> Self {
        Self {
            features,
            report_total: true,
            requests: Cell::new(0),
            failure: None,
        }
    }

    /// A source holding `count` point features laid out on a regular
    /// grid strictly inside `extent`.
    ///
    /// The grid uses an even column count so no feature lands on the
    /// half-way lines where a quartering split places its edges.
    #[must_use]
    pub fn with_grid(count: usize, extent: &BoundingBox) -> Self {
        const COLUMNS: usize = 100;
        let rows = count.div_ceil(COLUMNS).max(1);
        let features = (0..count)
            .map(|index| {
                let column = index % COLUMNS;
                let row = index / COLUMNS;
                let mut attributes = Map::new();
                attributes.insert("seq".to_owned(), Value::from(index as u64));
                attributes.insert(
                    "code".to_owned(),
                    Value::from(format!("41{:05}", index)),
                );
                ScriptedFeature {
                    id: format!("feature.{index}"),
                    x: extent.min_x + extent.width() * ((column as f64) + 0.5) / (COLUMNS as f64),
                    y: extent.min_y + extent.height() * ((row as f64) + 0.5) / (rows as f64),
                    attributes,
                }
            })
            .collect();
        Self::new(features)
    }

    /// Stop reporting `totalFeatures` on pages.
    #[must_use]
    pub fn without_total_hint(mut self) -> Self {
        self.report_total = false;
        self
    }

    /// Append a second copy of the `index`-th feature whose `seq`
    /// attribute is replaced with `replacement_seq`.
    ///
    /// The copy shares the identity, so the merge must discard it and
    /// flag the attribute mismatch.
    #[must_use]
    pub fn with_duplicated_feature(mut self, index: usize, replacement_seq: u64) -> Self {
        let mut copy = self.features[index].clone();
        copy.attributes
            .insert("seq".to_owned(), Value::from(replacement_seq));
        self.features.push(copy);
        self
    }

    /// Fail every request with a clone of the given error.
    #[must_use]
    pub fn failing_with(mut self, error: RetrievalError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Requests served so far, including failed ones.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.get()
    }
}

#[async_trait(?Send)]
impl PageSource for ScriptedPageSource {
    async fn fetch_page(&self, query: PageQuery<'_>) -> Result<FeaturePage, RetrievalError> {
        self.requests.set(self.requests.get() + 1);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let matched: Vec<&ScriptedFeature> = self
            .features
            .iter()
            .filter(|feature| {
                query
                    .bbox
                    .is_none_or(|bbox| bbox.contains(feature.x, feature.y))
            })
            .collect();
        let total = matched.len() as u64;

        let page: Vec<RawFeature> = matched
            .into_iter()
            .skip(usize::try_from(query.start_index).unwrap_or(usize::MAX))
            .take(query.count as usize)
            .map(ScriptedFeature::to_raw)
            .collect();

        Ok(FeaturePage {
            features: page,
            total_hint: self.report_total.then_some(total),
            missing_id: 0,
        })
    }
}

/// Source that fails its first `failures` requests with a network error
/// before delegating to the inner source.
#[derive(Debug)]
pub struct FlakyPageSource {
    inner: ScriptedPageSource,
    remaining_failures: RefCell<u32>,
}

impl FlakyPageSource {
    /// Fail the first `failures` requests, then behave like `inner`.
    #[must_use]
    pub fn new(inner: ScriptedPageSource, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: RefCell::new(failures),
        }
    }
}

#[async_trait(?Send)]
impl PageSource for FlakyPageSource {
    async fn fetch_page(&self, query: PageQuery<'_>) -> Result<FeaturePage, RetrievalError> {
        let mut remaining = self.remaining_failures.borrow_mut();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(RetrievalError::Network {
                url: "https://api.vworld.kr/req/wfs".to_owned(),
                message: "connection reset by peer".to_owned(),
            });
        }
        drop(remaining);
        self.inner.fetch_page(query).await
    }
}

/// Source that overflows every region: full pages at every offset and a
/// total hint far beyond any ceiling, whatever the bounding box.
///
/// Feature identities incorporate the query region and offset, so every
/// page contributes fresh features; useful for driving the splitter to
/// its minimum-extent and maximum-depth exits.
#[derive(Debug)]
pub struct SaturatedPageSource {
    total: u64,
}

impl SaturatedPageSource {
    /// A source reporting `total` matching features everywhere.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self { total }
    }
}

#[async_trait(?Send)]
impl PageSource for SaturatedPageSource {
    async fn fetch_page(&self, query: PageQuery<'_>) -> Result<FeaturePage, RetrievalError> {
        let region = query.bbox.map_or_else(
            || "unbounded".to_owned(),
            |bbox| format!("{},{},{},{}", bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y),
        );
        let features = (0..query.count)
            .map(|index| RawFeature {
                id: format!("{region}/{}/{index}", query.start_index),
                attributes: Map::new(),
                geometry: Some(json!({"type": "Point", "coordinates": [0.0, 0.0]})),
            })
            .collect();
        Ok(FeaturePage {
            features,
            total_hint: Some(self.total),
            missing_id: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use vworld_core::LayerSpec;

    fn query<'a>(
        spec: &'a LayerSpec,
        bbox: Option<&'a BoundingBox>,
        start_index: u64,
    ) -> PageQuery<'a> {
        PageQuery {
            spec,
            bbox,
            start_index,
            count: 10,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn grid_source_filters_by_bbox_and_paginates() {
        let extent = BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid box");
        let spec = LayerSpec::new("시군구", "lt_c_adsigg_info");
        let source = ScriptedPageSource::with_grid(25, &extent);

        let all = source
            .fetch_page(query(&spec, Some(&extent), 0))
            .await
            .expect("should fetch");
        assert_eq!(all.len(), 10);
        assert_eq!(all.total_hint, Some(25));

        let tail = source
            .fetch_page(query(&spec, Some(&extent), 20))
            .await
            .expect("should fetch");
        assert_eq!(tail.len(), 5);
        assert_eq!(source.request_count(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn without_total_hint_suppresses_the_count() {
        let extent = BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid box");
        let spec = LayerSpec::new("시군구", "lt_c_adsigg_info");
        let source = ScriptedPageSource::with_grid(5, &extent).without_total_hint();

        let page = source
            .fetch_page(query(&spec, Some(&extent), 0))
            .await
            .expect("should fetch");

        assert_eq!(page.total_hint, None);
    }
}
