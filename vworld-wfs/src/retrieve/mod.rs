//! Retrieval orchestration: bounded pagination with adaptive
//! bounding-box subdivision.
//!
//! The server refuses to return more than a fixed number of features per
//! request and honours pagination offsets only up to a ceiling. A layer
//! download therefore walks an explicit work queue of regions: each
//! region is probed at offset zero and either paginated to exhaustion or
//! split into a grid of children that re-enter the queue at the next
//! depth. Fragments from overlapping regions are merged through a keyed,
//! first-seen-wins accumulator, so fetch order never changes the result
//! set, only the copy that happens to be kept.
//!
//! The queue keeps subdivision depth-bounded and makes cancellation
//! trivial: dropping the future between fetches abandons the remaining
//! regions and nothing is persisted.

mod accumulator;

use std::collections::VecDeque;
use std::time::Duration;

use vworld_core::{BoundingBox, FeaturePage, FetchSummary, LayerSpec, RawFeature, SplitFactor};

use crate::client::{PageQuery, PageSource};
use crate::error::RetrievalError;
use accumulator::FeatureAccumulator;

/// Tuning for the retrieval loop.
///
/// Defaults are calibrated to the VWorld WFS limits: pages of 1000, a
/// `STARTINDEX` ceiling of 1000, quartering then ninths, and the
/// original's linear retry backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Features requested per page; the server's maximum efficient size.
    pub page_size: u32,
    /// Largest pagination offset the server honours.
    pub offset_ceiling: u64,
    /// Split granularity per depth; the final entry repeats for deeper
    /// levels.
    pub split_sequence: Vec<SplitFactor>,
    /// Maximum subdivision depth before giving up on a region.
    pub max_depth: u32,
    /// Regions at or below this extent are never split further; an
    /// overflow there is accepted as a partial result instead.
    pub min_extent: f64,
    /// Retries per page request for network failures.
    pub retries: u32,
    /// Backoff base; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            offset_ceiling: 1000,
            split_sequence: vec![SplitFactor::Quarters, SplitFactor::Ninths],
            max_depth: 5,
            min_extent: 1.0,
            retries: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl RetrievalConfig {
    fn factor_for_depth(&self, depth: u32) -> SplitFactor {
        self.split_sequence
            .get(depth as usize)
            .or_else(|| self.split_sequence.last())
            .copied()
            .unwrap_or(SplitFactor::Quarters)
    }
}

/// Deduplicated features for one layer plus the retrieval summary.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFetch {
    /// Features in first-appearance order, one per identifier.
    pub features: Vec<RawFeature>,
    /// Request counts and warnings accumulated during retrieval.
    pub summary: FetchSummary,
}

/// What probing a region concluded.
enum RegionOutcome {
    /// Every feature in the region was fetched.
    Exhausted(Vec<RawFeature>),
    /// The region holds more features than pagination can reach.
    Overflow {
        /// Features fetched before the overflow was established; merged
        /// anyway, the keyed dedup absorbs the overlap with children.
        fetched: Vec<RawFeature>,
        /// Offset at which pagination stopped.
        next_offset: u64,
    },
}

struct Region {
    bbox: Option<BoundingBox>,
    depth: u32,
}

/// Fetch a complete layer through the given page source.
///
/// `extent` is the layer's starting region. Layers flagged
/// `requires_bbox` must be given one; other layers may start with an
/// unrestricted whole-layer probe, but an overflow there is only
/// recoverable when an extent to subdivide exists.
///
/// # Errors
///
/// Returns the layer's first fatal [`RetrievalError`]; see the error
/// type for which conditions are fatal versus recorded as warnings in
/// the summary.
pub async fn fetch_layer<S>(
    source: &S,
    spec: &LayerSpec,
    extent: Option<&BoundingBox>,
    config: &RetrievalConfig,
) -> Result<LayerFetch, RetrievalError>
where
    S: PageSource + ?Sized,
{
    if spec.requires_bbox && extent.is_none() {
        return Err(RetrievalError::MissingExtent {
            layer: spec.name.clone(),
        });
    }

    let mut accumulator = FeatureAccumulator::default();
    let mut summary = FetchSummary::default();
    let mut queue = VecDeque::from([Region {
        bbox: extent.copied(),
        depth: 0,
    }]);

    while let Some(region) = queue.pop_front() {
        summary.regions += 1;
        let outcome = probe_region(source, spec, region.bbox.as_ref(), config, &mut summary).await?;
        match outcome {
            RegionOutcome::Exhausted(features) => accumulator.extend(features),
            RegionOutcome::Overflow {
                fetched,
                next_offset,
            } => {
                accumulator.extend(fetched);
                let Some(bbox) = region.bbox else {
                    return Err(RetrievalError::MissingExtent {
                        layer: spec.name.clone(),
                    });
                };
                if bbox.min_extent() <= config.min_extent {
                    // Deliberate lossy fallback: take what pagination can
                    // reach and flag the layer as partial.
                    log::warn!(
                        "layer {}: region {bbox} still overflows at minimum extent; accepting a partial result",
                        spec.name
                    );
                    let drained =
                        drain_to_ceiling(source, spec, &bbox, next_offset, config, &mut summary)
                            .await?;
                    accumulator.extend(drained);
                    summary.partial_regions.push(bbox);
                } else if region.depth >= config.max_depth {
                    return Err(RetrievalError::SplitConvergence {
                        bbox,
                        max_depth: config.max_depth,
                    });
                } else {
                    let factor = config.factor_for_depth(region.depth);
                    let children = bbox.split(factor)?;
                    log::info!(
                        "layer {}: region {bbox} overflows the pagination ceiling; splitting into {} children at depth {}",
                        spec.name,
                        children.len(),
                        region.depth + 1
                    );
                    summary.splits += 1;
                    queue.extend(children.into_iter().map(|child| Region {
                        bbox: Some(child),
                        depth: region.depth + 1,
                    }));
                }
            }
        }
    }

    let features = finish(accumulator, &mut summary);
    log::info!(
        "layer {}: {} features from {} requests over {} regions",
        spec.name,
        features.len(),
        summary.requests,
        summary.regions
    );
    Ok(LayerFetch { features, summary })
}

/// Probe one region and paginate it as far as the ceiling safely allows.
async fn probe_region<S>(
    source: &S,
    spec: &LayerSpec,
    bbox: Option<&BoundingBox>,
    config: &RetrievalConfig,
    summary: &mut FetchSummary,
) -> Result<RegionOutcome, RetrievalError>
where
    S: PageSource + ?Sized,
{
    let page_size = u64::from(config.page_size);
    // The largest result set pagination can fully reach: one final full
    // page fetched at the offset ceiling itself.
    let safe_total = config.offset_ceiling + page_size;
    let mut fetched = Vec::new();
    let mut offset = 0u64;

    loop {
        let page = fetch_with_retry(source, spec, bbox, offset, config, summary).await?;
        let count = page.len() as u64;
        let total_hint = page.total_hint;
        summary.missing_id += page.missing_id;
        fetched.extend(page.features);

        // A short page signals exhaustion; an empty region terminates
        // immediately without further splitting.
        if count < page_size {
            return Ok(RegionOutcome::Exhausted(fetched));
        }

        if offset == 0 {
            match total_hint {
                // Reported total is fully pageable: paginate on.
                Some(total) if total <= safe_total => {}
                // Reported total exceeds what pagination can reach, or
                // nothing was reported and the first page is full:
                // conservatively treat the region as overfull.
                _ => {
                    return Ok(RegionOutcome::Overflow {
                        fetched,
                        next_offset: page_size,
                    });
                }
            }
        }

        let next_offset = offset + page_size;
        if next_offset + page_size > safe_total {
            // The hint undercounted; the server keeps producing full
            // pages past the last reachable offset.
            return Ok(RegionOutcome::Overflow {
                fetched,
                next_offset,
            });
        }
        offset = next_offset;
    }
}

/// Fetch every offset the ceiling still allows for an accepted-as-partial
/// region.
async fn drain_to_ceiling<S>(
    source: &S,
    spec: &LayerSpec,
    bbox: &BoundingBox,
    start_offset: u64,
    config: &RetrievalConfig,
    summary: &mut FetchSummary,
) -> Result<Vec<RawFeature>, RetrievalError>
where
    S: PageSource + ?Sized,
{
    let page_size = u64::from(config.page_size);
    let mut fetched = Vec::new();
    let mut offset = start_offset;

    while offset <= config.offset_ceiling {
        let page = fetch_with_retry(source, spec, Some(bbox), offset, config, summary).await?;
        let count = page.len() as u64;
        summary.missing_id += page.missing_id;
        fetched.extend(page.features);
        if count < page_size {
            break;
        }
        offset += page_size;
    }
    Ok(fetched)
}

/// One page fetch with the bounded network-error retry policy.
///
/// Protocol errors are assumed deterministic and propagate immediately;
/// network errors back off linearly, as the upstream API tooling does.
async fn fetch_with_retry<S>(
    source: &S,
    spec: &LayerSpec,
    bbox: Option<&BoundingBox>,
    start_index: u64,
    config: &RetrievalConfig,
    summary: &mut FetchSummary,
) -> Result<FeaturePage, RetrievalError>
where
    S: PageSource + ?Sized,
{
    let query = PageQuery {
        spec,
        bbox,
        start_index,
        count: config.page_size,
    };
    let mut attempt = 0u32;
    loop {
        summary.requests += 1;
        match source.fetch_page(query).await {
            Ok(page) => {
                log::debug!(
                    "layer {}: offset {start_index} returned {} features (total hint {:?})",
                    spec.name,
                    page.len(),
                    page.total_hint
                );
                return Ok(page);
            }
            Err(err) if err.is_retryable() && attempt < config.retries => {
                attempt += 1;
                let wait = config.retry_backoff * attempt;
                log::warn!(
                    "layer {}: {err}; retrying in {wait:?} ({attempt}/{})",
                    spec.name,
                    config.retries
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn finish(accumulator: FeatureAccumulator, summary: &mut FetchSummary) -> Vec<RawFeature> {
    let (features, duplicates, mismatches) = accumulator.into_parts();
    summary.duplicates_discarded = duplicates;
    summary.attribute_mismatches = mismatches;
    features
}
