//! Axis-aligned bounding boxes and grid subdivision.
//!
//! A [`BoundingBox`] restricts a spatial query to a rectangle in the
//! layer's request coordinate reference system. Overfull regions are
//! subdivided with [`BoundingBox::split`] into an exact tiling: children
//! share interior edges bitwise and reuse the parent's outer bounds, so
//! the union covers the parent with no gaps and no overlap beyond the
//! shared edges.

use std::fmt;

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grid granularity used when subdividing a bounding box.
///
/// `Quarters` splits both axes in half (2×2 grid); `Ninths` splits both
/// axes into thirds (3×3 grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitFactor {
    /// 2×2 grid, four children.
    Quarters,
    /// 3×3 grid, nine children.
    Ninths,
}

impl SplitFactor {
    /// Number of divisions per axis.
    #[must_use]
    pub const fn divisions(self) -> usize {
        match self {
            Self::Quarters => 2,
            Self::Ninths => 3,
        }
    }

    /// Total number of children produced by one split.
    #[must_use]
    pub const fn child_count(self) -> usize {
        match self {
            Self::Quarters => 4,
            Self::Ninths => 9,
        }
    }
}

/// Errors returned by [`BoundingBox::new`] and [`BoundingBox::split`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoundingBoxError {
    /// A bound was NaN or infinite.
    #[error("bounding box bounds must be finite")]
    NonFinite,
    /// A minimum exceeded the corresponding maximum.
    #[error("bounding box minimum exceeds maximum on the {axis} axis")]
    Inverted {
        /// Offending axis, `"x"` or `"y"`.
        axis: &'static str,
    },
    /// The box has zero area and cannot be subdivided.
    #[error("cannot split degenerate bounding box {bbox}")]
    Degenerate {
        /// The zero-area box the caller attempted to split.
        bbox: BoundingBox,
    },
}

/// Axis-aligned rectangle `(min_x, min_y, max_x, max_y)`.
///
/// The coordinate reference system is carried alongside, not inside, the
/// box: the same bounds type serves EPSG:5186 metres and EPSG:4326
/// degrees.
///
/// # Examples
///
/// ```
/// use vworld_core::BoundingBox;
///
/// # fn main() -> Result<(), vworld_core::BoundingBoxError> {
/// let bbox = BoundingBox::new(144_693.0, 477_383.0, 275_745.0, 633_107.0)?;
/// assert!(bbox.width() > 0.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western bound.
    pub min_x: f64,
    /// Southern bound.
    pub min_y: f64,
    /// Eastern bound.
    pub max_x: f64,
    /// Northern bound.
    pub max_y: f64,
}

impl BoundingBox {
    /// Validates and constructs a [`BoundingBox`].
    ///
    /// Zero-width or zero-height boxes are accepted here; only
    /// [`BoundingBox::split`] rejects them.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, BoundingBoxError> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(BoundingBoxError::NonFinite);
        }
        if min_x > max_x {
            return Err(BoundingBoxError::Inverted { axis: "x" });
        }
        if min_y > max_y {
            return Err(BoundingBoxError::Inverted { axis: "y" });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Extent along the x axis.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Extent along the y axis.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Smaller of the two axis extents.
    ///
    /// The orchestrator compares this against the configured minimum
    /// splittable extent to decide whether further subdivision can make
    /// progress.
    #[must_use]
    pub fn min_extent(&self) -> f64 {
        self.width().min(self.height())
    }

    /// Whether the box encloses zero area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    /// Whether the point lies inside the box, edges inclusive.
    ///
    /// Edge inclusivity matters: a feature sitting on a shared split edge
    /// is returned by every sibling whose box touches it, which is what
    /// the deduplicating merge downstream expects.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// View the box as a [`geo::Rect`].
    #[must_use]
    pub fn as_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }

    /// Subdivide into an ordered grid of child boxes.
    ///
    /// Children walk columns west to east, rows south to north within
    /// each column. Interior edges are computed once and shared between
    /// neighbours, so adjacent children agree bitwise on their common
    /// bound and the outermost children reuse the parent's bounds exactly.
    ///
    /// # Errors
    ///
    /// Returns [`BoundingBoxError::Degenerate`] for a zero-area box; the
    /// caller must never ask to split a region it cannot shrink.
    pub fn split(&self, factor: SplitFactor) -> Result<Vec<Self>, BoundingBoxError> {
        if self.is_degenerate() {
            return Err(BoundingBoxError::Degenerate { bbox: *self });
        }
        let n = factor.divisions();
        let x_edges = axis_edges(self.min_x, self.max_x, n);
        let y_edges = axis_edges(self.min_y, self.max_y, n);

        let mut children = Vec::with_capacity(factor.child_count());
        for i in 0..n {
            for j in 0..n {
                children.push(Self {
                    min_x: x_edges[i],
                    min_y: y_edges[j],
                    max_x: x_edges[i + 1],
                    max_y: y_edges[j + 1],
                });
            }
        }
        Ok(children)
    }
}

/// Interior edge positions for one axis, endpoints pinned to the inputs.
fn axis_edges(min: f64, max: f64, divisions: usize) -> Vec<f64> {
    let span = max - min;
    let mut edges = Vec::with_capacity(divisions + 1);
    edges.push(min);
    for i in 1..divisions {
        edges.push(min + span * (i as f64) / (divisions as f64));
    }
    edges.push(max);
    edges
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid box")
    }

    #[rstest]
    #[case(f64::NAN, 0.0, 1.0, 1.0)]
    #[case(0.0, f64::INFINITY, 1.0, 1.0)]
    fn rejects_non_finite_bounds(
        #[case] min_x: f64,
        #[case] min_y: f64,
        #[case] max_x: f64,
        #[case] max_y: f64,
    ) {
        let err = BoundingBox::new(min_x, min_y, max_x, max_y).expect_err("should reject");
        assert_eq!(err, BoundingBoxError::NonFinite);
    }

    #[rstest]
    fn rejects_inverted_bounds() {
        let err = BoundingBox::new(2.0, 0.0, 1.0, 1.0).expect_err("should reject");
        assert_eq!(err, BoundingBoxError::Inverted { axis: "x" });
    }

    #[rstest]
    #[case(SplitFactor::Quarters, 4)]
    #[case(SplitFactor::Ninths, 9)]
    fn split_produces_expected_child_count(#[case] factor: SplitFactor, #[case] expected: usize) {
        let children = unit_box().split(factor).expect("should split");
        assert_eq!(children.len(), expected);
    }

    #[rstest]
    fn split_rejects_degenerate_box() {
        let flat = BoundingBox::new(0.0, 0.0, 1.0, 0.0).expect("valid box");
        let err = flat.split(SplitFactor::Quarters).expect_err("should reject");
        assert!(matches!(err, BoundingBoxError::Degenerate { .. }));
    }

    #[rstest]
    fn quarters_share_interior_edges_exactly() {
        let parent = BoundingBox::new(0.1, 0.1, 0.3, 0.3).expect("valid box");
        let children = parent.split(SplitFactor::Quarters).expect("should split");

        // Column-major: children[0] and children[2] are horizontal neighbours.
        assert_eq!(children[0].max_x, children[2].min_x);
        assert_eq!(children[0].max_y, children[1].min_y);
        // Outer bounds reuse the parent's values bitwise.
        assert_eq!(children[0].min_x, parent.min_x);
        assert_eq!(children[3].max_x, parent.max_x);
        assert_eq!(children[3].max_y, parent.max_y);
    }

    #[rstest]
    fn split_preserves_seoul_gyeonggi_extent() {
        let parent = BoundingBox::new(144_693.0, 477_383.0, 275_745.0, 633_107.0)
            .expect("valid box");
        let children = parent.split(SplitFactor::Ninths).expect("should split");

        let min_x = children.iter().map(|c| c.min_x).fold(f64::MAX, f64::min);
        let max_y = children.iter().map(|c| c.max_y).fold(f64::MIN, f64::max);
        assert_eq!(min_x, parent.min_x);
        assert_eq!(max_y, parent.max_y);
    }

    #[rstest]
    fn contains_includes_edges() {
        let bbox = unit_box();
        assert!(bbox.contains(0.0, 0.5));
        assert!(bbox.contains(1.0, 1.0));
        assert!(!bbox.contains(1.0 + f64::EPSILON * 2.0, 0.5));
    }

    proptest! {
        /// Coverage: for any box and factor, the children tile the parent
        /// exactly. Interior edges are shared bitwise between neighbours
        /// and the summed child area equals the parent area.
        #[test]
        fn split_children_tile_parent(
            min_x in -1.0e6_f64..1.0e6,
            min_y in -1.0e6_f64..1.0e6,
            width in 1.0e-3_f64..1.0e6,
            height in 1.0e-3_f64..1.0e6,
            quarters in proptest::bool::ANY,
        ) {
            let factor = if quarters { SplitFactor::Quarters } else { SplitFactor::Ninths };
            let parent = BoundingBox::new(min_x, min_y, min_x + width, min_y + height)
                .expect("valid box");
            let children = parent.split(factor).expect("should split");
            let n = factor.divisions();

            for (index, child) in children.iter().enumerate() {
                prop_assert!(child.min_x < child.max_x);
                prop_assert!(child.min_y < child.max_y);
                // Horizontal neighbour shares the x edge bitwise.
                if index + n < children.len() {
                    prop_assert_eq!(child.max_x, children[index + n].min_x);
                }
                // Vertical neighbour within the column shares the y edge.
                if (index + 1) % n != 0 {
                    prop_assert_eq!(child.max_y, children[index + 1].min_y);
                }
            }

            prop_assert_eq!(children[0].min_x, parent.min_x);
            prop_assert_eq!(children[0].min_y, parent.min_y);
            prop_assert_eq!(children[children.len() - 1].max_x, parent.max_x);
            prop_assert_eq!(children[children.len() - 1].max_y, parent.max_y);

            let parent_area = parent.width() * parent.height();
            let child_area: f64 = children.iter().map(|c| c.width() * c.height()).sum();
            let tolerance = parent_area * 1.0e-9;
            prop_assert!((parent_area - child_area).abs() <= tolerance);
        }
    }
}
