// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric classification of traced loops.
//!
//! Loops are ranked by a composite size metric, `perimeter × sqrt(points)`.
//! The top-ranked loop that spans the page extent becomes the exterior-outer
//! boundary; when stray marks stretch the extent, the span test falls back to
//! the building bounds, which drop the extreme percentiles of segment endpoint
//! coordinates. The best-ranked loop nested inside the outer one becomes
//! exterior-inner. Loops lying mostly outside the building bounds are treated
//! as annotation outliers. Everything else is interior, or garage when page
//! metadata places a garage over it. Classification is total: every loop
//! receives exactly one label.

use rayon::prelude::*;

use crate::config::TraceConfig;
use crate::polygon_ops::contains_ring;
use crate::tracer::BoundaryLoop;
use crate::types::{
    BoundingBox, ClassifiedBoundary, HintTransform, LabelSource, PageMetadata, Point2D, WallLabel,
};

/// Score for plain interior loops
const INTERIOR_SCORE: f64 = 0.8;
/// Score for loops relabeled through the garage region
const GARAGE_SCORE: f64 = 0.7;
/// Score for loops lying outside the building bounds
const OUTLIER_SCORE: f64 = 0.1;
/// A loop with less than this share of its bbox inside the building bounds
/// is an outlier
const OUTLIER_INSIDE_SHARE: f64 = 0.5;
/// Outer score multiplier when no loop spans the page extent
const NON_SPANNING_PENALTY: f64 = 0.5;
/// Nested loops whose metric reaches this share of the chosen inner loop's
/// metric compete with it for exterior-inner
const INNER_COMPETITION_RATIO: f64 = 0.9;

/// Page context for one classification pass
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    /// Bounding box of all retained segments
    pub extent: BoundingBox,
    /// Segment endpoint bounds with percentile extremes trimmed, see
    /// [`building_bounds`]
    pub building: BoundingBox,
    pub metadata: Option<&'a PageMetadata>,
    /// Maps the metadata garage region into page units
    pub transform: HintTransform,
}

/// Classified loops plus what the classifier had to guess at
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// One entry per input loop, in input order
    pub boundaries: Vec<ClassifiedBoundary>,
    pub outer_spans_extent: bool,
    /// Nested loops that could plausibly be exterior-inner
    pub inner_candidates: usize,
}

/// Size metric for ranking loops
pub fn composite_metric(boundary: &BoundaryLoop) -> f64 {
    boundary.perimeter * (boundary.point_count as f64).sqrt()
}

/// True if `bounds` reaches every side of `extent` within `tolerance`.
pub fn spans_extent(bounds: &BoundingBox, extent: &BoundingBox, tolerance: f64) -> bool {
    (bounds.min_x - extent.min_x).abs() <= tolerance
        && (bounds.min_y - extent.min_y).abs() <= tolerance
        && (bounds.max_x - extent.max_x).abs() <= tolerance
        && (bounds.max_y - extent.max_y).abs() <= tolerance
}

/// Labels every loop.
pub fn classify_loops(
    loops: &[BoundaryLoop],
    page: &PageContext<'_>,
    config: &TraceConfig,
) -> Classification {
    if loops.is_empty() {
        return Classification::default();
    }

    let metrics: Vec<f64> = loops.par_iter().map(composite_metric).collect();

    // Highest metric first; ties prefer more points, then the earlier loop
    let mut ranked: Vec<usize> = (0..loops.len()).collect();
    ranked.sort_by(|&a, &b| {
        metrics[b]
            .total_cmp(&metrics[a])
            .then(loops[b].point_count.cmp(&loops[a].point_count))
            .then(a.cmp(&b))
    });

    let extent = page.extent;
    let tolerance = config.span_tolerance(extent.width(), extent.height());
    let coverage = |i: usize| {
        let area = extent.area();
        if area > 0.0 {
            (loops[i].bounds.area() / area).clamp(0.0, 1.0)
        } else {
            0.0
        }
    };

    let spanning = [extent, page.building].into_iter().find_map(|target| {
        ranked
            .iter()
            .copied()
            .find(|&i| spans_extent(&loops[i].bounds, &target, tolerance))
    });
    let outer_spans_extent = spanning.is_some();

    let building = page.building.expand(tolerance);
    let outlier: Vec<bool> = loops
        .iter()
        .enumerate()
        .map(|(i, l)| Some(i) != spanning && is_outside(&l.bounds, &building))
        .collect();
    let trimmed = outlier.iter().filter(|&&o| o).count();
    if trimmed > 0 {
        tracing::debug!(trimmed, loops = loops.len(), "Trimmed outlier loops");
    }
    ranked.retain(|&i| !outlier[i]);

    let outer = spanning.or_else(|| ranked.first().copied());

    let mut labels = vec![(WallLabel::Interior, INTERIOR_SCORE); loops.len()];
    let mut inner_candidates = 0;

    if let Some(outer) = outer {
        let score = if outer_spans_extent {
            coverage(outer)
        } else {
            tracing::warn!(
                tolerance,
                candidates = ranked.len(),
                "No loop spans the page extent; using the largest as exterior outer"
            );
            coverage(outer) * NON_SPANNING_PENALTY
        };
        labels[outer] = (WallLabel::ExteriorOuter, score);

        let outer_ring = &loops[outer].polygon;
        let nested: Vec<usize> = ranked
            .iter()
            .copied()
            .filter(|&i| i != outer)
            .filter(|&i| contains_ring(outer_ring, &loops[i].polygon, config.snap_tolerance))
            .collect();

        if let Some(&inner) = nested.first() {
            let threshold = metrics[inner] * INNER_COMPETITION_RATIO;
            inner_candidates = nested.iter().filter(|&&i| metrics[i] >= threshold).count();
            if inner_candidates > 1 {
                tracing::warn!(
                    inner_candidates,
                    "Several nested loops compete for exterior inner; keeping the largest"
                );
            }

            let outer_area = loops[outer].area();
            let score = if outer_area > 0.0 {
                (loops[inner].area() / outer_area).clamp(0.0, 1.0)
            } else {
                0.0
            };
            labels[inner] = (WallLabel::ExteriorInner, score);
        }
    }

    if let Some(region) = garage_region(page, tolerance) {
        let mut garages = 0;
        for (i, boundary) in loops.iter().enumerate() {
            let interior = !outlier[i] && labels[i].0 == WallLabel::Interior;
            if interior && boundary.bounds.intersects(&region) {
                labels[i] = (WallLabel::Garage, GARAGE_SCORE);
                garages += 1;
            }
        }
        tracing::debug!(garages, "Applied garage region");
    }

    let boundaries = loops
        .iter()
        .zip(labels)
        .enumerate()
        .map(|(i, (boundary, (label, score)))| ClassifiedBoundary {
            label,
            polygon: boundary.polygon.clone(),
            point_count: boundary.point_count,
            perimeter: boundary.perimeter,
            area: boundary.area(),
            bounds: boundary.bounds,
            score: if outlier[i] { OUTLIER_SCORE } else { score },
            source: LabelSource::Geometry,
            outlier: outlier[i],
        })
        .collect();

    Classification {
        boundaries,
        outer_spans_extent,
        inner_candidates,
    }
}

/// Bounds of `points` after dropping the `floor(n × percentile)` lowest and
/// highest coordinates on each axis.
///
/// Dimension strings and title-block marks sit at the far edges of a sheet,
/// so the trimmed box follows the building rather than the annotations.
/// Returns `None` for an empty set.
pub fn building_bounds<'a>(
    points: impl IntoIterator<Item = &'a Point2D>,
    percentile: f64,
) -> Option<BoundingBox> {
    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = points.into_iter().map(|p| (p.x, p.y)).unzip();
    let n = xs.len();
    if n == 0 {
        return None;
    }
    xs.sort_by(f64::total_cmp);
    ys.sort_by(f64::total_cmp);

    let mut trim = (n as f64 * percentile).floor() as usize;
    if 2 * trim >= n {
        trim = 0;
    }
    let last = n - 1 - trim;
    Some(BoundingBox {
        min_x: xs[trim],
        min_y: ys[trim],
        max_x: xs[last],
        max_y: ys[last],
    })
}

/// True if most of `bounds` lies outside `building`.
fn is_outside(bounds: &BoundingBox, building: &BoundingBox) -> bool {
    let area = bounds.area();
    if area <= 0.0 {
        return !building.intersects(bounds);
    }
    bounds.intersection_area(building) < area * OUTLIER_INSIDE_SHARE
}

/// Garage region in page units, grown by the span tolerance.
fn garage_region(page: &PageContext<'_>, tolerance: f64) -> Option<BoundingBox> {
    let metadata = page.metadata?;
    if !metadata.has_garage {
        return None;
    }
    let region = page.transform.apply_box(metadata.garage_region.as_ref()?);
    region.is_finite().then(|| region.expand(tolerance))
}
