// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for wall boundary reconstruction

use std::fmt;
use std::str::FromStr;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::extract::ExtractionStats;

/// A 2D point in page units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_nalgebra(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Vector from `self` to `other`
    pub fn vector_to(&self, other: &Point2D) -> Vector2<f64> {
        Vector2::new(other.x - self.x, other.y - self.y)
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        self.distance_sq_to(other).sqrt()
    }

    pub fn distance_sq_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Stroke color with channels in `0.0..=1.0`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Brightest channel; a color is "dark" when this is small
    pub fn max_channel(&self) -> f64 {
        self.r.max(self.g).max(self.b)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a box from two corners in any order.
    pub fn new(a: Point2D, b: Point2D) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    /// Bounding box of a point set, `None` when empty.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point2D>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::new(*first, *first);
        for p in iter {
            bbox.include(p);
        }
        Some(bbox)
    }

    pub fn include(&mut self, p: &Point2D) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Grows the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// True if the boxes overlap or touch.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Area of the overlap rectangle, 0.0 when disjoint or merely touching.
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        if min_x >= max_x || min_y >= max_y {
            return 0.0;
        }
        (max_x - min_x) * (max_y - min_y)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }
}

/// Raw drawing command kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathCommand {
    /// Starts a new subpath at `points[0]`
    Move,
    /// `[start, end]`, or `[end]` continuing from the current point
    Line,
    /// Quadratic `[p0, c, p1]` or cubic `[p0, c0, c1, p1]` Bézier
    Curve,
    /// Two opposite corners
    Rect,
    /// Closes the current subpath back to its start
    Close,
}

/// One raw drawing command as emitted by the document parser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Primitive {
    pub command: PathCommand,
    #[serde(default)]
    pub points: Vec<Point2D>,
    /// `None` for pure fills
    #[serde(default)]
    pub stroke_color: Option<Rgb>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default)]
    pub filled: bool,
}

impl Primitive {
    pub fn new(command: PathCommand, points: Vec<Point2D>) -> Self {
        Self {
            command,
            points,
            stroke_color: Some(Rgb::BLACK),
            stroke_width: 1.0,
            filled: false,
        }
    }

    pub fn move_to(p: Point2D) -> Self {
        Self::new(PathCommand::Move, vec![p])
    }

    pub fn line(a: Point2D, b: Point2D) -> Self {
        Self::new(PathCommand::Line, vec![a, b])
    }

    pub fn line_to(p: Point2D) -> Self {
        Self::new(PathCommand::Line, vec![p])
    }

    pub fn curve(points: Vec<Point2D>) -> Self {
        Self::new(PathCommand::Curve, points)
    }

    pub fn rect(a: Point2D, b: Point2D) -> Self {
        Self::new(PathCommand::Rect, vec![a, b])
    }

    pub fn close() -> Self {
        Self::new(PathCommand::Close, Vec::new())
    }

    pub fn with_stroke(mut self, color: Option<Rgb>, width: f64) -> Self {
        self.stroke_color = color;
        self.stroke_width = width;
        self
    }

    pub fn with_fill(mut self, filled: bool) -> Self {
        self.filled = filled;
        self
    }
}

/// Which primitive kind produced a segment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SegmentOrigin {
    Line,
    Curve,
    Rect,
    Close,
}

/// Straight wall-like stroke, the atomic graph edge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: Point2D,
    pub end: Point2D,
    pub stroke_color: Rgb,
    pub stroke_width: f64,
    /// Index of the source primitive in the input slice
    pub source_id: usize,
    pub origin: SegmentOrigin,
}

impl Segment {
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }
}

/// Final classification of a boundary loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum WallLabel {
    ExteriorOuter,
    ExteriorInner,
    Interior,
    Garage,
}

impl WallLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WallLabel::ExteriorOuter => "exterior-outer",
            WallLabel::ExteriorInner => "exterior-inner",
            WallLabel::Interior => "interior",
            WallLabel::Garage => "garage",
        }
    }

    /// Labels that at most one boundary per page may carry
    pub fn is_exclusive(&self) -> bool {
        matches!(self, WallLabel::ExteriorOuter | WallLabel::ExteriorInner)
    }
}

impl fmt::Display for WallLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a hint label does not name a known wall class
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown wall label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for WallLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '_' | ' ' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "exterior-outer" | "outer" | "exterior" => Ok(WallLabel::ExteriorOuter),
            "exterior-inner" | "inner" => Ok(WallLabel::ExteriorInner),
            "interior" | "interior-wall" | "interior-walls" => Ok(WallLabel::Interior),
            "garage" | "garage-wall" => Ok(WallLabel::Garage),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}

/// Whether a label came from geometry or from a matched hint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LabelSource {
    Geometry,
    Hint,
}

/// Externally supplied approximate region with a semantic label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hint {
    pub label: String,
    pub region: BoundingBox,
    #[serde(default = "default_source_confidence")]
    pub source_confidence: f64,
}

fn default_source_confidence() -> f64 {
    1.0
}

impl Hint {
    pub fn new(label: impl Into<String>, region: BoundingBox) -> Self {
        Self {
            label: label.into(),
            region,
            source_confidence: 1.0,
        }
    }
}

/// Maps hint coordinates (e.g. raster pixels) into page units
///
/// Applied as `scale`, then optional Y flip against `flip_y_height`, then `offset`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HintTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Page height to flip against (top-left origin → bottom-left origin)
    pub flip_y_height: Option<f64>,
}

impl Default for HintTransform {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            flip_y_height: None,
        }
    }
}

impl HintTransform {
    /// Pixel space of a rendered page image → page points.
    pub fn from_image_to_page(
        image_width: f64,
        image_height: f64,
        page_width: f64,
        page_height: f64,
    ) -> Self {
        let scale = |page: f64, image: f64| if image > 0.0 { page / image } else { 1.0 };
        Self {
            scale_x: scale(page_width, image_width),
            scale_y: scale(page_height, image_height),
            ..Default::default()
        }
    }

    pub fn apply_point(&self, p: &Point2D) -> Point2D {
        let x = p.x * self.scale_x;
        let mut y = p.y * self.scale_y;
        if let Some(height) = self.flip_y_height {
            y = height - y;
        }
        Point2D::new(x + self.offset_x, y + self.offset_y)
    }

    pub fn apply_box(&self, bbox: &BoundingBox) -> BoundingBox {
        let a = self.apply_point(&Point2D::new(bbox.min_x, bbox.min_y));
        let b = self.apply_point(&Point2D::new(bbox.max_x, bbox.max_y));
        BoundingBox::new(a, b)
    }
}

/// Page-level facts from the floor analysis collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageMetadata {
    /// Opaque floor type label (e.g. "main_floor"), passed through untouched
    #[serde(default)]
    pub floor_type: Option<String>,
    #[serde(default)]
    pub has_garage: bool,
    /// Garage location, in hint coordinates
    #[serde(default)]
    pub garage_region: Option<BoundingBox>,
}

/// Everything the vision collaborator provides for one page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HintInput {
    #[serde(default)]
    pub hints: Vec<Hint>,
    #[serde(default)]
    pub metadata: PageMetadata,
    #[serde(default)]
    pub transform: HintTransform,
}

/// A boundary loop with its final label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedBoundary {
    pub label: WallLabel,
    /// Counter-clockwise ring, first point not repeated
    pub polygon: Vec<Point2D>,
    pub point_count: usize,
    pub perimeter: f64,
    pub area: f64,
    pub bounds: BoundingBox,
    /// Confidence in `label`, `0.0..=1.0`
    pub score: f64,
    pub source: LabelSource,
    /// Excluded from ranking by percentile trimming
    pub outlier: bool,
}

/// Counters describing what each stage did with the input
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Diagnostics {
    pub extraction: ExtractionStats,
    pub node_count: usize,
    pub edge_count: usize,
    /// Segments whose endpoints snapped to the same node
    pub collapsed_segments: usize,
    pub duplicate_edges: usize,
    /// Nodes added where two wall strokes cross
    pub crossings: usize,
    pub t_junction_splits: usize,
    pub dangling_nodes: usize,
    pub loops_traced: usize,
    pub degenerate_loops: usize,
    pub self_intersecting_loops: usize,
    /// False when no loop spans the page extent and the outer pick is a guess
    pub outer_spans_extent: bool,
    /// Loops nested in the outer boundary competing for exterior-inner
    pub inner_candidates: usize,
    pub hints_applied: usize,
    pub hints_ignored: usize,
}

impl Diagnostics {
    /// More than one plausible exterior-inner boundary was found.
    pub fn inner_is_ambiguous(&self) -> bool {
        self.inner_candidates > 1
    }
}

/// Result of tracing one page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TraceOutput {
    pub boundaries: Vec<ClassifiedBoundary>,
    /// Filtered segments, unmodified, for the drawing writer
    pub segments: Vec<Segment>,
    pub metadata: Option<PageMetadata>,
    pub diagnostics: Diagnostics,
}

impl TraceOutput {
    /// No boundaries were found on the page.
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn with_label(&self, label: WallLabel) -> impl Iterator<Item = &ClassifiedBoundary> {
        self.boundaries.iter().filter(move |b| b.label == label)
    }

    pub fn exterior_outer(&self) -> Option<&ClassifiedBoundary> {
        self.with_label(WallLabel::ExteriorOuter).next()
    }

    pub fn exterior_inner(&self) -> Option<&ClassifiedBoundary> {
        self.with_label(WallLabel::ExteriorInner).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_intersection_area() {
        let a = BoundingBox::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0));
        let b = BoundingBox::new(Point2D::new(5.0, 5.0), Point2D::new(20.0, 20.0));
        assert!((a.intersection_area(&b) - 25.0).abs() < 1e-9);

        let touching = BoundingBox::new(Point2D::new(10.0, 0.0), Point2D::new(20.0, 10.0));
        assert_eq!(a.intersection_area(&touching), 0.0);
        assert!(a.intersects(&touching));
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("exterior-outer".parse(), Ok(WallLabel::ExteriorOuter));
        assert_eq!("Exterior_Inner".parse(), Ok(WallLabel::ExteriorInner));
        assert_eq!("garage wall".parse(), Ok(WallLabel::Garage));
        assert!("roof".parse::<WallLabel>().is_err());
    }

    #[test]
    fn test_hint_transform_image_to_page() {
        let t = HintTransform::from_image_to_page(2000.0, 1000.0, 1000.0, 500.0);
        let bbox = BoundingBox::new(Point2D::new(200.0, 100.0), Point2D::new(400.0, 300.0));
        let mapped = t.apply_box(&bbox);
        assert!((mapped.min_x - 100.0).abs() < 1e-9);
        assert!((mapped.max_y - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_hint_transform_flip() {
        let t = HintTransform {
            flip_y_height: Some(100.0),
            ..Default::default()
        };
        let mapped = t.apply_box(&BoundingBox::new(
            Point2D::new(0.0, 10.0),
            Point2D::new(5.0, 30.0),
        ));
        assert_eq!(mapped.min_y, 70.0);
        assert_eq!(mapped.max_y, 90.0);
    }

    #[test]
    fn test_label_serde_kebab_case() {
        let json = serde_json::to_string(&WallLabel::ExteriorInner).unwrap();
        assert_eq!(json, "\"exterior-inner\"");
    }
}
