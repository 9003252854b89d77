// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segment extraction: raw path primitives → straight wall-like segments
//!
//! Walls in architectural PDFs are dark, reasonably heavy strokes. Dimension
//! lines, hatching and text leaders are thin or colored, and fills carry no
//! outline at all. This module keeps the former and drops the latter, expanding
//! rectangles and flattening curves on the way so that every later stage only
//! deals with straight segments.
//!
//! The pen (current point and subpath start) is tracked sequentially in a cheap
//! first pass; flattening and filtering then run per primitive in parallel.

use nalgebra::Vector2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TraceConfig;
use crate::types::{PathCommand, Point2D, Primitive, Rgb, Segment, SegmentOrigin};

/// Upper bound on chords per curve, whatever the tolerance
const MAX_CURVE_SEGMENTS: usize = 256;

/// Statistics from the extraction stage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractionStats {
    pub primitives: usize,
    pub moves: usize,
    pub lines: usize,
    pub curves: usize,
    pub rectangles: usize,
    pub closes: usize,
    /// Drawing primitives that passed the stroke filter
    pub retained: usize,
    pub skipped_fill: usize,
    pub skipped_color: usize,
    pub skipped_width: usize,
    pub malformed: usize,
    pub segments: usize,
}

/// Result of the extraction stage
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub segments: Vec<Segment>,
    pub stats: ExtractionStats,
}

#[derive(Debug, Clone, Copy, Default)]
struct Pen {
    current: Option<Point2D>,
    subpath_start: Option<Point2D>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Fill,
    Color,
    Width,
    Malformed,
}

/// Extract wall segments from raw primitives.
///
/// Malformed primitives are skipped one at a time and counted; they never stop
/// extraction of the rest.
pub fn extract_segments(primitives: &[Primitive], config: &TraceConfig) -> ExtractionResult {
    let mut stats = ExtractionStats {
        primitives: primitives.len(),
        ..Default::default()
    };

    let pens = resolve_pens(primitives);

    let outcomes: Vec<Result<Vec<Segment>, Skip>> = primitives
        .par_iter()
        .zip(pens.par_iter())
        .enumerate()
        .map(|(id, (primitive, pen))| primitive_segments(id, primitive, pen, config))
        .collect();

    let mut segments = Vec::new();
    for (primitive, outcome) in primitives.iter().zip(outcomes) {
        match primitive.command {
            PathCommand::Move => stats.moves += 1,
            PathCommand::Line => stats.lines += 1,
            PathCommand::Curve => stats.curves += 1,
            PathCommand::Rect => stats.rectangles += 1,
            PathCommand::Close => stats.closes += 1,
        }

        match outcome {
            Ok(mut produced) => {
                if primitive.command != PathCommand::Move {
                    stats.retained += 1;
                }
                segments.append(&mut produced);
            }
            Err(Skip::Fill) => stats.skipped_fill += 1,
            Err(Skip::Color) => stats.skipped_color += 1,
            Err(Skip::Width) => stats.skipped_width += 1,
            Err(Skip::Malformed) => stats.malformed += 1,
        }
    }
    stats.segments = segments.len();

    tracing::debug!(
        primitives = stats.primitives,
        retained = stats.retained,
        segments = stats.segments,
        malformed = stats.malformed,
        skipped_fill = stats.skipped_fill,
        skipped_color = stats.skipped_color,
        skipped_width = stats.skipped_width,
        "Extracted wall segments"
    );

    ExtractionResult { segments, stats }
}

/// Pen state in effect *before* each primitive.
fn resolve_pens(primitives: &[Primitive]) -> Vec<Pen> {
    let mut pens = Vec::with_capacity(primitives.len());
    let mut pen = Pen::default();

    for primitive in primitives {
        pens.push(pen);

        let first = primitive.points.first().copied().filter(Point2D::is_finite);
        let last = primitive.points.last().copied().filter(Point2D::is_finite);

        match primitive.command {
            PathCommand::Move | PathCommand::Rect => {
                if let Some(p) = first {
                    pen.current = Some(p);
                    pen.subpath_start = Some(p);
                }
            }
            PathCommand::Line | PathCommand::Curve => {
                if pen.subpath_start.is_none() || pen.current.is_none() {
                    pen.subpath_start = first;
                }
                if last.is_some() {
                    pen.current = last;
                }
            }
            PathCommand::Close => {
                pen.current = pen.subpath_start;
            }
        }
    }

    pens
}

fn passes_stroke_filter(primitive: &Primitive, config: &TraceConfig) -> Result<Rgb, Skip> {
    let color = match primitive.stroke_color {
        Some(color) => color,
        None => return Err(Skip::Fill),
    };
    if !primitive.stroke_width.is_finite() || primitive.stroke_width <= 0.0 {
        return Err(if primitive.filled { Skip::Fill } else { Skip::Width });
    }
    if color.max_channel() > config.max_stroke_darkness {
        return Err(Skip::Color);
    }
    if primitive.stroke_width < config.min_stroke_width {
        return Err(Skip::Width);
    }
    Ok(color)
}

fn primitive_segments(
    id: usize,
    primitive: &Primitive,
    pen: &Pen,
    config: &TraceConfig,
) -> Result<Vec<Segment>, Skip> {
    let points = &primitive.points;

    if primitive.command == PathCommand::Move {
        return match points.first() {
            Some(p) if p.is_finite() => Ok(Vec::new()),
            _ => Err(Skip::Malformed),
        };
    }

    let color = passes_stroke_filter(primitive, config)?;

    if !points.iter().all(Point2D::is_finite) {
        return Err(Skip::Malformed);
    }

    let make = |start: Point2D, end: Point2D, origin: SegmentOrigin| Segment {
        start,
        end,
        stroke_color: color,
        stroke_width: primitive.stroke_width,
        source_id: id,
        origin,
    };

    let chain: Vec<Point2D> = match primitive.command {
        PathCommand::Line => match points.as_slice() {
            [a, b] => vec![*a, *b],
            [b] => vec![pen.current.ok_or(Skip::Malformed)?, *b],
            _ => return Err(Skip::Malformed),
        },
        PathCommand::Curve => match points.as_slice() {
            [p0, c, p1] => flatten_quadratic(*p0, *c, *p1, config.flatten_tolerance),
            [p0, c0, c1, p1] => flatten_cubic(*p0, *c0, *c1, *p1, config.flatten_tolerance),
            _ => return Err(Skip::Malformed),
        },
        PathCommand::Rect => match points.as_slice() {
            [a, b] => vec![
                *a,
                Point2D::new(b.x, a.y),
                *b,
                Point2D::new(a.x, b.y),
                *a,
            ],
            _ => return Err(Skip::Malformed),
        },
        PathCommand::Close => match (pen.current, pen.subpath_start) {
            (Some(current), Some(start)) => vec![current, start],
            _ => return Err(Skip::Malformed),
        },
        PathCommand::Move => return Ok(Vec::new()),
    };

    let origin = match primitive.command {
        PathCommand::Curve => SegmentOrigin::Curve,
        PathCommand::Rect => SegmentOrigin::Rect,
        PathCommand::Close => SegmentOrigin::Close,
        _ => SegmentOrigin::Line,
    };

    Ok(chain
        .windows(2)
        .filter(|w| w[0] != w[1])
        .map(|w| make(w[0], w[1], origin))
        .collect())
}

/// Chord count so that uniform-parameter chords stay within `tolerance` of a
/// curve whose second derivative is bounded by `max_second_derivative`.
fn chord_count(max_second_derivative: f64, tolerance: f64) -> usize {
    let n = (max_second_derivative / (8.0 * tolerance)).sqrt().ceil();
    if n.is_finite() {
        (n as usize).clamp(1, MAX_CURVE_SEGMENTS)
    } else {
        MAX_CURVE_SEGMENTS
    }
}

/// Flatten a quadratic Bézier into a point chain (endpoints included).
pub fn flatten_quadratic(p0: Point2D, c: Point2D, p1: Point2D, tolerance: f64) -> Vec<Point2D> {
    let (a, b, d) = (p0.to_nalgebra().coords, c.to_nalgebra().coords, p1.to_nalgebra().coords);
    let second = 2.0 * (a - 2.0 * b + d).norm();
    let n = chord_count(second, tolerance);

    let eval = |t: f64| -> Vector2<f64> {
        let mt = 1.0 - t;
        a * (mt * mt) + b * (2.0 * mt * t) + d * (t * t)
    };
    sample(n, eval, p0, p1)
}

/// Flatten a cubic Bézier into a point chain (endpoints included).
pub fn flatten_cubic(
    p0: Point2D,
    c0: Point2D,
    c1: Point2D,
    p1: Point2D,
    tolerance: f64,
) -> Vec<Point2D> {
    let a = p0.to_nalgebra().coords;
    let b = c0.to_nalgebra().coords;
    let c = c1.to_nalgebra().coords;
    let d = p1.to_nalgebra().coords;
    let second = 6.0 * (a - 2.0 * b + c).norm().max((b - 2.0 * c + d).norm());
    let n = chord_count(second, tolerance);

    let eval = |t: f64| -> Vector2<f64> {
        let mt = 1.0 - t;
        a * (mt * mt * mt) + b * (3.0 * mt * mt * t) + c * (3.0 * mt * t * t) + d * (t * t * t)
    };
    sample(n, eval, p0, p1)
}

fn sample(
    n: usize,
    eval: impl Fn(f64) -> Vector2<f64>,
    first: Point2D,
    last: Point2D,
) -> Vec<Point2D> {
    let mut points = Vec::with_capacity(n + 1);
    points.push(first);
    for i in 1..n {
        let v = eval(i as f64 / n as f64);
        points.push(Point2D::new(v.x, v.y));
    }
    // Exact endpoints so curves meet their neighbours without drift
    points.push(last);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    #[test]
    fn test_rect_expands_to_four_edges() {
        let prims = vec![Primitive::rect(p(0.0, 0.0), p(10.0, 5.0))];
        let result = extract_segments(&prims, &TraceConfig::default());

        assert_eq!(result.segments.len(), 4);
        assert_eq!(result.stats.rectangles, 1);
        assert!(result
            .segments
            .iter()
            .all(|s| s.origin == SegmentOrigin::Rect && s.source_id == 0));
        let total: f64 = result.segments.iter().map(Segment::length).sum();
        assert!((total - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_thin_line_filtered() {
        let prims = vec![
            Primitive::line(p(0.0, 0.0), p(100.0, 0.0)),
            Primitive::line(p(0.0, 50.0), p(100.0, 50.0)).with_stroke(Some(Rgb::BLACK), 0.1),
        ];
        let result = extract_segments(&prims, &TraceConfig::default());

        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.stats.skipped_width, 1);
    }

    #[test]
    fn test_colored_and_fill_filtered() {
        let prims = vec![
            Primitive::line(p(0.0, 0.0), p(10.0, 0.0))
                .with_stroke(Some(Rgb::new(1.0, 0.0, 0.0)), 1.0),
            Primitive::rect(p(0.0, 0.0), p(10.0, 10.0))
                .with_stroke(None, 0.0)
                .with_fill(true),
            Primitive::line(p(0.0, 0.0), p(10.0, 0.0))
                .with_stroke(Some(Rgb::new(0.05, 0.05, 0.05)), 0.5),
        ];
        let result = extract_segments(&prims, &TraceConfig::default());

        assert_eq!(result.stats.skipped_color, 1);
        assert_eq!(result.stats.skipped_fill, 1);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].source_id, 2);
    }

    #[test]
    fn test_malformed_skipped_individually() {
        let prims = vec![
            Primitive::new(PathCommand::Line, vec![]),
            Primitive::curve(vec![p(0.0, 0.0), p(1.0, 1.0)]),
            Primitive::line(p(f64::NAN, 0.0), p(1.0, 0.0)),
            Primitive::close(),
            Primitive::line(p(0.0, 0.0), p(10.0, 0.0)),
        ];
        let result = extract_segments(&prims, &TraceConfig::default());

        assert_eq!(result.stats.malformed, 3);
        // The close still has a pen left behind by the earlier primitives
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments.last().map(|s| s.source_id), Some(4));
    }

    #[test]
    fn test_move_line_to_close_path() {
        let prims = vec![
            Primitive::move_to(p(0.0, 0.0)),
            Primitive::line_to(p(10.0, 0.0)),
            Primitive::line_to(p(10.0, 10.0)),
            Primitive::close(),
        ];
        let result = extract_segments(&prims, &TraceConfig::default());

        assert_eq!(result.segments.len(), 3);
        let closing = &result.segments[2];
        assert_eq!(closing.origin, SegmentOrigin::Close);
        assert_eq!(closing.start, p(10.0, 10.0));
        assert_eq!(closing.end, p(0.0, 0.0));
    }

    #[test]
    fn test_cubic_chord_deviation_within_tolerance() {
        // Quarter circle approximation, radius 100
        let k = 0.552_284_75 * 100.0;
        let pts = flatten_cubic(p(100.0, 0.0), p(100.0, k), p(k, 100.0), p(0.0, 100.0), 0.05);

        assert!(pts.len() > 4);
        assert_eq!(pts[0], p(100.0, 0.0));
        assert_eq!(*pts.last().unwrap(), p(0.0, 100.0));
        // Chord midpoints stay near the radius
        for w in pts.windows(2) {
            let mid = p((w[0].x + w[1].x) / 2.0, (w[0].y + w[1].y) / 2.0);
            let r = (mid.x * mid.x + mid.y * mid.y).sqrt();
            assert!((100.0 - r) < 0.1, "deviation {}", 100.0 - r);
        }
    }

    #[test]
    fn test_straight_quadratic_single_chord() {
        let pts = flatten_quadratic(p(0.0, 0.0), p(5.0, 0.0), p(10.0, 0.0), 0.1);
        assert_eq!(pts.len(), 2);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let prims: Vec<Primitive> = (0..200)
            .map(|i| {
                let x = i as f64;
                Primitive::curve(vec![p(x, 0.0), p(x + 0.5, 3.0), p(x + 1.0, 0.0)])
            })
            .collect();
        let a = extract_segments(&prims, &TraceConfig::default());
        let b = extract_segments(&prims, &TraceConfig::default());
        assert_eq!(a.segments, b.segments);
    }
}
