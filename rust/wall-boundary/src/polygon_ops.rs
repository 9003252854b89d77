// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon and segment predicates
//!
//! Rings are passed open: the first point is not repeated at the end.

use crate::types::Point2D;

/// Epsilon for orientation and on-segment tests
const EPSILON: f64 = 1e-9;

/// Signed area via the shoelace formula (positive = counter-clockwise)
pub fn signed_area(ring: &[Point2D]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }
    area / 2.0
}

/// Length of the closed ring, including the closing edge
pub fn perimeter(ring: &[Point2D]) -> f64 {
    let n = ring.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| ring[i].distance_to(&ring[(i + 1) % n])).sum()
}

/// Cross product of `b - a` and `c - a`
fn orient(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    a.vector_to(b).perp(&a.vector_to(c))
}

/// Parameter `t` of the projection of `point` onto segment `a`-`b`, unclamped
pub fn project_onto_segment(point: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let ab = a.vector_to(b);
    let length_sq = ab.norm_squared();
    if length_sq < 1e-20 {
        return 0.0;
    }
    a.vector_to(point).dot(&ab) / length_sq
}

/// Distance from `point` to segment `a`-`b`
pub fn point_to_segment_distance(point: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let t = project_onto_segment(point, a, b).clamp(0.0, 1.0);
    let proj = Point2D::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
    point.distance_to(&proj)
}

fn on_segment(p: &Point2D, a: &Point2D, b: &Point2D) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// True if closed segments `p1`-`p2` and `q1`-`q2` share any point
pub fn segments_intersect(p1: &Point2D, p2: &Point2D, q1: &Point2D, q2: &Point2D) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);

    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }

    (d1.abs() <= EPSILON && on_segment(p1, q1, q2))
        || (d2.abs() <= EPSILON && on_segment(p2, q1, q2))
        || (d3.abs() <= EPSILON && on_segment(q1, p1, p2))
        || (d4.abs() <= EPSILON && on_segment(q2, p1, p2))
}

/// Point where segments `p1`-`p2` and `q1`-`q2` cross strictly inside both.
///
/// Parallel, collinear and endpoint-touching pairs give `None`.
pub fn crossing_point(
    p1: &Point2D,
    p2: &Point2D,
    q1: &Point2D,
    q2: &Point2D,
) -> Option<Point2D> {
    let r = p1.vector_to(p2);
    let s = q1.vector_to(q2);
    let denom = r.perp(&s);
    if denom.abs() <= EPSILON {
        return None;
    }
    let pq = p1.vector_to(q1);
    let t = pq.perp(&s) / denom;
    let u = pq.perp(&r) / denom;
    let inside = |v: f64| v > EPSILON && v < 1.0 - EPSILON;
    (inside(t) && inside(u)).then(|| Point2D::new(p1.x + t * r.x, p1.y + t * r.y))
}

/// True if the ring has no crossing, touching or folded-back edges.
///
/// Edges are swept in order of their minimum x so only edges with
/// overlapping x ranges are compared.
pub fn is_simple(ring: &[Point2D]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let edge = |i: usize| (&ring[i], &ring[(i + 1) % n]);
    let min_x = |i: usize| ring[i].x.min(ring[(i + 1) % n].x);
    let max_x = |i: usize| ring[i].x.max(ring[(i + 1) % n].x);

    // Adjacent edges may only share their common vertex
    for i in 0..n {
        let (a, b) = edge(i);
        let c = &ring[(i + 2) % n];
        if orient(a, b, c).abs() <= EPSILON && a.vector_to(b).dot(&b.vector_to(c)) < 0.0 {
            return false;
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| min_x(a).total_cmp(&min_x(b)));

    for (k, &i) in order.iter().enumerate() {
        let (a, b) = edge(i);
        let reach = max_x(i) + EPSILON;
        for &j in &order[k + 1..] {
            if min_x(j) > reach {
                break;
            }
            let adjacent = (i + 1) % n == j || (j + 1) % n == i;
            if adjacent {
                continue;
            }
            let (c, d) = edge(j);
            if segments_intersect(a, b, c, d) {
                return false;
            }
        }
    }

    true
}

/// Point-in-polygon by ray casting; points on the boundary count as inside.
pub fn contains_point(ring: &[Point2D], point: &Point2D, boundary_tolerance: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    for i in 0..n {
        if point_to_segment_distance(point, &ring[i], &ring[(i + 1) % n]) <= boundary_tolerance {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&ring[i], &ring[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = pj.x + (point.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True if every vertex of `inner` lies inside or on `outer`.
pub fn contains_ring(outer: &[Point2D], inner: &[Point2D], boundary_tolerance: f64) -> bool {
    !inner.is_empty()
        && inner
            .iter()
            .all(|p| contains_point(outer, p, boundary_tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    fn square(size: f64) -> Vec<Point2D> {
        vec![p(0.0, 0.0), p(size, 0.0), p(size, size), p(0.0, size)]
    }

    #[test]
    fn test_signed_area_winding() {
        let ccw = square(10.0);
        assert!((signed_area(&ccw) - 100.0).abs() < 1e-9);

        let mut cw = ccw.clone();
        cw.reverse();
        assert!((signed_area(&cw) + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_perimeter_closes_ring() {
        assert!((perimeter(&square(10.0)) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_to_segment_distance() {
        let dist = point_to_segment_distance(&p(5.0, 5.0), &p(0.0, 0.0), &p(10.0, 0.0));
        assert!((dist - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_crossing_point() {
        let x = crossing_point(&p(0.0, 0.0), &p(10.0, 10.0), &p(10.0, 0.0), &p(0.0, 10.0));
        assert_eq!(x, Some(p(5.0, 5.0)));

        // Touching at an endpoint and running parallel are not crossings
        assert!(crossing_point(&p(0.0, 0.0), &p(10.0, 0.0), &p(5.0, 0.0), &p(5.0, 5.0)).is_none());
        assert!(crossing_point(&p(0.0, 0.0), &p(10.0, 0.0), &p(0.0, 1.0), &p(10.0, 1.0)).is_none());
    }

    #[test]
    fn test_bowtie_not_simple() {
        let bowtie = vec![p(0.0, 0.0), p(10.0, 10.0), p(10.0, 0.0), p(0.0, 10.0)];
        assert!(!is_simple(&bowtie));
        assert!(is_simple(&square(10.0)));
    }

    #[test]
    fn test_folded_spike_not_simple() {
        let spike = vec![p(0.0, 0.0), p(10.0, 0.0), p(5.0, 0.0), p(5.0, 5.0)];
        assert!(!is_simple(&spike));
    }

    #[test]
    fn test_contains_point_boundary_inclusive() {
        let ring = square(10.0);
        assert!(contains_point(&ring, &p(5.0, 5.0), 1e-6));
        assert!(contains_point(&ring, &p(10.0, 5.0), 1e-6));
        assert!(!contains_point(&ring, &p(15.0, 5.0), 1e-6));
    }

    #[test]
    fn test_contains_ring() {
        let outer = square(10.0);
        let inner = vec![p(1.0, 1.0), p(9.0, 1.0), p(9.0, 9.0), p(1.0, 9.0)];
        assert!(contains_ring(&outer, &inner, 1e-6));
        assert!(!contains_ring(&inner, &outer, 1e-6));
    }

    #[test]
    fn test_l_shape_excludes_notch() {
        let l = vec![
            p(0.0, 0.0),
            p(10.0, 0.0),
            p(10.0, 5.0),
            p(5.0, 5.0),
            p(5.0, 10.0),
            p(0.0, 10.0),
        ];
        assert!(contains_point(&l, &p(2.0, 8.0), 1e-6));
        assert!(!contains_point(&l, &p(8.0, 8.0), 1e-6));
    }
}
