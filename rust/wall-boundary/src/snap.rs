// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Endpoint snapping: clusters near-coincident points into canonical nodes.
//!
//! Clustering is transitive: if A is within tolerance of B and B of C, all
//! three share a node even when A and C are further apart. Each node sits at
//! its cluster's centroid. A consolidation pass then merges clusters whose
//! centroids ended up within tolerance of one another, so snapping the output
//! again merges nothing.

use crate::spatial::SpatialIndex;
use crate::types::{Point2D, Segment};

/// Union-find over point indices with path halving and union by size.
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Returns true if the sets were distinct.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }
}

/// Snapped points: one node per cluster plus the node of every input point
#[derive(Debug, Clone, Default)]
pub struct SnappedPoints {
    /// Node id → centroid
    pub nodes: Vec<Point2D>,
    /// Node id → number of input points merged into it
    pub weights: Vec<usize>,
    /// Input point index → node id
    pub assignment: Vec<usize>,
}

/// Snapped segments: every segment endpoint mapped to a node id
#[derive(Debug, Clone, Default)]
pub struct SnapResult {
    pub nodes: Vec<Point2D>,
    /// Segment index → `[start node, end node]`
    pub endpoints: Vec<[usize; 2]>,
}

/// Cluster `points` transitively within `tolerance`.
///
/// Node ids follow the order in which clusters are first seen in `points`.
pub fn snap_points(points: &[Point2D], tolerance: f64) -> SnappedPoints {
    let index = SpatialIndex::from_points(points, tolerance);
    let mut sets = DisjointSet::new(points.len());

    for (i, p) in points.iter().enumerate() {
        for j in index.find_all_near(p, tolerance) {
            if j > i {
                sets.union(i, j);
            }
        }
    }

    let mut snapped = collect_clusters(points, &vec![1; points.len()], &mut sets);
    let mut passes = 0;
    while consolidate(&mut snapped, tolerance) {
        passes += 1;
    }
    if passes > 0 {
        tracing::debug!(passes, nodes = snapped.nodes.len(), "Consolidated snapped centroids");
    }

    snapped
}

/// Snap the endpoints of `segments` into shared nodes.
pub fn snap_segments(segments: &[Segment], tolerance: f64) -> SnapResult {
    let points: Vec<Point2D> = segments.iter().flat_map(|s| [s.start, s.end]).collect();
    let snapped = snap_points(&points, tolerance);

    let endpoints = snapped
        .assignment
        .chunks_exact(2)
        .map(|pair| [pair[0], pair[1]])
        .collect();

    tracing::debug!(
        endpoints = points.len(),
        nodes = snapped.nodes.len(),
        "Snapped segment endpoints"
    );

    SnapResult {
        nodes: snapped.nodes,
        endpoints,
    }
}

/// Turns union-find roots into dense node ids with weighted centroids.
fn collect_clusters(
    points: &[Point2D],
    weights: &[usize],
    sets: &mut DisjointSet,
) -> SnappedPoints {
    let mut root_to_node = vec![usize::MAX; points.len()];
    let mut sums: Vec<(f64, f64, usize)> = Vec::new();
    let mut assignment = Vec::with_capacity(points.len());

    for (i, p) in points.iter().enumerate() {
        let root = sets.find(i);
        if root_to_node[root] == usize::MAX {
            root_to_node[root] = sums.len();
            sums.push((0.0, 0.0, 0));
        }
        let node = root_to_node[root];
        let w = weights[i];
        sums[node].0 += p.x * w as f64;
        sums[node].1 += p.y * w as f64;
        sums[node].2 += w;
        assignment.push(node);
    }

    SnappedPoints {
        nodes: sums
            .iter()
            .map(|&(sx, sy, n)| Point2D::new(sx / n as f64, sy / n as f64))
            .collect(),
        weights: sums.iter().map(|s| s.2).collect(),
        assignment,
    }
}

/// Merges nodes whose centroids are within tolerance. Returns true if any merged.
fn consolidate(snapped: &mut SnappedPoints, tolerance: f64) -> bool {
    let index = SpatialIndex::from_points(&snapped.nodes, tolerance);
    let mut sets = DisjointSet::new(snapped.nodes.len());
    let mut merged = false;

    for (i, p) in snapped.nodes.iter().enumerate() {
        for j in index.find_all_near(p, tolerance) {
            if j > i {
                merged |= sets.union(i, j);
            }
        }
    }

    if !merged {
        return false;
    }

    let regrouped = collect_clusters(&snapped.nodes, &snapped.weights, &mut sets);
    for node in snapped.assignment.iter_mut() {
        *node = regrouped.assignment[*node];
    }
    snapped.nodes = regrouped.nodes;
    snapped.weights = regrouped.weights;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    #[test]
    fn test_near_points_merge() {
        let snapped = snap_points(&[p(50.0, 50.0), p(50.003, 50.003)], 0.01);

        assert_eq!(snapped.nodes.len(), 1);
        assert_eq!(snapped.assignment, vec![0, 0]);
        assert_relative_eq!(snapped.nodes[0].x, 50.0015, epsilon = 1e-9);
    }

    #[test]
    fn test_transitive_chain() {
        // A-B and B-C within tolerance, A-C not
        let snapped = snap_points(&[p(0.0, 0.0), p(0.008, 0.0), p(0.016, 0.0)], 0.01);
        assert_eq!(snapped.nodes.len(), 1);
        assert_eq!(snapped.weights, vec![3]);
    }

    #[test]
    fn test_far_points_stay_apart() {
        let snapped = snap_points(&[p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0)], 0.01);
        assert_eq!(snapped.nodes.len(), 2);
        assert_eq!(snapped.assignment, vec![0, 1, 0]);
    }

    #[test]
    fn test_snap_is_idempotent() {
        let mut points = Vec::new();
        for i in 0..40 {
            let t = i as f64 * 0.37;
            points.push(p(t.sin() * 0.02 + (i % 7) as f64 * 0.011, t.cos() * 0.015));
        }
        let first = snap_points(&points, 0.01);
        let second = snap_points(&first.nodes, 0.01);

        assert_eq!(first.nodes.len(), second.nodes.len());
    }

    #[test]
    fn test_segment_endpoints_share_nodes() {
        use crate::types::{Rgb, SegmentOrigin};
        let seg = |a: Point2D, b: Point2D| Segment {
            start: a,
            end: b,
            stroke_color: Rgb::BLACK,
            stroke_width: 1.0,
            source_id: 0,
            origin: SegmentOrigin::Line,
        };
        let segments = vec![
            seg(p(0.0, 0.0), p(10.0, 0.0)),
            seg(p(10.001, 0.0), p(10.0, 10.0)),
        ];

        let result = snap_segments(&segments, 0.01);
        assert_eq!(result.nodes.len(), 3);
        assert_eq!(result.endpoints[0][1], result.endpoints[1][0]);
    }
}
